//! API Routes

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Local;
use serde_json::{json, Value};

use super::state::{run_blocking, AppState};
use crate::detection::{DetectionResult, Signal};
use crate::error::{Error, Result};
use crate::monitor::{self, MonitorState, MonitorView};
use crate::renderer;

const INDEX_HTML: &str = include_str!("../../assets/index.html");

/// Feed poll period
const FEED_TICK: Duration = Duration::from_millis(100);
const FEED_BOUNDARY: &str = "frame";

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(health_check))
        // Camera control
        .route("/api/start_camera", get(start_camera))
        .route("/api/stop_camera", get(stop_camera))
        .route("/api/status", get(status))
        .route("/api/detect_once", get(detect_once))
        .route("/api/camera_feed", get(camera_feed))
        // Detection views
        .route("/api/light_status", get(light_status))
        .route("/api/debug_info", get(debug_info))
        .route("/api/detection_details", get(detection_details))
        .route("/api/real_time_data", get(real_time_data))
        .route("/api/toggle_debug", get(toggle_debug))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn no_data() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error_code": "NO_DATA",
            "message": "No detection data available",
        })),
    )
        .into_response()
}

/// The monitor exists but is not delivering; its last result is kept aside
fn not_live(view: &MonitorView) -> Response {
    let monitor_state = view.state();
    let (error_code, message) = match &monitor_state {
        MonitorState::Failed { message, .. } => ("MONITOR_FAILED", message.clone()),
        _ => ("NOT_RUNNING", "Monitor is not running".to_string()),
    };
    let last_result = view.latest();
    (
        StatusCode::CONFLICT,
        Json(json!({
            "error_code": error_code,
            "message": message,
            "monitor": monitor_state,
            "last_result": last_result.as_deref(),
        })),
    )
        .into_response()
}

/// Room status shown when no live result is available
fn idle_room_status(monitor_state: &MonitorState) -> &'static str {
    match monitor_state {
        MonitorState::Failed { .. } => "ERROR",
        _ => Signal::Unknown.room_status(),
    }
}

fn camera_status(state: &AppState, view: Option<&MonitorView>) -> Value {
    match view {
        Some(view) => {
            let monitor_state = view.state();
            json!({
                "device_id": view.device_id(),
                "is_camera_open": monitor_state == MonitorState::Running,
                "monitor": monitor_state,
                "stats": view.stats(),
                "capture_timeout_ms": state.acquirer.capture_timeout().as_millis() as u64,
            })
        }
        None => json!({
            "device_id": state.config.device_id,
            "is_camera_open": false,
            "monitor": MonitorState::Stopped,
            "capture_timeout_ms": state.acquirer.capture_timeout().as_millis() as u64,
        }),
    }
}

async fn start_camera(State(state): State<AppState>) -> Result<Response> {
    match state.start_monitor().await {
        Ok(view) => Ok(Json(json!({
            "status": "Camera started successfully",
            "device_id": view.device_id(),
        }))
        .into_response()),
        Err(Error::AlreadyRunning(device_id)) => Ok(Json(json!({
            "status": "Camera already running",
            "device_id": device_id,
        }))
        .into_response()),
        Err(e) => Err(e),
    }
}

async fn stop_camera(State(state): State<AppState>) -> Result<Json<Value>> {
    let final_state = state.stop_monitor().await?;
    Ok(Json(json!({
        "status": "Camera stopped",
        "monitor": final_state,
    })))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let view = state.monitor_view();
    let latest = view.as_ref().and_then(|v| v.latest());
    let running = view.as_ref().map_or(false, |v| v.is_running());
    let (live, stale) = if running { (latest, None) } else { (None, latest) };
    Json(json!({
        "camera_status": camera_status(&state, view.as_ref()),
        "latest_result": live.as_deref(),
        "last_result": stale.as_deref(),
        "timestamp": Local::now(),
    }))
}

/// Latest result while monitoring; otherwise one scoped capture
async fn detect_once(State(state): State<AppState>) -> Result<Response> {
    if let Some(view) = state.monitor_view() {
        if view.is_running() {
            return Ok(match view.latest() {
                Some(result) => Json(result.as_ref().clone()).into_response(),
                None => no_data(),
            });
        }
    }

    let acquirer = state.acquirer.clone();
    let device_id = state.config.device_id.clone();
    let threshold = state.threshold.clone();
    let result =
        run_blocking(move || monitor::detect_once(&acquirer, &device_id, &threshold)).await?;
    Ok(Json(result).into_response())
}

/// MJPEG stream of the monitor's latest frame; ends when the monitor stops
async fn camera_feed(State(state): State<AppState>) -> Result<Response> {
    let view = state.monitor_view().ok_or(Error::NotRunning)?;
    if !view.is_running() {
        return Err(Error::NotRunning);
    }

    let stream = futures::stream::unfold((view, None), |(view, last_sent)| async move {
        let mut ticker = tokio::time::interval(FEED_TICK);
        loop {
            ticker.tick().await;
            if !view.is_running() {
                tracing::debug!(device_id = %view.device_id(), "📺 Feed ended");
                return None;
            }
            let Some(frame) = view.latest_frame() else {
                continue;
            };
            if last_sent == Some(frame.captured_at()) {
                continue;
            }

            let result = view.latest();
            let captured_at = frame.captured_at();
            let jpeg = run_blocking(move || {
                renderer::render_feed_frame(&frame, result.as_deref())
            })
            .await;
            match jpeg {
                Ok(jpeg) => {
                    let part = multipart_part(&jpeg);
                    return Some((Ok::<Bytes, std::io::Error>(part), (view, Some(captured_at))));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "⚠️ Feed frame encoding failed");
                    return Some((
                        Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())),
                        (view, Some(captured_at)),
                    ));
                }
            }
        }
    });

    Ok(Response::builder()
        .header(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={}", FEED_BOUNDARY),
        )
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .map_err(|e| Error::Internal(e.to_string()))?)
}

fn multipart_part(jpeg: &[u8]) -> Bytes {
    let mut part = Vec::with_capacity(jpeg.len() + 64);
    part.extend_from_slice(format!("--{}\r\n", FEED_BOUNDARY).as_bytes());
    part.extend_from_slice(b"Content-Type: image/jpeg\r\n");
    part.extend_from_slice(format!("Content-Length: {}\r\n\r\n", jpeg.len()).as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}

/// Headline signal; UNKNOWN unless a running monitor has a result
async fn light_status(State(state): State<AppState>) -> Json<Value> {
    let view = state.monitor_view();
    let monitor_state = view
        .as_ref()
        .map_or(MonitorState::Stopped, |v| v.state());
    let latest = view.as_ref().and_then(|v| v.latest());

    match latest {
        Some(result) if monitor_state == MonitorState::Running => Json(json!({
            "signal": result.signal(),
            "room_status": result.signal().room_status(),
            "timestamp": result.timestamp(),
            "detected_count": result.bulb_count(),
            "average_brightness": result.average_brightness(),
            "monitor": monitor_state,
        })),
        last_result => Json(json!({
            "signal": Signal::Unknown,
            "room_status": idle_room_status(&monitor_state),
            "timestamp": "",
            "detected_count": 0,
            "average_brightness": 0.0,
            "monitor": monitor_state,
            "last_result": last_result.as_deref(),
        })),
    }
}

async fn debug_info(State(state): State<AppState>) -> Json<Value> {
    let view = state.monitor_view();
    let history: Vec<Arc<DetectionResult>> = view.as_ref().map(|v| v.history()).unwrap_or_default();
    let history: Vec<&DetectionResult> = history.iter().map(|r| r.as_ref()).collect();
    let latest = view.as_ref().and_then(|v| v.latest());
    let uptime_sec = (Local::now() - state.started_at).num_seconds();

    Json(json!({
        "camera_status": camera_status(&state, view.as_ref()),
        "detection_history": history,
        "latest_detection": latest.as_deref(),
        "threshold_config": state.threshold.as_ref(),
        "system_info": {
            "timestamp": Local::now(),
            "debug_mode": state.debug_mode(),
            "camera_thread_alive": state.is_running(),
            "uptime_sec": uptime_sec,
            "version": env!("CARGO_PKG_VERSION"),
        },
    }))
}

async fn detection_details(State(state): State<AppState>) -> Response {
    let Some(view) = state.monitor_view() else {
        return no_data();
    };
    if !view.is_running() {
        return not_live(&view);
    }
    let Some(result) = view.latest() else {
        return no_data();
    };

    Json(json!({
        "timestamp": result.timestamp(),
        "final_decision": {
            "signal": result.signal(),
            "room_status": result.signal().room_status(),
        },
        "frame_analysis": {
            "average_brightness": result.average_brightness(),
            "frame_stats": result.frame_stats(),
        },
        "detection_summary": {
            "bulb_count": result.bulb_count(),
            "threshold": state.threshold.threshold,
            "min_area": state.threshold.min_area,
            "max_bulbs": state.threshold.max_bulbs,
            "darkness_threshold": state.threshold.darkness_threshold,
            "ambient_policy": state.threshold.ambient_policy,
        },
        "detected_light_sources": result.regions(),
    }))
    .into_response()
}

async fn real_time_data(State(state): State<AppState>) -> Response {
    let Some(view) = state.monitor_view() else {
        return no_data();
    };
    if !view.is_running() {
        return not_live(&view);
    }
    let Some(result) = view.latest() else {
        return no_data();
    };
    let stats = result.frame_stats();

    Json(json!({
        "timestamp": result.timestamp(),
        "signal": result.signal(),
        "room_status": result.signal().room_status(),
        "metrics": {
            "average_brightness": result.average_brightness(),
            "bulb_count": result.bulb_count(),
            "area_coverage": stats.map_or(0.0, |s| s.bulb_coverage_percentage),
            "bright_pixel_percentage": stats.map_or(0.0, |s| s.bright_pixel_percentage),
            "brightness_std": stats.map_or(0.0, |s| s.brightness_std),
        },
        "monitor": view.stats(),
    }))
    .into_response()
}

async fn toggle_debug(State(state): State<AppState>) -> Json<Value> {
    let debug_mode = state.toggle_debug();
    tracing::info!(debug_mode, "🐞 Debug mode toggled");
    Json(json!({
        "debug_mode": debug_mode,
        "status": format!("Debug mode {}", if debug_mode { "enabled" } else { "disabled" }),
    }))
}
