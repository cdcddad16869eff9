/// Bulb Sentinel web server
///
/// 1. Monitor thread: capture -> detect -> publish (std::thread, one per camera)
/// 2. HTTP:           axum on tokio, reads the published results
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bulb_sentinel::web::{self, AppConfig, AppState};
use bulb_sentinel::{Acquirer, ThresholdConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Bulb Sentinel - webcam light bulb monitor", long_about = None)]
struct Args {
    /// Listen address
    #[arg(long, env = "SENTINEL_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Listen port
    #[arg(short, long, env = "SENTINEL_PORT", default_value_t = 5000)]
    port: u16,

    /// Camera: index, /dev/videoN, or synthetic[:on|:off|:ambient|:cycle]
    #[arg(short, long, env = "SENTINEL_DEVICE", default_value = "0")]
    device: String,

    /// Threshold config (JSON); written with defaults when missing
    #[arg(short, long, env = "SENTINEL_CONFIG", default_value = "bulb_config.json")]
    config: PathBuf,

    /// Pause between detections
    #[arg(long, env = "SENTINEL_INTERVAL_MS", default_value_t = 1000)]
    interval_ms: u64,

    /// Bounded wait for one frame
    #[arg(long, env = "SENTINEL_CAPTURE_TIMEOUT_MS", default_value_t = 2000)]
    capture_timeout_ms: u64,

    /// Capture timeouts in a row that end the session
    #[arg(long, env = "SENTINEL_MAX_TIMEOUTS", default_value_t = 3)]
    max_consecutive_timeouts: u32,

    /// Start monitoring at boot
    #[arg(long, env = "SENTINEL_AUTOSTART")]
    autostart: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bulb_sentinel=debug,sentinel=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    tracing::info!("🚀 Bulb Sentinel v{}", env!("CARGO_PKG_VERSION"));

    let threshold = ThresholdConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    threshold.log_summary();

    let acquirer =
        Acquirer::system().with_capture_timeout(Duration::from_millis(args.capture_timeout_ms));
    let devices = acquirer.list_devices();
    tracing::info!(devices = ?devices, "📷 Available cameras");

    let state = AppState::new(
        acquirer,
        threshold,
        AppConfig {
            device_id: args.device.clone(),
            interval: Duration::from_millis(args.interval_ms),
            max_consecutive_timeouts: args.max_consecutive_timeouts,
        },
    );

    if args.autostart {
        match state.start_monitor().await {
            Ok(view) => tracing::info!(device_id = %view.device_id(), "✅ Autostart"),
            // keep serving; the UI can retry
            Err(e) => tracing::error!(error = %e, "❌ Autostart failed"),
        }
    }

    let app = web::create_router(state.clone())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!("🌐 Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if state.stop_monitor().await.is_ok() {
        tracing::info!("📷 Camera released");
    }
    tracing::info!("👋 Bye");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "❌ Ctrl-C handler failed");
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 Shutting down");
}
