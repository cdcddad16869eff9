//! Web API - camera control, detection views and the MJPEG feed
//!
//! All reads go through the monitor's published cells; camera work runs on
//! the blocking pool.

mod routes;
mod state;

pub use routes::create_router;
pub use state::{run_blocking, AppConfig, AppState};
