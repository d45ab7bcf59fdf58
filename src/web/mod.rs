//! REST gateway and WebSocket endpoint (Axum).

pub mod api;
pub mod error;
pub mod router;
pub mod server;
pub mod state;
pub mod websocket;

pub use error::{ApiError, ApiResult};
pub use router::create_app_router;
pub use server::{run_server, WebServerConfig};
pub use state::AppState;
