//! Route definitions for the gateway.

use axum::{
    routing::{get, post, put},
    Router,
};

use super::api;
use super::state::AppState;
use super::websocket::ws_handler;

/// Create the REST and WebSocket router.
pub fn create_app_router(state: AppState) -> Router {
    Router::new()
        .route("/snapshot", get(api::get_snapshot))
        .route("/chat", post(api::post_chat))
        // Tasks
        .route("/tasks/move", post(api::move_task))
        .route("/tasks/:id", put(api::update_task).delete(api::delete_task))
        // Agents
        .route("/agents", get(api::list_agents).post(api::create_agent))
        .route("/agents/:id", put(api::update_agent).delete(api::delete_agent))
        .route("/emergency", post(api::post_emergency))
        .route(
            "/channels/active",
            get(api::get_active_channel).put(api::put_active_channel),
        )
        .route("/ws", get(ws_handler))
        .route("/health", get(api::health_check))
        .with_state(state)
}
