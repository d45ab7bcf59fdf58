//! Snapshot and health endpoints.

use axum::extract::State;
use axum::Json;

use crate::mission::MissionSnapshot;
use crate::web::state::AppState;

/// Full snapshot. Never fails; upstream outages degrade the content.
pub async fn get_snapshot(State(state): State<AppState>) -> Json<MissionSnapshot> {
    Json(state.synth.build_snapshot().await)
}

pub async fn health_check() -> &'static str {
    "OK"
}
