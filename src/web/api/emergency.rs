//! Emergency notification endpoint. Emergency mode itself lives in the
//! client; the server only announces the action.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::mission::{TimelineItem, EMERGENCY_KIND};
use crate::realtime::RealtimeEvent;
use crate::web::error::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Deserialize)]
pub struct EmergencyRequest {
    #[serde(default)]
    pub action: String,
}

pub async fn post_emergency(
    State(state): State<AppState>,
    payload: Result<Json<EmergencyRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(req) = payload?;
    let action = req.action.trim();
    if action.is_empty() {
        return Err(ApiError::bad_request("action is required"));
    }

    tracing::warn!("Emergency action requested: {}", action);
    let time = chrono::Utc::now().format("%H:%M:%S").to_string();
    state.broadcaster().broadcast(RealtimeEvent::emergency(action, &time));
    state
        .store
        .push_timeline(TimelineItem::new(EMERGENCY_KIND, "Emergency action", action));
    Ok(Json(json!({ "ok": true })))
}
