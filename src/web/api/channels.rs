//! Active relay channel endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::realtime::RealtimeEvent;
use crate::telegram::Channel;
use crate::web::error::ApiResult;
use crate::web::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResponse {
    pub channel: String,
    pub available: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persisted: Option<bool>,
}

#[derive(Deserialize)]
pub struct SwitchChannelRequest {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub persist: bool,
}

pub async fn get_active_channel(State(state): State<AppState>) -> Json<ChannelResponse> {
    Json(ChannelResponse {
        channel: state.channels.active().as_str().to_string(),
        available: Channel::available(),
        persisted: None,
    })
}

pub async fn put_active_channel(
    State(state): State<AppState>,
    payload: Result<Json<SwitchChannelRequest>, JsonRejection>,
) -> ApiResult<Json<ChannelResponse>> {
    let Json(req) = payload?;
    let previous = state.channels.switch(&req.channel)?;
    if req.persist {
        state.channels.save()?;
    }

    let active = state.channels.active();
    if active != previous {
        state
            .broadcaster()
            .broadcast(RealtimeEvent::channel_changed(active.as_str()));
    }

    Ok(Json(ChannelResponse {
        channel: active.as_str().to_string(),
        available: Channel::available(),
        persisted: Some(req.persist),
    }))
}
