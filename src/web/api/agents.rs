//! Configured agent endpoints.
//!
//! Every successful mutation returns a fresh snapshot and broadcasts
//! `mission.agents.replace` built from that same snapshot, so REST and
//! WebSocket clients see identical agent lists.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::mission::{AgentDraft, ConfiguredAgent, MissionSnapshot, TimelineItem};
use crate::realtime::RealtimeEvent;
use crate::web::error::ApiResult;
use crate::web::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub ok: bool,
    pub agent: ConfiguredAgent,
    pub config_files: Vec<String>,
    pub snapshot: MissionSnapshot,
}

/// List configured agents.
pub async fn list_agents(State(state): State<AppState>) -> Json<Vec<ConfiguredAgent>> {
    Json(state.registry.list())
}

pub async fn create_agent(
    State(state): State<AppState>,
    payload: Result<Json<AgentDraft>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AgentResponse>)> {
    let Json(draft) = payload?;
    let agent = state.registry.create(&draft)?;
    let response = publish(&state, agent, "Agent created").await;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<AgentDraft>, JsonRejection>,
) -> ApiResult<Json<AgentResponse>> {
    let Json(draft) = payload?;
    let agent = state.registry.update(&id, &draft)?;
    Ok(Json(publish(&state, agent, "Agent updated").await))
}

pub async fn delete_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AgentResponse>> {
    let agent = state.registry.delete(&id)?;
    Ok(Json(publish(&state, agent, "Agent removed").await))
}

async fn publish(state: &AppState, agent: ConfiguredAgent, title: &str) -> AgentResponse {
    state
        .store
        .push_timeline(TimelineItem::new("agent", title, agent.name.clone()));
    let snapshot = state.synth.build_snapshot().await;
    state
        .broadcaster()
        .broadcast(RealtimeEvent::agents_replace(&snapshot.agents));

    AgentResponse {
        ok: true,
        agent,
        config_files: state.registry.config_files(),
        snapshot,
    }
}
