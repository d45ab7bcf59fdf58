//! Chat endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::chat;
use crate::mission::{ChatMessage, ChatRole};
use crate::web::error::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub reply: ChatMessage,
}

pub async fn post_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Json<ChatResponse>> {
    let Json(req) = payload?;
    let text = req.message.trim();
    if text.is_empty() {
        return Err(ApiError::bad_request("message is required"));
    }

    let author = req
        .author
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or("Operator");
    let message = ChatMessage::new(ChatRole::User, author, text)
        .with_id(req.message_id.unwrap_or_default());

    if state.store.append_chat(message.clone()).is_none() {
        tracing::debug!("Chat message {} already recorded", message.id);
    }

    let reply = chat::respond(state.responder.as_ref(), &message).await;
    let reply = state.store.append_chat(reply.clone()).unwrap_or(reply);
    Ok(Json(ChatResponse { reply }))
}
