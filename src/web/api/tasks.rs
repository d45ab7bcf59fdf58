//! Task board endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mission::merge::id_from_value;
use crate::mission::{Task, TaskPatch};
use crate::web::error::{ApiError, ApiResult};
use crate::web::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveTaskRequest {
    #[serde(default)]
    pub task_id: Value,
    #[serde(default)]
    pub column: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub task: TaskPatch,
}

#[derive(Serialize)]
pub struct TasksResponse {
    pub ok: bool,
    pub tasks: Vec<Task>,
}

#[derive(Serialize)]
pub struct TaskResponse {
    pub ok: bool,
    pub task: Task,
}

pub async fn move_task(
    State(state): State<AppState>,
    payload: Result<Json<MoveTaskRequest>, JsonRejection>,
) -> ApiResult<Json<TasksResponse>> {
    let Json(req) = payload?;
    let id = id_from_value(&req.task_id).ok_or_else(|| ApiError::bad_request("taskId is required"))?;
    let column = req
        .column
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("column is required"))?;

    let tasks = state.store.move_task(&id, &column)?;
    Ok(Json(TasksResponse { ok: true, tasks }))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> ApiResult<Json<TaskResponse>> {
    let Json(req) = payload?;
    let task = state.store.update_task(&id, &req.task)?;
    Ok(Json(TaskResponse { ok: true, task }))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TasksResponse>> {
    let tasks = state.store.delete_task(&id)?;
    Ok(Json(TasksResponse { ok: true, tasks }))
}
