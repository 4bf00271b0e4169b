//! Learner progress and solution submission.

use axum::{extract::Extension, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::{
    auth::{session::require_user, AuthState},
    require_body,
};
use crate::{
    api::error::{ApiError, ErrorBody},
    grading::FULL_SCORE,
    storage::{Progress, ProgressUpsert, Store},
};

#[derive(ToSchema, Serialize, Debug)]
pub struct ProgressListResponse {
    pub progress: Vec<Progress>,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct ProgressRequest {
    pub lesson_id: Option<i64>,
    pub task_id: Option<i64>,
    pub code_solution: Option<String>,
    pub completed: Option<bool>,
    pub score: Option<i32>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ProgressResponse {
    pub success: bool,
    pub progress: Progress,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct SubmitRequest {
    pub task_id: Option<i64>,
    #[serde(default)]
    pub code: String,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct SubmitResponse {
    pub success: bool,
    pub correct: bool,
    pub score: i32,
    pub message: String,
    pub progress: Progress,
}

#[utoipa::path(
    get,
    path = "/api/progress",
    responses(
        (status = 200, description = "Progress rows of the signed-in user", body = ProgressListResponse),
        (status = 401, description = "No valid session", body = ErrorBody)
    ),
    tag = "progress"
)]
#[instrument(skip_all)]
pub async fn list_progress(
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<Arc<dyn Store>>,
    headers: HeaderMap,
) -> Result<Json<ProgressListResponse>, ApiError> {
    let user = require_user(&auth_state, &headers).await?.user;
    let progress = store.progress_for_user(user.id).await?;
    Ok(Json(ProgressListResponse { progress }))
}

#[utoipa::path(
    post,
    path = "/api/progress",
    request_body = ProgressRequest,
    responses(
        (status = 200, description = "Progress saved", body = ProgressResponse),
        (status = 400, description = "Missing lesson or invalid score", body = ErrorBody),
        (status = 401, description = "No valid session", body = ErrorBody)
    ),
    tag = "progress"
)]
#[instrument(skip_all)]
pub async fn save_progress(
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<Arc<dyn Store>>,
    headers: HeaderMap,
    payload: Option<Json<ProgressRequest>>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let user = require_user(&auth_state, &headers).await?.user;
    let request = require_body(payload)?;
    let Some(lesson_id) = request.lesson_id else {
        return Err(ApiError::bad_request("Lesson ID is required"));
    };
    if request
        .score
        .is_some_and(|score| !(0..=FULL_SCORE).contains(&score))
    {
        return Err(ApiError::bad_request("Score must be between 0 and 100"));
    }

    let progress = store
        .upsert_progress(&ProgressUpsert {
            user_id: user.id,
            lesson_id,
            task_id: request.task_id,
            code_solution: request.code_solution,
            completed: request.completed.unwrap_or(false),
            score: request.score,
        })
        .await?;

    Ok(Json(ProgressResponse {
        success: true,
        progress,
    }))
}

#[utoipa::path(
    post,
    path = "/api/progress/submit",
    request_body = SubmitRequest,
    responses(
        (status = 200, description = "Submission graded and recorded", body = SubmitResponse),
        (status = 400, description = "Missing task id", body = ErrorBody),
        (status = 401, description = "No valid session", body = ErrorBody),
        (status = 404, description = "Unknown task", body = ErrorBody)
    ),
    tag = "progress"
)]
#[instrument(skip_all)]
pub async fn submit_solution(
    auth_state: Extension<Arc<AuthState>>,
    store: Extension<Arc<dyn Store>>,
    headers: HeaderMap,
    payload: Option<Json<SubmitRequest>>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let user = require_user(&auth_state, &headers).await?.user;
    let request = require_body(payload)?;
    let Some(task_id) = request.task_id else {
        return Err(ApiError::bad_request("Task ID is required"));
    };

    let task = store
        .task(task_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;
    let grade = auth_state.grader().grade(&task, &request.code);
    info!(
        "Graded task {task_id} for user {}: correct={}",
        user.id, grade.correct
    );

    let progress = store
        .upsert_progress(&ProgressUpsert {
            user_id: user.id,
            lesson_id: task.lesson_id,
            task_id: Some(task.id),
            code_solution: Some(request.code),
            completed: grade.correct,
            score: Some(grade.score),
        })
        .await?;

    Ok(Json(SubmitResponse {
        success: true,
        correct: grade.correct,
        score: grade.score,
        message: grade.message,
        progress,
    }))
}
