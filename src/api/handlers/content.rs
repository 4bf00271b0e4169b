//! Public content catalogue: languages, courses and lessons.

use axum::{
    extract::{Extension, Query},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::error::{ApiError, ErrorBody},
    storage::{Course, Language, LessonWithTasks, Store},
};

#[derive(ToSchema, Serialize, Debug)]
pub struct LanguagesResponse {
    pub languages: Vec<Language>,
}

#[derive(Deserialize, IntoParams, Debug, Default)]
pub struct CoursesQuery {
    /// Language slug, e.g. `python`.
    pub language: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct CoursesResponse {
    pub language: Language,
    pub courses: Vec<Course>,
}

#[derive(Deserialize, IntoParams, Debug, Default)]
pub struct LessonsQuery {
    pub course_id: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct LessonsResponse {
    pub lessons: Vec<LessonWithTasks>,
}

#[utoipa::path(
    get,
    path = "/api/content/languages",
    responses(
        (status = 200, description = "Languages ordered by name", body = LanguagesResponse),
        (status = 500, description = "Storage failure", body = ErrorBody)
    ),
    tag = "content"
)]
#[instrument(skip_all)]
pub async fn languages(
    store: Extension<Arc<dyn Store>>,
) -> Result<Json<LanguagesResponse>, ApiError> {
    let languages = store.languages().await?;
    Ok(Json(LanguagesResponse { languages }))
}

#[utoipa::path(
    get,
    path = "/api/content/courses",
    params(CoursesQuery),
    responses(
        (status = 200, description = "Courses of the language in order", body = CoursesResponse),
        (status = 400, description = "Missing language slug", body = ErrorBody),
        (status = 404, description = "Unknown language", body = ErrorBody)
    ),
    tag = "content"
)]
#[instrument(skip_all)]
pub async fn courses(
    store: Extension<Arc<dyn Store>>,
    Query(query): Query<CoursesQuery>,
) -> Result<Json<CoursesResponse>, ApiError> {
    let slug = query.language.as_deref().map(str::trim).unwrap_or_default();
    if slug.is_empty() {
        return Err(ApiError::bad_request("Language slug is required"));
    }

    let language = store
        .language_by_slug(slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Language not found"))?;
    let courses = store.courses_for_language(language.id).await?;

    Ok(Json(CoursesResponse { language, courses }))
}

#[utoipa::path(
    get,
    path = "/api/content/lessons",
    params(LessonsQuery),
    responses(
        (status = 200, description = "Lessons of the course with their tasks", body = LessonsResponse),
        (status = 400, description = "Missing or malformed course id", body = ErrorBody)
    ),
    tag = "content"
)]
#[instrument(skip_all)]
pub async fn lessons(
    store: Extension<Arc<dyn Store>>,
    Query(query): Query<LessonsQuery>,
) -> Result<Json<LessonsResponse>, ApiError> {
    let raw = query.course_id.as_deref().map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(ApiError::bad_request("Course ID is required"));
    }
    let course_id: i64 = raw
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid course ID"))?;

    let lessons = store.lessons_for_course(course_id).await?;
    Ok(Json(LessonsResponse { lessons }))
}
