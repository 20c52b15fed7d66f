use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use course_core::model::{CourseId, DetailedProgress, LessonId};
use serde::Deserialize;
use services::{CourseProgressHandle, LessonCompletion};

use crate::auth::AuthStudent;
use crate::error::ApiError;
use crate::response::ApiResponse;
use crate::state::AppState;

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCourseRequest {
    pub course_id: CourseId,
}

pub async fn health() -> ApiResponse<&'static str> {
    ApiResponse::success("ok")
}

pub async fn start_course(
    State(state): State<AppState>,
    AuthStudent(student_id): AuthStudent,
    body: Result<Json<StartCourseRequest>, JsonRejection>,
) -> ApiResult<CourseProgressHandle> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let handle = state
        .tracker
        .find_or_create_course_progress(student_id, request.course_id)
        .await?;
    Ok(ApiResponse::success(handle))
}

pub async fn complete_lesson(
    State(state): State<AppState>,
    AuthStudent(student_id): AuthStudent,
    lesson_id: Result<Path<u64>, PathRejection>,
) -> ApiResult<LessonCompletion> {
    let Path(lesson_id) = lesson_id.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let completion = state
        .tracker
        .complete_lesson(student_id, LessonId::new(lesson_id))
        .await?;
    Ok(ApiResponse::success(completion))
}

pub async fn course_progress(
    State(state): State<AppState>,
    AuthStudent(student_id): AuthStudent,
    course_id: Result<Path<u64>, PathRejection>,
) -> ApiResult<DetailedProgress> {
    let Path(course_id) = course_id.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let detail = state
        .tracker
        .get_detailed_progress(student_id, CourseId::new(course_id))
        .await?;
    Ok(ApiResponse::success(detail))
}
