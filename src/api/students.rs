use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use super::error_response;
use crate::domain::{LedgerError, StaffInput, StudentInput, StudentUpdate};
use crate::infrastructure::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<u64>,
}

/// GET /api/students?q= - Search active students
pub async fn search_students(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> impl IntoResponse {
    let query = params.q.unwrap_or_default();
    match state
        .student_repo
        .search(&query, params.limit.unwrap_or(20))
        .await
    {
        Ok(students) => (
            StatusCode::OK,
            Json(json!({
                "students": students,
                "count": students.len()
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn create_student(
    State(state): State<AppState>,
    Json(input): Json<StudentInput>,
) -> impl IntoResponse {
    match state.student_repo.create(input).await {
        Ok(student) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "student": student
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn get_student(State(state): State<AppState>, Path(id): Path<i32>) -> impl IntoResponse {
    match state.student_repo.find_by_id(id).await {
        Ok(Some(student)) => (StatusCode::OK, Json(json!(student))).into_response(),
        Ok(None) => error_response(&LedgerError::not_found("student", id)),
        Err(e) => error_response(&e),
    }
}

pub async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(input): Json<StudentUpdate>,
) -> impl IntoResponse {
    match state.student_repo.update(id, input).await {
        Ok(student) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "student": student
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// DELETE /api/students/:id - Deactivate; history stays intact
pub async fn deactivate_student(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match state.student_repo.deactivate(id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Student deactivated"
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn create_staff(
    State(state): State<AppState>,
    Json(input): Json<StaffInput>,
) -> impl IntoResponse {
    match state.student_repo.create_staff(input).await {
        Ok(staff) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "user": staff
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}
