//! CSV import endpoints. Each takes the raw `text/csv` body.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;

use super::error_response;
use crate::import;
use crate::infrastructure::AppState;
use crate::services::fee_service;

pub async fn import_books(State(state): State<AppState>, body: String) -> impl IntoResponse {
    let rows = match import::parse_books_csv(body.as_bytes()) {
        Ok(rows) => rows,
        Err(e) => return error_response(&e),
    };

    match state.book_repo.import(rows).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "imported": summary.imported,
                "skipped": summary.skipped
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn import_students(State(state): State<AppState>, body: String) -> impl IntoResponse {
    let rows = match import::parse_students_csv(body.as_bytes()) {
        Ok(rows) => rows,
        Err(e) => return error_response(&e),
    };

    match state.student_repo.import(rows).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "imported": summary.imported,
                "skipped": summary.skipped
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn import_fee_assignments(
    State(state): State<AppState>,
    body: String,
) -> impl IntoResponse {
    let rows = match import::parse_fee_assignments_csv(body.as_bytes()) {
        Ok(rows) => rows,
        Err(e) => return error_response(&e),
    };

    match fee_service::import_fee_assignments(state.db(), rows).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "assigned": summary.assigned,
                "skipped": summary.skipped
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn import_bulk_collections(
    State(state): State<AppState>,
    body: String,
) -> impl IntoResponse {
    let rows = match import::parse_bulk_collections_csv(body.as_bytes()) {
        Ok(rows) => rows,
        Err(e) => return error_response(&e),
    };

    match fee_service::import_bulk_collections(state.db(), rows).await {
        Ok(summary) => (StatusCode::OK, Json(json!(summary))).into_response(),
        Err(e) => error_response(&e),
    }
}
