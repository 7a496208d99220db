use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use super::error_response;
use crate::infrastructure::AppState;
use crate::services::circulation_service::{self, PayFineOutcome};

/// Request body for issuing a book, by ids or by desk identifiers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IssueRequest {
    ById { student_id: i32, book_id: i32 },
    ByIdentifiers { username: String, isbn: String },
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// GET /api/issues - Books currently out
pub async fn list_active_issues(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> impl IntoResponse {
    match circulation_service::list_active_issues(state.db(), params.q.as_deref()).await {
        Ok(issues) => (
            StatusCode::OK,
            Json(json!({
                "issues": issues,
                "count": issues.len()
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

#[utoipa::path(
    post,
    path = "/api/issues",
    responses(
        (status = 201, description = "Book issued"),
        (status = 404, description = "Unknown student or book"),
        (status = 409, description = "No copy available")
    )
)]
pub async fn issue_book(
    State(state): State<AppState>,
    Json(payload): Json<IssueRequest>,
) -> impl IntoResponse {
    let result = match payload {
        IssueRequest::ById {
            student_id,
            book_id,
        } => circulation_service::issue_book(state.db(), state.policy, student_id, book_id).await,
        IssueRequest::ByIdentifiers { username, isbn } => {
            circulation_service::issue_book_by_identifiers(
                state.db(),
                state.policy,
                &username,
                &isbn,
            )
            .await
        }
    };

    match result {
        Ok(issue) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "issue": issue
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

#[utoipa::path(
    post,
    path = "/api/issues/{id}/return",
    params(("id" = i32, Path, description = "Issue id")),
    responses(
        (status = 200, description = "Book returned, with the fine if overdue"),
        (status = 409, description = "Issue already returned")
    )
)]
pub async fn return_book(State(state): State<AppState>, Path(id): Path<i32>) -> impl IntoResponse {
    match circulation_service::return_book(state.db(), state.policy, id).await {
        Ok(receipt) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "issue": receipt.issue,
                "fine": receipt.fine
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /api/students/:id/history - Every issue of one student
pub async fn student_history(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match circulation_service::student_history(state.db(), id).await {
        Ok(history) => (StatusCode::OK, Json(json!({ "history": history }))).into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /api/fines - Unpaid first
pub async fn list_fines(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> impl IntoResponse {
    match circulation_service::list_fines(state.db(), params.q.as_deref()).await {
        Ok(fines) => (StatusCode::OK, Json(json!({ "fines": fines }))).into_response(),
        Err(e) => error_response(&e),
    }
}

#[utoipa::path(
    post,
    path = "/api/fines/{id}/pay",
    params(("id" = i32, Path, description = "Fine id")),
    responses(
        (status = 200, description = "Fine paid, or already paid"),
        (status = 404, description = "Unknown fine")
    )
)]
pub async fn pay_fine(State(state): State<AppState>, Path(id): Path<i32>) -> impl IntoResponse {
    match circulation_service::pay_fine(state.db(), id).await {
        Ok(outcome) => {
            let already_paid = matches!(outcome, PayFineOutcome::AlreadyPaid(_));
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "already_paid": already_paid,
                    "fine": outcome.fine()
                })),
            )
                .into_response()
        }
        Err(e) => error_response(&e),
    }
}
