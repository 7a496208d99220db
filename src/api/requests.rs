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
use crate::services::notification_service::{self, DEFAULT_FEED_SIZE};
use crate::services::request_service;

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub student_id: i32,
    pub book_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<u64>,
}

pub async fn list_pending_requests(State(state): State<AppState>) -> impl IntoResponse {
    match request_service::list_pending_requests(state.db()).await {
        Ok(requests) => (StatusCode::OK, Json(json!({ "requests": requests }))).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn create_request(
    State(state): State<AppState>,
    Json(payload): Json<CreateRequest>,
) -> impl IntoResponse {
    match request_service::request_book(state.db(), payload.student_id, payload.book_id).await {
        Ok(request) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "request": request
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn approve_request(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match request_service::approve_request(state.db(), state.policy, id).await {
        Ok(approved) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "request": approved.request,
                "issue": approved.issue
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn reject_request(State(state): State<AppState>, Path(id): Path<i32>) -> impl IntoResponse {
    match request_service::reject_request(state.db(), id).await {
        Ok(request) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "request": request
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    Query(params): Query<FeedQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(DEFAULT_FEED_SIZE);
    match notification_service::list_notifications(state.db(), user_id, limit).await {
        Ok(feed) => (StatusCode::OK, Json(json!(feed))).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn mark_notifications_read(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> impl IntoResponse {
    match notification_service::mark_all_read(state.db(), user_id).await {
        Ok(updated) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "updated": updated
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}
