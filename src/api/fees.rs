use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::error_response;
use crate::infrastructure::AppState;
use crate::services::fee_service::{
    self, AssignOutcome, AssignmentRequest, BulkPaymentRequest, FeeHeaderInput, PaymentRequest,
};

#[derive(Debug, Deserialize)]
pub struct HeaderQuery {
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct AssignFeeRequest {
    pub student_id: i32,
    pub header_id: i32,
    pub amount: Option<f64>,
    pub due_date: Option<NaiveDate>,
}

pub async fn list_fee_headers(
    State(state): State<AppState>,
    Query(params): Query<HeaderQuery>,
) -> impl IntoResponse {
    match fee_service::list_fee_headers(state.db(), params.active_only).await {
        Ok(headers) => (StatusCode::OK, Json(json!({ "headers": headers }))).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn create_fee_header(
    State(state): State<AppState>,
    Json(input): Json<FeeHeaderInput>,
) -> impl IntoResponse {
    match fee_service::save_fee_header(state.db(), None, input).await {
        Ok(header) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "header": header
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn update_fee_header(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(input): Json<FeeHeaderInput>,
) -> impl IntoResponse {
    match fee_service::save_fee_header(state.db(), Some(id), input).await {
        Ok(header) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "header": header
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// DELETE /api/fees/headers/:id - Headers are deactivated, never removed
pub async fn deactivate_fee_header(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match fee_service::deactivate_fee_header(state.db(), id).await {
        Ok(header) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "header": header
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// POST /api/fees/assign - Skipped duplicates still answer 200
pub async fn assign_fee(
    State(state): State<AppState>,
    Json(payload): Json<AssignFeeRequest>,
) -> impl IntoResponse {
    match fee_service::assign_fee(
        state.db(),
        payload.student_id,
        payload.header_id,
        payload.amount,
        payload.due_date,
    )
    .await
    {
        Ok(outcome) => {
            let status = match outcome {
                AssignOutcome::Assigned { .. } => StatusCode::CREATED,
                AssignOutcome::Skipped { .. } => StatusCode::OK,
            };
            (
                status,
                Json(json!({
                    "success": true,
                    "result": outcome
                })),
            )
                .into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// POST /api/students/:id/fees - Apply several headers at once
pub async fn assign_fees(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(requests): Json<Vec<AssignmentRequest>>,
) -> impl IntoResponse {
    match fee_service::assign_fees(state.db(), id, requests).await {
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

#[utoipa::path(
    get,
    path = "/api/students/{id}/fees",
    params(("id" = i32, Path, description = "Student id")),
    responses(
        (status = 200, description = "Outstanding fee lines and payment history"),
        (status = 404, description = "Unknown student")
    )
)]
pub async fn student_fee_summary(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match fee_service::student_fee_summary(state.db(), id).await {
        Ok(summary) => (StatusCode::OK, Json(json!(summary))).into_response(),
        Err(e) => error_response(&e),
    }
}

#[utoipa::path(
    post,
    path = "/api/fees/collections",
    responses(
        (status = 201, description = "Collection recorded with its voucher"),
        (status = 400, description = "Invalid amounts or over-collection"),
        (status = 404, description = "Unknown student or fee")
    )
)]
pub async fn collect_payment(
    State(state): State<AppState>,
    Json(request): Json<PaymentRequest>,
) -> impl IntoResponse {
    match fee_service::collect_payment(state.db(), request).await {
        Ok(recorded) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "voucher_no": recorded.collection.voucher_no,
                "collection": recorded.collection,
                "items": recorded.items
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

#[utoipa::path(
    post,
    path = "/api/fees/collections/bulk",
    responses(
        (status = 201, description = "Lump sum distributed oldest due date first"),
        (status = 400, description = "Amount paid must be positive")
    )
)]
pub async fn bulk_collect(
    State(state): State<AppState>,
    Json(request): Json<BulkPaymentRequest>,
) -> impl IntoResponse {
    match fee_service::bulk_distribute_payment(state.db(), request).await {
        Ok(recorded) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "voucher_no": recorded.collection.voucher_no,
                "collection": recorded.collection,
                "items": recorded.items,
                "unallocated": recorded.unallocated
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

#[utoipa::path(
    get,
    path = "/api/fees/collections/{id}",
    params(("id" = i32, Path, description = "Collection id")),
    responses(
        (status = 200, description = "Receipt"),
        (status = 404, description = "Unknown collection")
    )
)]
pub async fn get_receipt(State(state): State<AppState>, Path(id): Path<i32>) -> impl IntoResponse {
    match fee_service::get_receipt(state.db(), id).await {
        Ok(receipt) => (StatusCode::OK, Json(json!(receipt))).into_response(),
        Err(e) => error_response(&e),
    }
}
