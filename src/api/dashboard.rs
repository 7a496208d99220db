use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::error_response;
use crate::infrastructure::AppState;
use crate::services::analytics_service::{self, TrendRange};
use crate::services::circulation_service;

#[derive(Deserialize)]
pub struct TrendQuery {
    pub range: Option<TrendRange>,
}

#[utoipa::path(
    get,
    path = "/api/dashboard/admin",
    responses(
        (status = 200, description = "Library and fee totals")
    )
)]
pub async fn admin_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    match analytics_service::admin_dashboard(state.db()).await {
        Ok(stats) => (StatusCode::OK, Json(json!(stats))).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn student_dashboard(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match analytics_service::student_dashboard(state.db(), id).await {
        Ok(stats) => (StatusCode::OK, Json(json!(stats))).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn circulation_status(State(state): State<AppState>) -> impl IntoResponse {
    match analytics_service::circulation_status(state.db()).await {
        Ok(status) => (StatusCode::OK, Json(json!(status))).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn overdue_counts(State(state): State<AppState>) -> impl IntoResponse {
    match circulation_service::overdue_counts(state.db()).await {
        Ok(counts) => (StatusCode::OK, Json(json!(counts))).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Chart data: activity per day or month plus the catalog by category
pub async fn trends(
    State(state): State<AppState>,
    Query(query): Query<TrendQuery>,
) -> impl IntoResponse {
    let range = query.range.unwrap_or_default();
    let trends = match analytics_service::analytics_trends(state.db(), range, Utc::now()).await {
        Ok(trends) => trends,
        Err(e) => return error_response(&e),
    };
    match analytics_service::category_distribution(state.db()).await {
        Ok(categories) => (
            StatusCode::OK,
            Json(json!({ "trends": trends, "categories": categories })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}
