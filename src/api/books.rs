use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use super::error_response;
use crate::domain::{BookFilter, BookInput, BookUpdate, LedgerError};
use crate::infrastructure::AppState;

/// GET /api/books - Paginated catalog, optional `query` search
pub async fn list_books(
    State(state): State<AppState>,
    Query(filter): Query<BookFilter>,
) -> impl IntoResponse {
    match state.book_repo.find_all(filter).await {
        Ok(page) => (StatusCode::OK, Json(json!(page))).into_response(),
        Err(e) => error_response(&e),
    }
}

#[utoipa::path(
    post,
    path = "/api/books",
    responses(
        (status = 201, description = "Book added to the catalog"),
        (status = 400, description = "Missing fields or duplicate ISBN")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    Json(input): Json<BookInput>,
) -> impl IntoResponse {
    match state.book_repo.create(input).await {
        Ok(book) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "book": book
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

#[utoipa::path(
    get,
    path = "/api/books/{id}",
    params(("id" = i32, Path, description = "Book id")),
    responses(
        (status = 200, description = "Catalog entry"),
        (status = 404, description = "Unknown or deleted book")
    )
)]
pub async fn get_book(State(state): State<AppState>, Path(id): Path<i32>) -> impl IntoResponse {
    match state.book_repo.find_by_id(id).await {
        Ok(Some(book)) => (StatusCode::OK, Json(json!(book))).into_response(),
        Ok(None) => error_response(&LedgerError::not_found("book", id)),
        Err(e) => error_response(&e),
    }
}

/// PUT /api/books/:id - Edit fields; changing total copies shifts availability
pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(input): Json<BookUpdate>,
) -> impl IntoResponse {
    match state.book_repo.update(id, input).await {
        Ok(book) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "book": book
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// DELETE /api/books/:id - Soft delete
pub async fn delete_book(State(state): State<AppState>, Path(id): Path<i32>) -> impl IntoResponse {
    match state.book_repo.soft_delete(id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Book deleted successfully"
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}
