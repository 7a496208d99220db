pub mod books;
pub mod circulation;
pub mod dashboard;
pub mod fees;
pub mod health;
pub mod import;
pub mod requests;
pub mod students;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use crate::domain::LedgerError;
use crate::infrastructure::AppState;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Catalog
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/import", post(import::import_books))
        .route(
            "/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        // Directory
        .route(
            "/students",
            get(students::search_students).post(students::create_student),
        )
        .route("/students/import", post(import::import_students))
        .route(
            "/students/:id",
            get(students::get_student)
                .put(students::update_student)
                .delete(students::deactivate_student),
        )
        .route("/students/:id/history", get(circulation::student_history))
        .route(
            "/students/:id/fees",
            get(fees::student_fee_summary).post(fees::assign_fees),
        )
        .route("/students/:id/dashboard", get(dashboard::student_dashboard))
        .route("/staff", post(students::create_staff))
        // Circulation
        .route(
            "/issues",
            get(circulation::list_active_issues).post(circulation::issue_book),
        )
        .route("/issues/:id/return", post(circulation::return_book))
        .route("/fines", get(circulation::list_fines))
        .route("/fines/:id/pay", post(circulation::pay_fine))
        // Fee ledger
        .route(
            "/fees/headers",
            get(fees::list_fee_headers).post(fees::create_fee_header),
        )
        .route(
            "/fees/headers/:id",
            axum::routing::put(fees::update_fee_header).delete(fees::deactivate_fee_header),
        )
        .route("/fees/assign", post(fees::assign_fee))
        .route("/fees/assign/import", post(import::import_fee_assignments))
        .route("/fees/collections", post(fees::collect_payment))
        .route("/fees/collections/bulk", post(fees::bulk_collect))
        .route(
            "/fees/collections/import",
            post(import::import_bulk_collections),
        )
        .route("/fees/collections/:id", get(fees::get_receipt))
        // Requests & notifications
        .route(
            "/requests",
            get(requests::list_pending_requests).post(requests::create_request),
        )
        .route("/requests/:id/approve", post(requests::approve_request))
        .route("/requests/:id/reject", post(requests::reject_request))
        .route("/notifications/:user_id", get(requests::list_notifications))
        .route(
            "/notifications/:user_id/read",
            post(requests::mark_notifications_read),
        )
        // Dashboards
        .route("/dashboard/admin", get(dashboard::admin_dashboard))
        .route("/dashboard/circulation", get(dashboard::circulation_status))
        .route("/dashboard/overdue", get(dashboard::overdue_counts))
        .route("/dashboard/trends", get(dashboard::trends))
        .with_state(state)
}

/// Map a ledger error to its HTTP status and JSON body
pub(crate) fn error_response(e: &LedgerError) -> Response {
    let status = match e {
        LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
        LedgerError::InvalidState(_) | LedgerError::Unavailable(_) => StatusCode::CONFLICT,
        LedgerError::Validation(_) => StatusCode::BAD_REQUEST,
        LedgerError::Database(err) => {
            tracing::error!("Database error: {}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (
        status,
        Json(json!({
            "success": false,
            "error": e.to_string()
        })),
    )
        .into_response()
}
