//! Request Service - students ask for a book, staff approve or reject
//!
//! Approval lends the copy through the same conditional decrement as a desk
//! issue. Every transition notifies the other side on a best-effort basis.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::{LedgerError, LoanPolicy};
use crate::infrastructure::repositories::student_repository::active_student;
use crate::models::RequestStatus;
use crate::models::book::{self, Entity as Book};
use crate::models::book_request::{self, Entity as BookRequest};
use crate::models::issue;
use crate::models::user::{self, Entity as User};
use crate::services::circulation_service::issue_within;
use crate::services::{audit, notification_service};

#[derive(Debug, Clone, Serialize)]
pub struct RequestWithDetails {
    #[serde(flatten)]
    pub request: book_request::Model,
    pub student_name: String,
    pub book_title: String,
    pub available_copies: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovedRequest {
    pub request: book_request::Model,
    pub issue: issue::Model,
}

/// Move a pending request to `to`, or report that someone got there first
async fn close_request<C: ConnectionTrait>(
    conn: &C,
    request_id: i32,
    to: RequestStatus,
) -> Result<book_request::Model, LedgerError> {
    let request = BookRequest::find_by_id(request_id)
        .one(conn)
        .await?
        .ok_or_else(|| LedgerError::not_found("book request", request_id))?;

    let not_pending = || {
        LedgerError::InvalidState(format!("Request {} is no longer pending", request_id))
    };
    if request.status != RequestStatus::Pending {
        return Err(not_pending());
    }

    let res = BookRequest::update_many()
        .col_expr(book_request::Column::Status, Expr::value(to.to_value()))
        .filter(book_request::Column::Id.eq(request_id))
        .filter(book_request::Column::Status.eq(RequestStatus::Pending))
        .exec(conn)
        .await?;
    if res.rows_affected == 0 {
        return Err(not_pending());
    }

    Ok(book_request::Model {
        status: to,
        ..request
    })
}

pub async fn request_book(
    db: &DatabaseConnection,
    student_id: i32,
    book_id: i32,
) -> Result<book_request::Model, LedgerError> {
    request_book_at(db, student_id, book_id, Utc::now()).await
}

pub async fn request_book_at(
    db: &DatabaseConnection,
    student_id: i32,
    book_id: i32,
    now: DateTime<Utc>,
) -> Result<book_request::Model, LedgerError> {
    let txn = db.begin().await?;

    let student = active_student(&txn, student_id).await?;
    let book = Book::find_by_id(book_id)
        .filter(book::Column::IsDeleted.eq(false))
        .one(&txn)
        .await?
        .ok_or_else(|| LedgerError::not_found("book", book_id))?;

    if book.available_copies < 1 {
        return Err(LedgerError::Unavailable(format!(
            "No copies of '{}' are available",
            book.title
        )));
    }

    let duplicate = BookRequest::find()
        .filter(book_request::Column::UserId.eq(student_id))
        .filter(book_request::Column::BookId.eq(book_id))
        .filter(book_request::Column::Status.eq(RequestStatus::Pending))
        .count(&txn)
        .await?;
    if duplicate > 0 {
        return Err(LedgerError::InvalidState(format!(
            "A request for '{}' is already pending",
            book.title
        )));
    }

    let request = book_request::ActiveModel {
        user_id: Set(student_id),
        book_id: Set(book_id),
        request_date: Set(now),
        status: Set(RequestStatus::Pending),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let staff = notification_service::staff_recipients(&txn).await?;
    notification_service::notify_best_effort(
        &txn,
        &staff,
        &format!("{} requested '{}'", student.full_name, book.title),
        Some("/requests"),
        now,
    )
    .await;

    txn.commit().await?;

    tracing::info!(
        "Student {} requested book {} (request {})",
        student_id,
        book_id,
        request.id
    );
    Ok(request)
}

pub async fn approve_request(
    db: &DatabaseConnection,
    policy: LoanPolicy,
    request_id: i32,
) -> Result<ApprovedRequest, LedgerError> {
    approve_request_at(db, policy, request_id, Utc::now()).await
}

/// Approve and lend in one transaction. Without a free copy nothing changes.
pub async fn approve_request_at(
    db: &DatabaseConnection,
    policy: LoanPolicy,
    request_id: i32,
    now: DateTime<Utc>,
) -> Result<ApprovedRequest, LedgerError> {
    let txn = db.begin().await?;

    let request = close_request(&txn, request_id, RequestStatus::Approved).await?;
    let issue = issue_within(&txn, policy, request.user_id, request.book_id, now).await?;

    let title = Book::find_by_id(request.book_id)
        .one(&txn)
        .await?
        .map(|b| b.title)
        .unwrap_or_default();

    audit::record(
        &txn,
        "ISSUE_BOOK",
        format!(
            "Issue {}: book {} to student {} via request {}",
            issue.id, request.book_id, request.user_id, request_id
        ),
        Some(request.user_id),
        now,
    )
    .await?;

    notification_service::notify_best_effort(
        &txn,
        &[request.user_id],
        &format!("Your request for '{}' was approved", title),
        Some("/history"),
        now,
    )
    .await;

    txn.commit().await?;

    tracing::info!("Request {} approved as issue {}", request_id, issue.id);
    Ok(ApprovedRequest { request, issue })
}

pub async fn reject_request(
    db: &DatabaseConnection,
    request_id: i32,
) -> Result<book_request::Model, LedgerError> {
    let now = Utc::now();
    let txn = db.begin().await?;

    let request = close_request(&txn, request_id, RequestStatus::Rejected).await?;

    let title = Book::find_by_id(request.book_id)
        .one(&txn)
        .await?
        .map(|b| b.title)
        .unwrap_or_default();

    notification_service::notify_best_effort(
        &txn,
        &[request.user_id],
        &format!("Your request for '{}' was rejected", title),
        None,
        now,
    )
    .await;

    txn.commit().await?;

    tracing::info!("Request {} rejected", request_id);
    Ok(request)
}

/// Pending requests, newest first
pub async fn list_pending_requests(
    db: &DatabaseConnection,
) -> Result<Vec<RequestWithDetails>, LedgerError> {
    let requests = BookRequest::find()
        .filter(book_request::Column::Status.eq(RequestStatus::Pending))
        .order_by_desc(book_request::Column::RequestDate)
        .order_by_desc(book_request::Column::Id)
        .find_also_related(Book)
        .all(db)
        .await?;

    let user_ids: Vec<i32> = requests.iter().map(|(r, _)| r.user_id).collect();
    let names: HashMap<i32, String> = User::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.full_name))
        .collect();

    Ok(requests
        .into_iter()
        .map(|(request, book)| RequestWithDetails {
            student_name: names
                .get(&request.user_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string()),
            book_title: book
                .as_ref()
                .map(|b| b.title.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            available_copies: book.map(|b| b.available_copies).unwrap_or(0),
            request,
        })
        .collect())
}
