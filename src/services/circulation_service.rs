//! Circulation Service - copy bookkeeping, issues, returns and fines
//!
//! Each mutation runs in one transaction. Copy counts move only through
//! conditional single-statement updates so concurrent requests can never push
//! `available_copies` outside `0..=total_copies`.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::{LedgerError, LoanPolicy};
use crate::infrastructure::repositories::student_repository::active_student;
use crate::models::book::{self, Entity as Book};
use crate::models::fine::{self, Entity as Fine};
use crate::models::issue::{self, Entity as Issue};
use crate::models::user::{self, Entity as User};
use crate::models::{IssueStatus, UserRole};
use crate::services::allocation::round_money;
use crate::services::audit;

/// Fine owed for a return, if any.
///
/// Only whole overdue days count: returning 23 hours late costs nothing.
pub fn compute_fine(
    due_date: DateTime<Utc>,
    returned_at: DateTime<Utc>,
    fine_per_day: f64,
) -> Option<f64> {
    if returned_at <= due_date {
        return None;
    }
    let overdue_days = (returned_at - due_date).num_days();
    let amount = round_money(overdue_days as f64 * fine_per_day);
    (amount > 0.0).then_some(amount)
}

/// Result of a successful return
#[derive(Debug, Clone, Serialize)]
pub struct ReturnReceipt {
    pub issue: issue::Model,
    pub fine: Option<fine::Model>,
}

/// Paying a fine twice is reported, not rejected
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "fine", rename_all = "snake_case")]
pub enum PayFineOutcome {
    Paid(fine::Model),
    AlreadyPaid(fine::Model),
}

impl PayFineOutcome {
    pub fn fine(&self) -> &fine::Model {
        match self {
            PayFineOutcome::Paid(f) | PayFineOutcome::AlreadyPaid(f) => f,
        }
    }
}

/// Issue enriched with borrower and book info
#[derive(Debug, Clone, Serialize)]
pub struct IssueWithDetails {
    #[serde(flatten)]
    pub issue: issue::Model,
    pub student_name: String,
    pub username: String,
    pub book_title: String,
    pub isbn: String,
    pub fine: Option<fine::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FineWithDetails {
    #[serde(flatten)]
    pub fine: fine::Model,
    pub student_name: String,
    pub book_title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverdueCounts {
    /// Open issues due on the current day
    pub due_today: u64,
    /// Open issues already past their due date
    pub pending_returns: u64,
}

/// Lend one copy. Shared by direct issue and request approval.
pub(crate) async fn issue_within<C: ConnectionTrait>(
    conn: &C,
    policy: LoanPolicy,
    student_id: i32,
    book_id: i32,
    now: DateTime<Utc>,
) -> Result<issue::Model, LedgerError> {
    active_student(conn, student_id).await?;

    let book = Book::find_by_id(book_id)
        .filter(book::Column::IsDeleted.eq(false))
        .one(conn)
        .await?
        .ok_or_else(|| LedgerError::not_found("book", book_id))?;

    let res = Book::update_many()
        .col_expr(
            book::Column::AvailableCopies,
            Expr::col(book::Column::AvailableCopies).sub(1),
        )
        .filter(book::Column::Id.eq(book_id))
        .filter(book::Column::AvailableCopies.gte(1))
        .exec(conn)
        .await?;

    if res.rows_affected == 0 {
        return Err(LedgerError::Unavailable(format!(
            "No copies of '{}' are available",
            book.title
        )));
    }

    let issue = issue::ActiveModel {
        book_id: Set(book_id),
        user_id: Set(student_id),
        issue_date: Set(now),
        due_date: Set(now + Duration::days(policy.loan_days)),
        return_date: Set(None),
        status: Set(IssueStatus::Issued),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    Ok(issue)
}

pub async fn issue_book(
    db: &DatabaseConnection,
    policy: LoanPolicy,
    student_id: i32,
    book_id: i32,
) -> Result<issue::Model, LedgerError> {
    issue_book_at(db, policy, student_id, book_id, Utc::now()).await
}

pub async fn issue_book_at(
    db: &DatabaseConnection,
    policy: LoanPolicy,
    student_id: i32,
    book_id: i32,
    now: DateTime<Utc>,
) -> Result<issue::Model, LedgerError> {
    let txn = db.begin().await?;

    let issue = issue_within(&txn, policy, student_id, book_id, now).await?;
    audit::record(
        &txn,
        "ISSUE_BOOK",
        format!("Issue {}: book {} to student {}", issue.id, book_id, student_id),
        Some(student_id),
        now,
    )
    .await?;

    txn.commit().await?;

    tracing::info!(
        "Issued book {} to student {} (issue {}, due {})",
        book_id,
        student_id,
        issue.id,
        issue.due_date
    );
    Ok(issue)
}

/// Issue by username and ISBN, as typed at the circulation desk
pub async fn issue_book_by_identifiers(
    db: &DatabaseConnection,
    policy: LoanPolicy,
    username: &str,
    isbn: &str,
) -> Result<issue::Model, LedgerError> {
    let student = User::find()
        .filter(user::Column::Username.eq(username.trim()))
        .filter(user::Column::Role.eq(UserRole::Student))
        .filter(user::Column::IsActive.eq(true))
        .one(db)
        .await?
        .ok_or_else(|| LedgerError::not_found("student", username))?;

    let book = Book::find()
        .filter(book::Column::Isbn.eq(isbn.trim()))
        .filter(book::Column::IsDeleted.eq(false))
        .one(db)
        .await?
        .ok_or_else(|| LedgerError::not_found("book", isbn))?;

    issue_book(db, policy, student.id, book.id).await
}

pub async fn return_book(
    db: &DatabaseConnection,
    policy: LoanPolicy,
    issue_id: i32,
) -> Result<ReturnReceipt, LedgerError> {
    return_book_at(db, policy, issue_id, Utc::now()).await
}

pub async fn return_book_at(
    db: &DatabaseConnection,
    policy: LoanPolicy,
    issue_id: i32,
    now: DateTime<Utc>,
) -> Result<ReturnReceipt, LedgerError> {
    let txn = db.begin().await?;

    let existing = Issue::find_by_id(issue_id)
        .one(&txn)
        .await?
        .ok_or_else(|| LedgerError::not_found("issue", issue_id))?;

    let already_returned =
        || LedgerError::InvalidState(format!("Issue {} has already been returned", issue_id));

    if existing.status != IssueStatus::Issued {
        return Err(already_returned());
    }

    // Compare-and-swap on the status so a concurrent return loses cleanly
    let res = Issue::update_many()
        .col_expr(
            issue::Column::Status,
            Expr::value(IssueStatus::Returned.to_value()),
        )
        .col_expr(issue::Column::ReturnDate, Expr::value(now))
        .filter(issue::Column::Id.eq(issue_id))
        .filter(issue::Column::Status.eq(IssueStatus::Issued))
        .exec(&txn)
        .await?;
    if res.rows_affected == 0 {
        return Err(already_returned());
    }

    let restocked = Book::update_many()
        .col_expr(
            book::Column::AvailableCopies,
            Expr::col(book::Column::AvailableCopies).add(1),
        )
        .filter(book::Column::Id.eq(existing.book_id))
        .filter(Expr::col(book::Column::AvailableCopies).lt(Expr::col(book::Column::TotalCopies)))
        .exec(&txn)
        .await?;
    if restocked.rows_affected == 0 {
        tracing::warn!(
            "Book {} already has all copies on the shelf; return of issue {} left count unchanged",
            existing.book_id,
            issue_id
        );
    }

    let fine = match compute_fine(existing.due_date, now, policy.fine_per_day) {
        Some(amount) => Some(
            fine::ActiveModel {
                issue_id: Set(issue_id),
                amount: Set(amount),
                paid: Set(false),
                paid_date: Set(None),
                ..Default::default()
            }
            .insert(&txn)
            .await?,
        ),
        None => None,
    };

    audit::record(
        &txn,
        "RETURN_BOOK",
        match &fine {
            Some(f) => format!("Issue {} returned with fine {:.2}", issue_id, f.amount),
            None => format!("Issue {} returned", issue_id),
        },
        Some(existing.user_id),
        now,
    )
    .await?;

    txn.commit().await?;

    tracing::info!(
        "Returned issue {} (book {}), fine: {:?}",
        issue_id,
        existing.book_id,
        fine.as_ref().map(|f| f.amount)
    );

    Ok(ReturnReceipt {
        issue: issue::Model {
            status: IssueStatus::Returned,
            return_date: Some(now),
            ..existing
        },
        fine,
    })
}

pub async fn pay_fine(db: &DatabaseConnection, fine_id: i32) -> Result<PayFineOutcome, LedgerError> {
    pay_fine_at(db, fine_id, Utc::now()).await
}

pub async fn pay_fine_at(
    db: &DatabaseConnection,
    fine_id: i32,
    now: DateTime<Utc>,
) -> Result<PayFineOutcome, LedgerError> {
    let txn = db.begin().await?;

    let existing = Fine::find_by_id(fine_id)
        .one(&txn)
        .await?
        .ok_or_else(|| LedgerError::not_found("fine", fine_id))?;

    if existing.paid {
        tracing::debug!("Fine {} already paid", fine_id);
        return Ok(PayFineOutcome::AlreadyPaid(existing));
    }

    let res = Fine::update_many()
        .col_expr(fine::Column::Paid, Expr::value(true))
        .col_expr(fine::Column::PaidDate, Expr::value(now))
        .filter(fine::Column::Id.eq(fine_id))
        .filter(fine::Column::Paid.eq(false))
        .exec(&txn)
        .await?;
    if res.rows_affected == 0 {
        let current = Fine::find_by_id(fine_id)
            .one(&txn)
            .await?
            .ok_or_else(|| LedgerError::not_found("fine", fine_id))?;
        return Ok(PayFineOutcome::AlreadyPaid(current));
    }

    audit::record(
        &txn,
        "PAY_FINE",
        format!("Fine {} of {:.2} paid", fine_id, existing.amount),
        None,
        now,
    )
    .await?;

    txn.commit().await?;

    tracing::info!("Fine {} paid ({:.2})", fine_id, existing.amount);
    Ok(PayFineOutcome::Paid(fine::Model {
        paid: true,
        paid_date: Some(now),
        ..existing
    }))
}

async fn with_details<C: ConnectionTrait>(
    conn: &C,
    issues: Vec<issue::Model>,
) -> Result<Vec<IssueWithDetails>, LedgerError> {
    if issues.is_empty() {
        return Ok(Vec::new());
    }

    let user_ids: Vec<i32> = issues.iter().map(|i| i.user_id).collect();
    let book_ids: Vec<i32> = issues.iter().map(|i| i.book_id).collect();
    let issue_ids: Vec<i32> = issues.iter().map(|i| i.id).collect();

    let users: HashMap<i32, user::Model> = User::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    let books: HashMap<i32, book::Model> = Book::find()
        .filter(book::Column::Id.is_in(book_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|b| (b.id, b))
        .collect();
    let mut fines: HashMap<i32, fine::Model> = Fine::find()
        .filter(fine::Column::IssueId.is_in(issue_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|f| (f.issue_id, f))
        .collect();

    Ok(issues
        .into_iter()
        .map(|issue| {
            let student = users.get(&issue.user_id);
            let book = books.get(&issue.book_id);
            IssueWithDetails {
                student_name: student
                    .map(|u| u.full_name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                username: student.map(|u| u.username.clone()).unwrap_or_default(),
                book_title: book
                    .map(|b| b.title.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                isbn: book.map(|b| b.isbn.clone()).unwrap_or_default(),
                fine: fines.remove(&issue.id),
                issue,
            }
        })
        .collect())
}

/// Open issues, newest first, optionally filtered by borrower or book
pub async fn list_active_issues(
    db: &DatabaseConnection,
    search: Option<&str>,
) -> Result<Vec<IssueWithDetails>, LedgerError> {
    let mut query = Issue::find()
        .filter(issue::Column::Status.eq(IssueStatus::Issued))
        .order_by_desc(issue::Column::IssueDate)
        .order_by_desc(issue::Column::Id);

    if let Some(q) = search.map(str::trim)
        && !q.is_empty()
    {
        query = query
            .join(JoinType::InnerJoin, issue::Relation::User.def())
            .join(JoinType::InnerJoin, issue::Relation::Book.def())
            .filter(
                Condition::any()
                    .add(user::Column::FullName.contains(q))
                    .add(user::Column::Username.contains(q))
                    .add(book::Column::Title.contains(q))
                    .add(book::Column::Isbn.contains(q)),
            );
    }

    let issues = query.all(db).await?;
    tracing::debug!("{} active issues", issues.len());
    with_details(db, issues).await
}

/// Full borrowing history of one student, newest first
pub async fn student_history(
    db: &DatabaseConnection,
    student_id: i32,
) -> Result<Vec<IssueWithDetails>, LedgerError> {
    User::find_by_id(student_id)
        .one(db)
        .await?
        .ok_or_else(|| LedgerError::not_found("student", student_id))?;

    let issues = Issue::find()
        .filter(issue::Column::UserId.eq(student_id))
        .order_by_desc(issue::Column::IssueDate)
        .order_by_desc(issue::Column::Id)
        .all(db)
        .await?;

    with_details(db, issues).await
}

/// Fines with unpaid ones first, then newest first
pub async fn list_fines(
    db: &DatabaseConnection,
    search: Option<&str>,
) -> Result<Vec<FineWithDetails>, LedgerError> {
    let fines = Fine::find()
        .order_by_asc(fine::Column::Paid)
        .order_by_desc(fine::Column::Id)
        .all(db)
        .await?;

    let issue_ids: Vec<i32> = fines.iter().map(|f| f.issue_id).collect();
    let issues = Issue::find()
        .filter(issue::Column::Id.is_in(issue_ids))
        .all(db)
        .await?;
    let details: HashMap<i32, IssueWithDetails> = with_details(db, issues)
        .await?
        .into_iter()
        .map(|d| (d.issue.id, d))
        .collect();

    let needle = search
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    Ok(fines
        .into_iter()
        .filter_map(|fine| {
            let detail = details.get(&fine.issue_id);
            let student_name = detail
                .map(|d| d.student_name.clone())
                .unwrap_or_else(|| "Unknown".to_string());
            let book_title = detail
                .map(|d| d.book_title.clone())
                .unwrap_or_else(|| "Unknown".to_string());

            if let Some(needle) = &needle
                && !student_name.to_lowercase().contains(needle)
                && !book_title.to_lowercase().contains(needle)
            {
                return None;
            }

            Some(FineWithDetails {
                fine,
                student_name,
                book_title,
            })
        })
        .collect())
}

pub async fn overdue_counts(db: &DatabaseConnection) -> Result<OverdueCounts, LedgerError> {
    overdue_counts_at(db, Utc::now()).await
}

pub async fn overdue_counts_at(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
) -> Result<OverdueCounts, LedgerError> {
    let start_of_day = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let end_of_day = start_of_day + Duration::days(1);

    let due_today = Issue::find()
        .filter(issue::Column::Status.eq(IssueStatus::Issued))
        .filter(issue::Column::DueDate.gte(start_of_day))
        .filter(issue::Column::DueDate.lt(end_of_day))
        .count(db)
        .await?;

    let pending_returns = Issue::find()
        .filter(issue::Column::Status.eq(IssueStatus::Issued))
        .filter(issue::Column::DueDate.lt(now))
        .count(db)
        .await?;

    Ok(OverdueCounts {
        due_today,
        pending_returns,
    })
}
