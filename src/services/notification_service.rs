//! Notification side-channel
//!
//! Notifications ride along with the operation that triggers them but must
//! never undo it. Writes go through a savepoint: a failed insert rolls back to
//! the savepoint and is logged, and the caller's transaction carries on.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use serde::Serialize;

use crate::domain::LedgerError;
use crate::models::notification::{self, Entity as Notification};
use crate::models::user::{self, Entity as User};
use crate::models::UserRole;

pub const DEFAULT_FEED_SIZE: u64 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct NotificationFeed {
    pub notifications: Vec<notification::Model>,
    pub unread_count: u64,
}

async fn insert_all(
    savepoint: &DatabaseTransaction,
    recipients: &[i32],
    message: &str,
    link: Option<&str>,
    now: DateTime<Utc>,
) -> Result<usize, DbErr> {
    for user_id in recipients {
        notification::ActiveModel {
            user_id: Set(Some(*user_id)),
            message: Set(message.to_string()),
            link: Set(link.map(str::to_string)),
            is_read: Set(false),
            timestamp: Set(now),
            ..Default::default()
        }
        .insert(savepoint)
        .await?;
    }
    Ok(recipients.len())
}

/// Append one notification per recipient. Returns how many were written;
/// zero when the side-channel failed.
pub async fn notify_best_effort(
    txn: &DatabaseTransaction,
    recipients: &[i32],
    message: &str,
    link: Option<&str>,
    now: DateTime<Utc>,
) -> usize {
    if recipients.is_empty() {
        return 0;
    }

    let savepoint = match txn.begin().await {
        Ok(sp) => sp,
        Err(e) => {
            tracing::warn!("Could not open savepoint for notifications: {}", e);
            return 0;
        }
    };

    match insert_all(&savepoint, recipients, message, link, now).await {
        Ok(written) => match savepoint.commit().await {
            Ok(()) => written,
            Err(e) => {
                tracing::warn!("Notification savepoint release failed: {}", e);
                0
            }
        },
        Err(e) => {
            tracing::warn!(
                "Dropping notification '{}' for {:?}: {}",
                message,
                recipients,
                e
            );
            if let Err(e) = savepoint.rollback().await {
                tracing::warn!("Notification savepoint rollback failed: {}", e);
            }
            0
        }
    }
}

/// Ids of every active admin and librarian
pub async fn staff_recipients<C: ConnectionTrait>(conn: &C) -> Result<Vec<i32>, DbErr> {
    let staff = User::find()
        .filter(user::Column::Role.is_in([UserRole::Admin, UserRole::Librarian]))
        .filter(user::Column::IsActive.eq(true))
        .order_by_asc(user::Column::Id)
        .all(conn)
        .await?;
    Ok(staff.into_iter().map(|u| u.id).collect())
}

/// Newest notifications for a user and their unread count
pub async fn list_notifications(
    db: &DatabaseConnection,
    user_id: i32,
    limit: u64,
) -> Result<NotificationFeed, LedgerError> {
    let notifications = Notification::find()
        .filter(notification::Column::UserId.eq(user_id))
        .order_by_desc(notification::Column::Timestamp)
        .order_by_desc(notification::Column::Id)
        .limit(limit)
        .all(db)
        .await?;

    let unread_count = Notification::find()
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::IsRead.eq(false))
        .count(db)
        .await?;

    Ok(NotificationFeed {
        notifications,
        unread_count,
    })
}

pub async fn mark_all_read(db: &DatabaseConnection, user_id: i32) -> Result<u64, LedgerError> {
    let res = Notification::update_many()
        .col_expr(notification::Column::IsRead, Expr::value(true))
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::IsRead.eq(false))
        .exec(db)
        .await?;

    tracing::debug!("Marked {} notifications read for user {}", res.rows_affected, user_id);
    Ok(res.rows_affected)
}
