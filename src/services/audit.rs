use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, Set};

use crate::models::audit_log;

/// Append an audit row on the caller's connection (normally its transaction)
pub async fn record<C: ConnectionTrait>(
    conn: &C,
    action: &str,
    details: String,
    user_id: Option<i32>,
    now: DateTime<Utc>,
) -> Result<(), DbErr> {
    audit_log::ActiveModel {
        action: Set(action.to_string()),
        details: Set(Some(details)),
        timestamp: Set(now),
        user_id: Set(user_id),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(())
}
