//! Ledger error types
//!
//! Every service operation returns `Result<_, LedgerError>`. Informational
//! outcomes (duplicate assignment, fine already paid, unallocated payment)
//! are modelled as outcome values instead and never show up here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Referenced entity does not exist (or is deactivated / soft-deleted)
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Operation attempted from the wrong lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// No copy left to lend
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Caller-supplied input rejected
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
