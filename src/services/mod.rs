//! Ledger services - business operations without the HTTP layer
//!
//! Functions take a `&DatabaseConnection` and return `Result<_, LedgerError>`.
//! Each mutation is one transaction.

pub mod allocation;
pub mod analytics_service;
pub mod audit;
pub mod circulation_service;
pub mod fee_service;
pub mod notification_service;
pub mod request_service;
