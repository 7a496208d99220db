//! Domain layer - Business abstractions shared by services and adapters
//!
//! Trait definitions, lending policy and the ledger error type.
//! No Axum types live here.

pub mod errors;
pub mod policy;
pub mod repositories;

pub use errors::LedgerError;
pub use policy::LoanPolicy;
pub use repositories::*;
