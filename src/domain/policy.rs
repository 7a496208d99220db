use serde::{Deserialize, Serialize};

pub const DEFAULT_LOAN_DAYS: i64 = 14;
pub const DEFAULT_FINE_PER_DAY: f64 = 5.0;

/// Lending rules applied by the circulation ledger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanPolicy {
    /// Days between issue and due date
    pub loan_days: i64,
    /// Fine charged per full overdue day
    pub fine_per_day: f64,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            loan_days: DEFAULT_LOAN_DAYS,
            fine_per_day: DEFAULT_FINE_PER_DAY,
        }
    }
}
