//! Fee allocation arithmetic
//!
//! Pure functions shared by the fee ledger: status derivation, the FIFO plan
//! used to spread a lump payment over outstanding fees, and voucher numbers.
//! Nothing here touches the database.

use chrono::NaiveDate;

use crate::models::FeeStatus;

/// Round a money amount to cents
pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Status of a fee given everything collected against it so far
pub fn derive_status(amount: f64, collected: f64) -> FeeStatus {
    let collected = round_money(collected);
    if collected >= round_money(amount) {
        FeeStatus::Paid
    } else if collected > 0.0 {
        FeeStatus::Partial
    } else {
        FeeStatus::Pending
    }
}

pub fn format_voucher(year: i32, sequence: i32) -> String {
    format!("VCH-{}-{:04}", year, sequence)
}

/// An outstanding fee as seen by the allocator
#[derive(Debug, Clone, PartialEq)]
pub struct OutstandingFee {
    pub student_fee_id: i32,
    pub amount: f64,
    /// Sum of all prior collection items
    pub collected: f64,
    pub due_date: Option<NaiveDate>,
}

impl OutstandingFee {
    pub fn balance(&self) -> f64 {
        round_money(self.amount - self.collected)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub student_fee_id: i32,
    pub amount: f64,
    pub discount: f64,
    /// Status after this allocation lands
    pub status: FeeStatus,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AllocationPlan {
    pub allocations: Vec<Allocation>,
    /// Part of the payment that matched no outstanding balance
    pub unallocated: f64,
}

/// Plan how `amount_paid` is spread over `fees`, oldest due date first.
///
/// Fees without a due date come after every dated fee; ties fall back to the
/// fee id. The discount is recorded once, on the first fee that receives
/// money. A fee never receives more than its balance.
pub fn plan_fifo(mut fees: Vec<OutstandingFee>, amount_paid: f64, discount: f64) -> AllocationPlan {
    fees.sort_by_key(|f| (f.due_date.is_none(), f.due_date, f.student_fee_id));

    let mut remaining = round_money(amount_paid);
    let mut allocations = Vec::new();

    for fee in fees {
        if remaining <= 0.0 {
            break;
        }

        let balance = fee.balance();
        if balance <= 0.0 {
            continue;
        }

        let to_apply = round_money(remaining.min(balance));
        let discount = if allocations.is_empty() { discount } else { 0.0 };
        remaining = round_money(remaining - to_apply);

        allocations.push(Allocation {
            student_fee_id: fee.student_fee_id,
            amount: to_apply,
            discount,
            status: derive_status(fee.amount, fee.collected + to_apply),
        });
    }

    AllocationPlan {
        allocations,
        unallocated: remaining.max(0.0),
    }
}
