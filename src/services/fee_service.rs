//! Fee Service - fee headers, per-student assignments and collections
//!
//! A StudentFee's status is stored but derived: every time a collection item
//! lands on it, the status is recomputed from the sum of all its items and
//! persisted in the same transaction.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use sea_orm::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::LedgerError;
use crate::import::{BulkCollectionRow, FeeAssignmentRow};
use crate::infrastructure::repositories::student_repository::active_student;
use crate::models::fee_collection::{self, Entity as FeeCollection};
use crate::models::fee_collection_item::{self, Entity as FeeCollectionItem};
use crate::models::fee_header::{self, Entity as FeeHeader};
use crate::models::student_fee::{self, Entity as StudentFee};
use crate::models::user::{self, Entity as User};
use crate::models::{FeeStatus, UserRole};
use crate::services::allocation::{
    OutstandingFee, derive_status, format_voucher, plan_fifo, round_money,
};
use crate::services::audit;

// ---------------------------------------------------------------------------
// Inputs and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct FeeHeaderInput {
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    pub due_date: Option<NaiveDate>,
    pub amount: f64,
    pub admission_type: Option<String>,
    pub applicable_for: Option<String>,
    pub end_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

/// Assigning a fee twice while the first is still pending is a no-op
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AssignOutcome {
    Assigned { student_fee: student_fee::Model },
    Skipped { existing_id: i32 },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentRequest {
    pub header_id: i32,
    /// Defaults to the header amount
    pub amount: Option<f64>,
    /// Defaults to the header due date
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssignSummary {
    pub assigned: usize,
    pub skipped: usize,
}

/// Descriptive fields of a collection
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionMetadata {
    /// Defaults to the time of recording
    pub collection_date: Option<NaiveDate>,
    /// Defaults to "<year>-<year+1>" of the collection date
    pub academic_year: Option<String>,
    pub payment_mode: Option<String>,
    pub bank_name: Option<String>,
    pub transaction_no: Option<String>,
    pub transaction_date: Option<NaiveDate>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemRequest {
    pub student_fee_id: i32,
    pub amount_collected: f64,
    #[serde(default)]
    pub discount: f64,
}

/// Explicit per-item payment: the caller decides the split
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub student_id: i32,
    pub total_paid: f64,
    #[serde(default)]
    pub late_fees: f64,
    #[serde(default)]
    pub additional_charges: f64,
    pub items: Vec<ItemRequest>,
    #[serde(flatten)]
    pub metadata: CollectionMetadata,
}

/// Lump-sum payment spread oldest due date first
#[derive(Debug, Clone, Deserialize)]
pub struct BulkPaymentRequest {
    pub student_id: i32,
    pub amount_paid: f64,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub late_fees: f64,
    #[serde(default)]
    pub additional_charges: f64,
    #[serde(flatten)]
    pub metadata: CollectionMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordedCollection {
    pub collection: fee_collection::Model,
    pub items: Vec<fee_collection_item::Model>,
    /// Money that matched no outstanding balance
    pub unallocated: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeeLine {
    #[serde(flatten)]
    pub student_fee: student_fee::Model,
    pub header_name: String,
    pub collected: f64,
    pub payable: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeeSummary {
    pub student: user::Model,
    pub pending: Vec<FeeLine>,
    pub total_payable: f64,
    pub history: Vec<fee_collection::Model>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiptLine {
    #[serde(flatten)]
    pub item: fee_collection_item::Model,
    pub header_name: String,
    pub fee_amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub collection: fee_collection::Model,
    pub student_name: String,
    pub lines: Vec<ReceiptLine>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkImportSummary {
    pub processed: usize,
    pub skipped: usize,
    pub vouchers: Vec<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn non_negative(label: &str, value: f64) -> Result<f64, LedgerError> {
    if !value.is_finite() || value < 0.0 {
        return Err(LedgerError::Validation(format!(
            "{} must be a non-negative amount",
            label
        )));
    }
    Ok(round_money(value))
}

fn academic_year_for(year: i32) -> String {
    format!("{}-{}", year, year + 1)
}

/// Sum of `amount_collected` per student fee
async fn collected_by_fee<C: ConnectionTrait>(
    conn: &C,
    fee_ids: Vec<i32>,
) -> Result<HashMap<i32, f64>, DbErr> {
    let mut totals: HashMap<i32, f64> = HashMap::new();
    if fee_ids.is_empty() {
        return Ok(totals);
    }

    let items = FeeCollectionItem::find()
        .filter(fee_collection_item::Column::StudentFeeId.is_in(fee_ids))
        .all(conn)
        .await?;
    for item in items {
        *totals.entry(item.student_fee_id).or_insert(0.0) += item.amount_collected;
    }
    for total in totals.values_mut() {
        *total = round_money(*total);
    }
    Ok(totals)
}

/// Insert the collection row and stamp its voucher number.
///
/// The voucher reuses the auto-increment id, so two concurrent collections
/// can never compute the same number.
async fn open_collection<C: ConnectionTrait>(
    conn: &C,
    student_id: i32,
    total_amount: f64,
    late_fees: f64,
    additional_charges: f64,
    metadata: CollectionMetadata,
    now: DateTime<Utc>,
) -> Result<fee_collection::Model, DbErr> {
    let collection_date = metadata
        .collection_date
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .unwrap_or(now);
    let year = collection_date.year();

    let placeholder = fee_collection::ActiveModel {
        voucher_no: Set(format!("PENDING-{}", Uuid::new_v4())),
        collection_date: Set(collection_date),
        academic_year: Set(Some(
            metadata
                .academic_year
                .filter(|y| !y.trim().is_empty())
                .unwrap_or_else(|| academic_year_for(year)),
        )),
        payment_mode: Set(metadata.payment_mode),
        total_amount: Set(round_money(total_amount)),
        late_fees: Set(late_fees),
        additional_charges: Set(additional_charges),
        bank_name: Set(metadata.bank_name),
        transaction_no: Set(metadata.transaction_no),
        transaction_date: Set(metadata.transaction_date),
        remarks: Set(metadata.remarks),
        student_id: Set(student_id),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    let voucher_no = format_voucher(year, placeholder.id);
    let mut active: fee_collection::ActiveModel = placeholder.into();
    active.voucher_no = Set(voucher_no);
    active.update(conn).await
}

async fn record_item<C: ConnectionTrait>(
    conn: &C,
    collection_id: i32,
    fee: &student_fee::Model,
    amount: f64,
    discount: f64,
    status: FeeStatus,
) -> Result<fee_collection_item::Model, DbErr> {
    let item = fee_collection_item::ActiveModel {
        amount_collected: Set(amount),
        discount: Set(discount),
        collection_id: Set(collection_id),
        student_fee_id: Set(fee.id),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    if status != fee.status {
        let mut active: student_fee::ActiveModel = fee.clone().into();
        active.status = Set(status);
        active.update(conn).await?;
    }

    Ok(item)
}

// ---------------------------------------------------------------------------
// Fee headers
// ---------------------------------------------------------------------------

/// Create a header, or update it when `id` is given
pub async fn save_fee_header(
    db: &DatabaseConnection,
    id: Option<i32>,
    input: FeeHeaderInput,
) -> Result<fee_header::Model, LedgerError> {
    if input.name.trim().is_empty() {
        return Err(LedgerError::Validation("fee header name is required".into()));
    }
    let amount = non_negative("amount", input.amount)?;

    let mut active = match id {
        Some(id) => FeeHeader::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| LedgerError::not_found("fee header", id))?
            .into_active_model(),
        None => fee_header::ActiveModel {
            is_active: Set(true),
            ..Default::default()
        },
    };

    active.name = Set(input.name.trim().to_string());
    active.priority = Set(input.priority);
    active.due_date = Set(input.due_date);
    active.amount = Set(amount);
    active.admission_type = Set(input.admission_type.unwrap_or_else(|| "All".to_string()));
    active.applicable_for = Set(input.applicable_for.unwrap_or_else(|| "All".to_string()));
    active.end_date = Set(input.end_date);
    if let Some(is_active) = input.is_active {
        active.is_active = Set(is_active);
    }

    let saved = active.save(db).await?.try_into_model()?;
    tracing::info!("Fee header {} saved ({})", saved.id, saved.name);
    Ok(saved)
}

/// Headers by descending priority
pub async fn list_fee_headers(
    db: &DatabaseConnection,
    active_only: bool,
) -> Result<Vec<fee_header::Model>, LedgerError> {
    let mut query = FeeHeader::find();
    if active_only {
        query = query.filter(fee_header::Column::IsActive.eq(true));
    }

    Ok(query
        .order_by_desc(fee_header::Column::Priority)
        .order_by_asc(fee_header::Column::Id)
        .all(db)
        .await?)
}

pub async fn deactivate_fee_header(
    db: &DatabaseConnection,
    id: i32,
) -> Result<fee_header::Model, LedgerError> {
    let header = FeeHeader::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| LedgerError::not_found("fee header", id))?;

    let mut active = header.into_active_model();
    active.is_active = Set(false);
    let updated = active.update(db).await?;

    tracing::info!("Fee header {} deactivated", id);
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

async fn assign_within<C: ConnectionTrait>(
    conn: &C,
    student_id: i32,
    header: &fee_header::Model,
    amount: Option<f64>,
    due_date: Option<NaiveDate>,
    now: DateTime<Utc>,
) -> Result<AssignOutcome, LedgerError> {
    if let Some(existing) = StudentFee::find()
        .filter(student_fee::Column::StudentId.eq(student_id))
        .filter(student_fee::Column::FeeHeaderId.eq(header.id))
        .filter(student_fee::Column::Status.eq(FeeStatus::Pending))
        .one(conn)
        .await?
    {
        tracing::info!(
            "Fee header {} already pending for student {} (fee {}), skipping",
            header.id,
            student_id,
            existing.id
        );
        return Ok(AssignOutcome::Skipped {
            existing_id: existing.id,
        });
    }

    let amount = non_negative("amount", amount.unwrap_or(header.amount))?;

    let student_fee = student_fee::ActiveModel {
        student_id: Set(student_id),
        fee_header_id: Set(header.id),
        amount: Set(amount),
        due_date: Set(due_date.or(header.due_date)),
        status: Set(FeeStatus::Pending),
        assigned_date: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    Ok(AssignOutcome::Assigned { student_fee })
}

async fn active_header<C: ConnectionTrait>(
    conn: &C,
    header_id: i32,
) -> Result<fee_header::Model, LedgerError> {
    let header = FeeHeader::find_by_id(header_id)
        .one(conn)
        .await?
        .ok_or_else(|| LedgerError::not_found("fee header", header_id))?;
    if !header.is_active {
        return Err(LedgerError::InvalidState(format!(
            "Fee header '{}' is inactive",
            header.name
        )));
    }
    Ok(header)
}

pub async fn assign_fee(
    db: &DatabaseConnection,
    student_id: i32,
    header_id: i32,
    amount: Option<f64>,
    due_date: Option<NaiveDate>,
) -> Result<AssignOutcome, LedgerError> {
    assign_fee_at(db, student_id, header_id, amount, due_date, Utc::now()).await
}

pub async fn assign_fee_at(
    db: &DatabaseConnection,
    student_id: i32,
    header_id: i32,
    amount: Option<f64>,
    due_date: Option<NaiveDate>,
    now: DateTime<Utc>,
) -> Result<AssignOutcome, LedgerError> {
    let txn = db.begin().await?;

    active_student(&txn, student_id).await?;
    let header = active_header(&txn, header_id).await?;
    let outcome = assign_within(&txn, student_id, &header, amount, due_date, now).await?;

    txn.commit().await?;

    if let AssignOutcome::Assigned { student_fee } = &outcome {
        tracing::info!(
            "Assigned '{}' ({:.2}) to student {} as fee {}",
            header.name,
            student_fee.amount,
            student_id,
            student_fee.id
        );
    }
    Ok(outcome)
}

/// Apply several headers to one student in a single transaction
pub async fn assign_fees(
    db: &DatabaseConnection,
    student_id: i32,
    requests: Vec<AssignmentRequest>,
) -> Result<AssignSummary, LedgerError> {
    let now = Utc::now();
    let txn = db.begin().await?;

    active_student(&txn, student_id).await?;

    let mut summary = AssignSummary::default();
    for request in requests {
        let header = active_header(&txn, request.header_id).await?;
        match assign_within(&txn, student_id, &header, request.amount, request.due_date, now)
            .await?
        {
            AssignOutcome::Assigned { .. } => summary.assigned += 1,
            AssignOutcome::Skipped { .. } => summary.skipped += 1,
        }
    }

    txn.commit().await?;
    tracing::info!(
        "Student {}: {} fees assigned, {} skipped",
        student_id,
        summary.assigned,
        summary.skipped
    );
    Ok(summary)
}

/// Assign fees from spreadsheet rows. Unknown users, unknown or inactive
/// header columns and non-numeric cells are skipped.
pub async fn import_fee_assignments(
    db: &DatabaseConnection,
    rows: Vec<FeeAssignmentRow>,
) -> Result<AssignSummary, LedgerError> {
    let now = Utc::now();
    let txn = db.begin().await?;

    let headers: HashMap<String, fee_header::Model> = FeeHeader::find()
        .filter(fee_header::Column::IsActive.eq(true))
        .all(&txn)
        .await?
        .into_iter()
        .map(|h| (h.name.clone(), h))
        .collect();

    let mut summary = AssignSummary::default();
    for row in rows {
        let student = User::find()
            .filter(user::Column::Username.eq(row.username.trim()))
            .filter(user::Column::Role.eq(UserRole::Student))
            .filter(user::Column::IsActive.eq(true))
            .one(&txn)
            .await?;
        let Some(student) = student else {
            tracing::warn!("Fee import: unknown student '{}'", row.username);
            summary.skipped += 1;
            continue;
        };

        for (header_name, cell) in row.cells {
            let Some(header) = headers.get(header_name.trim()) else {
                continue;
            };
            let amount = match crate::import::parse_amount(&cell) {
                Some(a) if a > 0.0 => a,
                _ => continue,
            };

            match assign_within(&txn, student.id, header, Some(amount), None, now).await? {
                AssignOutcome::Assigned { .. } => summary.assigned += 1,
                AssignOutcome::Skipped { .. } => summary.skipped += 1,
            }
        }
    }

    txn.commit().await?;
    tracing::info!(
        "Fee assignment import: {} assigned, {} skipped",
        summary.assigned,
        summary.skipped
    );
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

pub async fn collect_payment(
    db: &DatabaseConnection,
    request: PaymentRequest,
) -> Result<RecordedCollection, LedgerError> {
    collect_payment_at(db, request, Utc::now()).await
}

/// Record a payment whose split over fees is chosen by the caller.
///
/// `total_amount` is stored as given. Items with neither money nor discount
/// are ignored. An item that would push a fee past its amount rejects the
/// whole payment.
pub async fn collect_payment_at(
    db: &DatabaseConnection,
    request: PaymentRequest,
    now: DateTime<Utc>,
) -> Result<RecordedCollection, LedgerError> {
    let total_paid = non_negative("total paid", request.total_paid)?;
    let late_fees = non_negative("late fees", request.late_fees)?;
    let additional_charges = non_negative("additional charges", request.additional_charges)?;

    let mut wanted = Vec::new();
    for item in &request.items {
        let amount = non_negative("amount collected", item.amount_collected)?;
        let discount = non_negative("discount", item.discount)?;
        if amount > 0.0 || discount > 0.0 {
            wanted.push((item.student_fee_id, amount, discount));
        }
    }

    let student_id = request.student_id;
    let txn = db.begin().await?;
    active_student(&txn, student_id).await?;

    let fee_ids: Vec<i32> = wanted.iter().map(|(id, _, _)| *id).collect();
    let mut fees: HashMap<i32, student_fee::Model> = StudentFee::find()
        .filter(student_fee::Column::Id.is_in(fee_ids.clone()))
        .all(&txn)
        .await?
        .into_iter()
        .map(|f| (f.id, f))
        .collect();

    for id in &fee_ids {
        match fees.get(id) {
            None => return Err(LedgerError::not_found("student fee", *id)),
            Some(fee) if fee.student_id != student_id => {
                return Err(LedgerError::Validation(format!(
                    "Fee {} does not belong to student {}",
                    id, student_id
                )));
            }
            Some(_) => {}
        }
    }

    let mut collected = collected_by_fee(&txn, fee_ids).await?;

    let collection = open_collection(
        &txn,
        student_id,
        total_paid,
        late_fees,
        additional_charges,
        request.metadata,
        now,
    )
    .await?;

    let mut items = Vec::with_capacity(wanted.len());
    for (fee_id, amount, discount) in wanted {
        let Some(fee) = fees.get_mut(&fee_id) else {
            return Err(LedgerError::not_found("student fee", fee_id));
        };

        let running = collected.entry(fee_id).or_insert(0.0);
        let after = round_money(*running + amount);
        if after > round_money(fee.amount) {
            return Err(LedgerError::Validation(format!(
                "Collecting {:.2} on fee {} exceeds its balance of {:.2}",
                amount,
                fee_id,
                round_money(fee.amount - *running)
            )));
        }
        *running = after;

        let status = derive_status(fee.amount, after);
        items.push(record_item(&txn, collection.id, fee, amount, discount, status).await?);
        fee.status = status;
    }

    audit::record(
        &txn,
        "COLLECT_FEE",
        format!(
            "{} for student {}: {:.2} over {} items",
            collection.voucher_no,
            student_id,
            collection.total_amount,
            items.len()
        ),
        Some(student_id),
        now,
    )
    .await?;

    txn.commit().await?;

    tracing::info!(
        "Collected {} from student {} ({:.2}, {} items)",
        collection.voucher_no,
        student_id,
        collection.total_amount,
        items.len()
    );

    Ok(RecordedCollection {
        collection,
        items,
        unallocated: 0.0,
    })
}

async fn bulk_within<C: ConnectionTrait>(
    conn: &C,
    request: BulkPaymentRequest,
    now: DateTime<Utc>,
) -> Result<RecordedCollection, LedgerError> {
    if !request.amount_paid.is_finite() || request.amount_paid <= 0.0 {
        return Err(LedgerError::Validation(
            "amount paid must be greater than zero".into(),
        ));
    }
    let amount_paid = round_money(request.amount_paid);
    let discount = non_negative("discount", request.discount)?;
    let late_fees = non_negative("late fees", request.late_fees)?;
    let additional_charges = non_negative("additional charges", request.additional_charges)?;

    let student_id = request.student_id;
    active_student(conn, student_id).await?;

    let open_fees = StudentFee::find()
        .filter(student_fee::Column::StudentId.eq(student_id))
        .filter(student_fee::Column::Status.is_in([FeeStatus::Pending, FeeStatus::Partial]))
        .all(conn)
        .await?;
    let collected = collected_by_fee(conn, open_fees.iter().map(|f| f.id).collect()).await?;

    let plan = plan_fifo(
        open_fees
            .iter()
            .map(|f| OutstandingFee {
                student_fee_id: f.id,
                amount: f.amount,
                collected: collected.get(&f.id).copied().unwrap_or(0.0),
                due_date: f.due_date,
            })
            .collect(),
        amount_paid,
        discount,
    );

    let collection = open_collection(
        conn,
        student_id,
        amount_paid + late_fees + additional_charges,
        late_fees,
        additional_charges,
        request.metadata,
        now,
    )
    .await?;

    let fees: HashMap<i32, &student_fee::Model> = open_fees.iter().map(|f| (f.id, f)).collect();
    let mut items = Vec::with_capacity(plan.allocations.len());
    for allocation in &plan.allocations {
        let fee = fees
            .get(&allocation.student_fee_id)
            .ok_or_else(|| LedgerError::not_found("student fee", allocation.student_fee_id))?;
        items.push(
            record_item(
                conn,
                collection.id,
                fee,
                allocation.amount,
                allocation.discount,
                allocation.status,
            )
            .await?,
        );
    }

    if plan.unallocated > 0.0 {
        tracing::warn!(
            "{}: {:.2} of {:.2} exceeded the balance owed by student {} and was not allocated",
            collection.voucher_no,
            plan.unallocated,
            amount_paid,
            student_id
        );
    }

    audit::record(
        conn,
        "COLLECT_FEE",
        format!(
            "{} (bulk) for student {}: {:.2} over {} items",
            collection.voucher_no,
            student_id,
            collection.total_amount,
            items.len()
        ),
        Some(student_id),
        now,
    )
    .await?;

    Ok(RecordedCollection {
        collection,
        items,
        unallocated: plan.unallocated,
    })
}

pub async fn bulk_distribute_payment(
    db: &DatabaseConnection,
    request: BulkPaymentRequest,
) -> Result<RecordedCollection, LedgerError> {
    bulk_distribute_payment_at(db, request, Utc::now()).await
}

/// Spread a lump sum over the student's open fees, oldest due date first
pub async fn bulk_distribute_payment_at(
    db: &DatabaseConnection,
    request: BulkPaymentRequest,
    now: DateTime<Utc>,
) -> Result<RecordedCollection, LedgerError> {
    let txn = db.begin().await?;
    let recorded = bulk_within(&txn, request, now).await?;
    txn.commit().await?;

    tracing::info!(
        "Bulk collected {} from student {} ({:.2}, {} items)",
        recorded.collection.voucher_no,
        recorded.collection.student_id,
        recorded.collection.total_amount,
        recorded.items.len()
    );
    Ok(recorded)
}

/// Run every spreadsheet row through the bulk allocator in one transaction.
/// Rows for unknown students or without a positive amount are skipped.
pub async fn import_bulk_collections(
    db: &DatabaseConnection,
    rows: Vec<BulkCollectionRow>,
) -> Result<BulkImportSummary, LedgerError> {
    let now = Utc::now();
    let txn = db.begin().await?;
    let mut summary = BulkImportSummary::default();

    for row in rows {
        let student = User::find()
            .filter(user::Column::Username.eq(row.username.trim()))
            .filter(user::Column::Role.eq(UserRole::Student))
            .filter(user::Column::IsActive.eq(true))
            .one(&txn)
            .await?;
        let Some(student) = student else {
            tracing::warn!("Collection import: unknown student '{}'", row.username);
            summary.skipped += 1;
            continue;
        };
        if row.amount_paid <= 0.0 {
            summary.skipped += 1;
            continue;
        }

        let request = BulkPaymentRequest {
            student_id: student.id,
            amount_paid: row.amount_paid,
            discount: row.discount,
            late_fees: row.late_fees,
            additional_charges: row.additional_charges,
            metadata: CollectionMetadata {
                collection_date: row.receipt_date,
                payment_mode: row.payment_mode,
                transaction_no: row.transaction_no,
                remarks: row.remarks,
                ..Default::default()
            },
        };

        let recorded = bulk_within(&txn, request, now).await?;
        summary.vouchers.push(recorded.collection.voucher_no);
        summary.processed += 1;
    }

    txn.commit().await?;
    tracing::info!(
        "Collection import: {} processed, {} skipped",
        summary.processed,
        summary.skipped
    );
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Outstanding lines and payment history for one student
pub async fn student_fee_summary(
    db: &DatabaseConnection,
    student_id: i32,
) -> Result<FeeSummary, LedgerError> {
    let student = User::find_by_id(student_id)
        .filter(user::Column::Role.eq(UserRole::Student))
        .one(db)
        .await?
        .ok_or_else(|| LedgerError::not_found("student", student_id))?;

    let fees = StudentFee::find()
        .filter(student_fee::Column::StudentId.eq(student_id))
        .all(db)
        .await?;
    let collected = collected_by_fee(db, fees.iter().map(|f| f.id).collect()).await?;

    let header_ids: Vec<i32> = fees.iter().map(|f| f.fee_header_id).collect();
    let header_names: HashMap<i32, String> = FeeHeader::find()
        .filter(fee_header::Column::Id.is_in(header_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|h| (h.id, h.name))
        .collect();

    let mut pending: Vec<FeeLine> = fees
        .into_iter()
        .filter_map(|fee| {
            let paid = collected.get(&fee.id).copied().unwrap_or(0.0);
            let payable = round_money(fee.amount - paid);
            (payable > 0.0 || fee.status == FeeStatus::Pending).then(|| FeeLine {
                header_name: header_names
                    .get(&fee.fee_header_id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string()),
                collected: paid,
                payable,
                student_fee: fee,
            })
        })
        .collect();
    pending.sort_by_key(|l| {
        (
            l.student_fee.due_date.is_none(),
            l.student_fee.due_date,
            l.student_fee.id,
        )
    });

    let total_payable = round_money(pending.iter().map(|l| l.payable.max(0.0)).sum());

    let history = FeeCollection::find()
        .filter(fee_collection::Column::StudentId.eq(student_id))
        .order_by_desc(fee_collection::Column::CollectionDate)
        .order_by_desc(fee_collection::Column::Id)
        .all(db)
        .await?;

    Ok(FeeSummary {
        student,
        pending,
        total_payable,
        history,
    })
}

/// Collection with its lines, for printing a receipt
pub async fn get_receipt(
    db: &DatabaseConnection,
    collection_id: i32,
) -> Result<Receipt, LedgerError> {
    let (collection, student) = FeeCollection::find_by_id(collection_id)
        .find_also_related(User)
        .one(db)
        .await?
        .ok_or_else(|| LedgerError::not_found("fee collection", collection_id))?;

    let items_with_fees = FeeCollectionItem::find()
        .filter(fee_collection_item::Column::CollectionId.eq(collection_id))
        .order_by_asc(fee_collection_item::Column::Id)
        .find_also_related(StudentFee)
        .all(db)
        .await?;

    let header_ids: Vec<i32> = items_with_fees
        .iter()
        .filter_map(|(_, fee)| fee.as_ref().map(|f| f.fee_header_id))
        .collect();
    let header_names: HashMap<i32, String> = FeeHeader::find()
        .filter(fee_header::Column::Id.is_in(header_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|h| (h.id, h.name))
        .collect();

    let lines = items_with_fees
        .into_iter()
        .map(|(item, fee)| ReceiptLine {
            header_name: fee
                .as_ref()
                .and_then(|f| header_names.get(&f.fee_header_id).cloned())
                .unwrap_or_else(|| "Unknown".to_string()),
            fee_amount: fee.map(|f| f.amount).unwrap_or(0.0),
            item,
        })
        .collect();

    Ok(Receipt {
        collection,
        student_name: student
            .map(|s| s.full_name)
            .unwrap_or_else(|| "Unknown".to_string()),
        lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn academic_year_spans_two_years() {
        assert_eq!(academic_year_for(2024), "2024-2025");
    }

    #[test]
    fn negative_and_nan_amounts_rejected() {
        assert!(non_negative("x", -1.0).is_err());
        assert!(non_negative("x", f64::NAN).is_err());
        assert_eq!(non_negative("x", 0.1 + 0.2).unwrap(), 0.3);
    }
}
