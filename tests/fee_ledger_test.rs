use campus_library::db;
use campus_library::domain::LedgerError;
use campus_library::import;
use campus_library::models::{FeeStatus, UserRole, fee_collection, student_fee, user};
use campus_library::services::fee_service::{
    self, AssignOutcome, AssignmentRequest, BulkPaymentRequest, CollectionMetadata,
    FeeHeaderInput, ItemRequest, PaymentRequest,
};
use chrono::{NaiveDate, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};
use std::collections::HashSet;

async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

async fn create_student(db: &DatabaseConnection, username: &str) -> i32 {
    user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(format!("{}@campus.test", username)),
        full_name: Set(format!("Student {}", username)),
        role: Set(UserRole::Student),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create student")
    .id
}

async fn create_header(db: &DatabaseConnection, name: &str, amount: f64) -> i32 {
    fee_service::save_fee_header(
        db,
        None,
        FeeHeaderInput {
            name: name.to_string(),
            priority: 0,
            due_date: None,
            amount,
            admission_type: None,
            applicable_for: None,
            end_date: None,
            is_active: None,
        },
    )
    .await
    .expect("Failed to create header")
    .id
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn assign(
    db: &DatabaseConnection,
    student_id: i32,
    header_id: i32,
    amount: f64,
    due: Option<NaiveDate>,
) -> i32 {
    match fee_service::assign_fee(db, student_id, header_id, Some(amount), due)
        .await
        .expect("Failed to assign fee")
    {
        AssignOutcome::Assigned { student_fee } => student_fee.id,
        AssignOutcome::Skipped { existing_id } => panic!("unexpected skip of {}", existing_id),
    }
}

fn bulk(student_id: i32, amount_paid: f64, discount: f64) -> BulkPaymentRequest {
    BulkPaymentRequest {
        student_id,
        amount_paid,
        discount,
        late_fees: 0.0,
        additional_charges: 0.0,
        metadata: CollectionMetadata::default(),
    }
}

async fn fee_status(db: &DatabaseConnection, id: i32) -> FeeStatus {
    student_fee::Entity::find_by_id(id)
        .one(db)
        .await
        .unwrap()
        .unwrap()
        .status
}

#[tokio::test]
async fn test_bulk_payment_settles_oldest_fee_first() {
    let db = setup_test_db().await;
    let student = create_student(&db, "asha").await;
    let tuition = create_header(&db, "Tuition", 200.0).await;
    let library = create_header(&db, "Library", 100.0).await;

    let newer = assign(&db, student, tuition, 200.0, Some(date(2024, 2, 1))).await;
    let older = assign(&db, student, library, 100.0, Some(date(2024, 1, 1))).await;

    let recorded = fee_service::bulk_distribute_payment(&db, bulk(student, 150.0, 0.0))
        .await
        .unwrap();

    assert_eq!(recorded.items.len(), 2);
    assert_eq!(recorded.items[0].student_fee_id, older);
    assert_eq!(recorded.items[0].amount_collected, 100.0);
    assert_eq!(recorded.items[1].student_fee_id, newer);
    assert_eq!(recorded.items[1].amount_collected, 50.0);
    assert_eq!(recorded.unallocated, 0.0);

    assert_eq!(fee_status(&db, older).await, FeeStatus::Paid);
    assert_eq!(fee_status(&db, newer).await, FeeStatus::Partial);

    let summary = fee_service::student_fee_summary(&db, student).await.unwrap();
    assert_eq!(summary.total_payable, 150.0);
    assert_eq!(summary.pending.len(), 1);
    assert_eq!(summary.history.len(), 1);
}

#[tokio::test]
async fn test_overpayment_is_reported_unallocated() {
    let db = setup_test_db().await;
    let student = create_student(&db, "asha").await;
    let header = create_header(&db, "Exam", 100.0).await;
    let fee = assign(&db, student, header, 100.0, Some(date(2024, 1, 1))).await;

    let recorded = fee_service::bulk_distribute_payment(&db, bulk(student, 130.0, 0.0))
        .await
        .unwrap();

    assert_eq!(recorded.items.len(), 1);
    assert_eq!(recorded.items[0].amount_collected, 100.0);
    assert_eq!(recorded.unallocated, 30.0);
    assert_eq!(recorded.collection.total_amount, 130.0);
    assert_eq!(fee_status(&db, fee).await, FeeStatus::Paid);
}

#[tokio::test]
async fn test_undated_fees_are_paid_last() {
    let db = setup_test_db().await;
    let student = create_student(&db, "asha").await;
    let misc = create_header(&db, "Misc", 50.0).await;
    let hostel = create_header(&db, "Hostel", 50.0).await;

    let undated = assign(&db, student, misc, 50.0, None).await;
    let dated = assign(&db, student, hostel, 50.0, Some(date(2025, 6, 30))).await;

    let recorded = fee_service::bulk_distribute_payment(&db, bulk(student, 60.0, 0.0))
        .await
        .unwrap();

    assert_eq!(recorded.items[0].student_fee_id, dated);
    assert_eq!(recorded.items[0].amount_collected, 50.0);
    assert_eq!(recorded.items[1].student_fee_id, undated);
    assert_eq!(recorded.items[1].amount_collected, 10.0);
}

#[tokio::test]
async fn test_discount_recorded_once() {
    let db = setup_test_db().await;
    let student = create_student(&db, "asha").await;
    let a = create_header(&db, "Term 1", 100.0).await;
    let b = create_header(&db, "Term 2", 100.0).await;
    assign(&db, student, a, 100.0, Some(date(2024, 1, 1))).await;
    assign(&db, student, b, 100.0, Some(date(2024, 2, 1))).await;

    let recorded = fee_service::bulk_distribute_payment(&db, bulk(student, 200.0, 25.0))
        .await
        .unwrap();

    let discounts: Vec<f64> = recorded.items.iter().map(|i| i.discount).collect();
    assert_eq!(discounts, vec![25.0, 0.0]);
}

#[tokio::test]
async fn test_bulk_payment_must_be_positive() {
    let db = setup_test_db().await;
    let student = create_student(&db, "asha").await;

    let err = fee_service::bulk_distribute_payment(&db, bulk(student, 0.0, 0.0))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
    assert_eq!(fee_collection::Entity::find().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_vouchers_are_unique_and_increasing() {
    let db = setup_test_db().await;
    let student = create_student(&db, "asha").await;
    let header = create_header(&db, "Tuition", 1000.0).await;
    assign(&db, student, header, 1000.0, Some(date(2024, 1, 1))).await;

    let mut vouchers = Vec::new();
    for _ in 0..3 {
        let mut request = bulk(student, 100.0, 0.0);
        request.metadata.collection_date = Some(date(2024, 7, 1));
        let recorded = fee_service::bulk_distribute_payment(&db, request)
            .await
            .unwrap();
        assert_eq!(recorded.collection.academic_year.as_deref(), Some("2024-2025"));
        vouchers.push(recorded.collection.voucher_no);
    }

    assert_eq!(vouchers[0], "VCH-2024-0001");
    assert_eq!(vouchers[2], "VCH-2024-0003");
    let unique: HashSet<&String> = vouchers.iter().collect();
    assert_eq!(unique.len(), 3);
    let mut sorted = vouchers.clone();
    sorted.sort();
    assert_eq!(sorted, vouchers);
}

#[tokio::test]
async fn test_duplicate_pending_assignment_is_skipped() {
    let db = setup_test_db().await;
    let student = create_student(&db, "asha").await;
    let header = create_header(&db, "Tuition", 500.0).await;

    let first = assign(&db, student, header, 500.0, None).await;
    let second = fee_service::assign_fee(&db, student, header, None, None)
        .await
        .unwrap();
    assert_eq!(second, AssignOutcome::Skipped { existing_id: first });

    let summary = fee_service::assign_fees(
        &db,
        student,
        vec![AssignmentRequest {
            header_id: header,
            amount: None,
            due_date: None,
        }],
    )
    .await
    .unwrap();
    assert_eq!(summary.assigned, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(student_fee::Entity::find().count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_inactive_header_cannot_be_assigned() {
    let db = setup_test_db().await;
    let student = create_student(&db, "asha").await;
    let header = create_header(&db, "Old Levy", 10.0).await;
    fee_service::deactivate_fee_header(&db, header).await.unwrap();

    let err = fee_service::assign_fee(&db, student, header, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));

    let active = fee_service::list_fee_headers(&db, true).await.unwrap();
    assert!(active.is_empty());
}

#[tokio::test]
async fn test_explicit_collection_updates_statuses() {
    let db = setup_test_db().await;
    let student = create_student(&db, "asha").await;
    let a = create_header(&db, "Tuition", 300.0).await;
    let b = create_header(&db, "Sports", 50.0).await;
    let tuition = assign(&db, student, a, 300.0, None).await;
    let sports = assign(&db, student, b, 50.0, None).await;

    let recorded = fee_service::collect_payment(
        &db,
        PaymentRequest {
            student_id: student,
            total_paid: 170.0,
            late_fees: 20.0,
            additional_charges: 0.0,
            items: vec![
                ItemRequest {
                    student_fee_id: tuition,
                    amount_collected: 100.0,
                    discount: 0.0,
                },
                ItemRequest {
                    student_fee_id: sports,
                    amount_collected: 50.0,
                    discount: 0.0,
                },
            ],
            metadata: CollectionMetadata {
                payment_mode: Some("UPI".to_string()),
                ..Default::default()
            },
        },
    )
    .await
    .unwrap();

    assert_eq!(recorded.items.len(), 2);
    assert_eq!(recorded.collection.total_amount, 170.0);
    assert_eq!(recorded.collection.late_fees, 20.0);
    assert_eq!(fee_status(&db, tuition).await, FeeStatus::Partial);
    assert_eq!(fee_status(&db, sports).await, FeeStatus::Paid);

    let receipt = fee_service::get_receipt(&db, recorded.collection.id)
        .await
        .unwrap();
    assert_eq!(receipt.student_name, "Student asha");
    assert_eq!(receipt.lines[0].header_name, "Tuition");
    assert_eq!(receipt.lines[1].fee_amount, 50.0);
}

#[tokio::test]
async fn test_over_collection_rolls_back_whole_payment() {
    let db = setup_test_db().await;
    let student = create_student(&db, "asha").await;
    let a = create_header(&db, "Tuition", 300.0).await;
    let b = create_header(&db, "Sports", 50.0).await;
    let tuition = assign(&db, student, a, 300.0, None).await;
    let sports = assign(&db, student, b, 50.0, None).await;

    let err = fee_service::collect_payment(
        &db,
        PaymentRequest {
            student_id: student,
            total_paid: 160.0,
            late_fees: 0.0,
            additional_charges: 0.0,
            items: vec![
                ItemRequest {
                    student_fee_id: tuition,
                    amount_collected: 100.0,
                    discount: 0.0,
                },
                ItemRequest {
                    student_fee_id: sports,
                    amount_collected: 60.0,
                    discount: 0.0,
                },
            ],
            metadata: CollectionMetadata::default(),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, LedgerError::Validation(_)));
    assert_eq!(fee_collection::Entity::find().count(&db).await.unwrap(), 0);
    assert_eq!(fee_status(&db, tuition).await, FeeStatus::Pending);
}

#[tokio::test]
async fn test_cannot_collect_another_students_fee() {
    let db = setup_test_db().await;
    let asha = create_student(&db, "asha").await;
    let rohan = create_student(&db, "rohan").await;
    let header = create_header(&db, "Tuition", 300.0).await;
    let rohans_fee = assign(&db, rohan, header, 300.0, None).await;

    let err = fee_service::collect_payment(
        &db,
        PaymentRequest {
            student_id: asha,
            total_paid: 100.0,
            late_fees: 0.0,
            additional_charges: 0.0,
            items: vec![ItemRequest {
                student_fee_id: rohans_fee,
                amount_collected: 100.0,
                discount: 0.0,
            }],
            metadata: CollectionMetadata::default(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let err = fee_service::collect_payment(
        &db,
        PaymentRequest {
            student_id: asha,
            total_paid: 100.0,
            late_fees: 0.0,
            additional_charges: 0.0,
            items: vec![ItemRequest {
                student_fee_id: 4242,
                amount_collected: 100.0,
                discount: 0.0,
            }],
            metadata: CollectionMetadata::default(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}

#[tokio::test]
async fn test_spreadsheet_imports() {
    let db = setup_test_db().await;
    let student = create_student(&db, "asha").await;
    create_header(&db, "Tuition", 0.0).await;
    create_header(&db, "Library", 0.0).await;

    let assignments = import::parse_fee_assignments_csv(
        b"Username,Tuition,Library,Unknown Column\nasha,\"1,200\",300,5\nghost,100,100,0\n",
    )
    .unwrap();
    let summary = fee_service::import_fee_assignments(&db, assignments)
        .await
        .unwrap();
    assert_eq!(summary.assigned, 2);
    assert_eq!(summary.skipped, 1);

    let collections = import::parse_bulk_collections_csv(
        b"Username,Payable Amount,Discount,Late Fees,Additional Charges,Payment Mode,Receipt Date,Ref ID / Trans No,Remarks\n\
asha,500,0,0,0,Cash,2024-08-01,,first\n\
ghost,100,0,0,0,Cash,2024-08-01,,\n",
    )
    .unwrap();
    let result = fee_service::import_bulk_collections(&db, collections)
        .await
        .unwrap();
    assert_eq!(result.processed, 1);
    assert_eq!(result.skipped, 1);
    assert_eq!(result.vouchers, vec!["VCH-2024-0001".to_string()]);

    let summary = fee_service::student_fee_summary(&db, student).await.unwrap();
    assert_eq!(summary.total_payable, 1000.0);
}

#[tokio::test]
async fn test_summary_for_unknown_student() {
    let db = setup_test_db().await;
    let err = fee_service::student_fee_summary(&db, 77).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));

    let collected_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let err = fee_service::bulk_distribute_payment_at(&db, bulk(77, 10.0, 0.0), collected_at)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}
