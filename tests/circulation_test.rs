use campus_library::db;
use campus_library::domain::{LedgerError, LoanPolicy};
use campus_library::models::{IssueStatus, UserRole, book, fine, issue, user};
use campus_library::services::circulation_service::{self, PayFineOutcome};
use chrono::{DateTime, Duration, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set};

async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

async fn create_student(db: &DatabaseConnection, username: &str) -> i32 {
    let student = user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(format!("{}@campus.test", username)),
        full_name: Set(format!("Student {}", username)),
        role: Set(UserRole::Student),
        is_active: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    student.insert(db).await.expect("Failed to create student").id
}

async fn create_book(db: &DatabaseConnection, isbn: &str, copies: i32) -> i32 {
    let category = campus_library::models::category::ActiveModel {
        name: Set(format!("Category {}", isbn)),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create category");
    let author = campus_library::models::author::ActiveModel {
        name: Set(format!("Author {}", isbn)),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create author");

    let book = book::ActiveModel {
        title: Set(format!("Book {}", isbn)),
        isbn: Set(isbn.to_string()),
        total_copies: Set(copies),
        available_copies: Set(copies),
        category_id: Set(category.id),
        author_id: Set(author.id),
        is_deleted: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    book.insert(db).await.expect("Failed to create book").id
}

async fn available(db: &DatabaseConnection, book_id: i32) -> i32 {
    book::Entity::find_by_id(book_id)
        .one(db)
        .await
        .unwrap()
        .unwrap()
        .available_copies
}

#[tokio::test]
async fn test_issue_sets_due_date_and_takes_a_copy() {
    let db = setup_test_db().await;
    let student = create_student(&db, "asha").await;
    let book = create_book(&db, "9780000000001", 2).await;

    let issue = circulation_service::issue_book_at(&db, LoanPolicy::default(), student, book, at(1, 9))
        .await
        .unwrap();

    assert_eq!(issue.status, IssueStatus::Issued);
    assert_eq!(issue.due_date, at(15, 9));
    assert_eq!(available(&db, book).await, 1);
}

#[tokio::test]
async fn test_return_fines_only_full_overdue_days() {
    let db = setup_test_db().await;
    let policy = LoanPolicy::default();
    let student = create_student(&db, "asha").await;
    let book = create_book(&db, "9780000000002", 3).await;

    // on time
    let a = circulation_service::issue_book_at(&db, policy, student, book, at(1, 9))
        .await
        .unwrap();
    let r = circulation_service::return_book_at(&db, policy, a.id, at(15, 8))
        .await
        .unwrap();
    assert!(r.fine.is_none());

    // one day late
    let b = circulation_service::issue_book_at(&db, policy, student, book, at(1, 9))
        .await
        .unwrap();
    let r = circulation_service::return_book_at(&db, policy, b.id, at(16, 10))
        .await
        .unwrap();
    assert_eq!(r.fine.unwrap().amount, 5.0);

    // three days late
    let c = circulation_service::issue_book_at(&db, policy, student, book, at(1, 9))
        .await
        .unwrap();
    let r = circulation_service::return_book_at(&db, policy, c.id, at(18, 9))
        .await
        .unwrap();
    assert_eq!(r.issue.status, IssueStatus::Returned);
    assert_eq!(r.fine.unwrap().amount, 15.0);

    assert_eq!(available(&db, book).await, 3);
    assert_eq!(fine::Entity::find().count(&db).await.unwrap(), 2);
}

#[tokio::test]
async fn test_second_return_is_rejected() {
    let db = setup_test_db().await;
    let policy = LoanPolicy::default();
    let student = create_student(&db, "asha").await;
    let book = create_book(&db, "9780000000003", 1).await;

    let issue = circulation_service::issue_book(&db, policy, student, book)
        .await
        .unwrap();
    circulation_service::return_book(&db, policy, issue.id)
        .await
        .unwrap();

    let err = circulation_service::return_book(&db, policy, issue.id)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));
    assert_eq!(available(&db, book).await, 1);
}

#[tokio::test]
async fn test_last_copy_cannot_be_issued_twice() {
    let db = setup_test_db().await;
    let policy = LoanPolicy::default();
    let asha = create_student(&db, "asha").await;
    let rohan = create_student(&db, "rohan").await;
    let book = create_book(&db, "9780000000004", 1).await;

    circulation_service::issue_book(&db, policy, asha, book)
        .await
        .unwrap();
    let err = circulation_service::issue_book(&db, policy, rohan, book)
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::Unavailable(_)));
    assert_eq!(available(&db, book).await, 0);
    assert_eq!(issue::Entity::find().count(&db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_deactivated_student_cannot_borrow() {
    let db = setup_test_db().await;
    let student = create_student(&db, "asha").await;
    let book = create_book(&db, "9780000000005", 1).await;

    let mut active: user::ActiveModel = user::Entity::find_by_id(student)
        .one(&db)
        .await
        .unwrap()
        .unwrap()
        .into();
    active.is_active = Set(false);
    active.update(&db).await.unwrap();

    let err = circulation_service::issue_book(&db, LoanPolicy::default(), student, book)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
    assert_eq!(available(&db, book).await, 1);
}

#[tokio::test]
async fn test_issue_by_username_and_isbn() {
    let db = setup_test_db().await;
    create_student(&db, "asha").await;
    let book = create_book(&db, "9780000000006", 1).await;

    let issue = circulation_service::issue_book_by_identifiers(
        &db,
        LoanPolicy::default(),
        " asha ",
        "9780000000006",
    )
    .await
    .unwrap();
    assert_eq!(issue.book_id, book);

    let err = circulation_service::issue_book_by_identifiers(
        &db,
        LoanPolicy::default(),
        "nobody",
        "9780000000006",
    )
    .await
    .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "student", .. }));
}

#[tokio::test]
async fn test_paying_a_fine_twice_reports_already_paid() {
    let db = setup_test_db().await;
    let policy = LoanPolicy::default();
    let student = create_student(&db, "asha").await;
    let book = create_book(&db, "9780000000007", 1).await;

    let issue = circulation_service::issue_book_at(&db, policy, student, book, at(1, 9))
        .await
        .unwrap();
    let receipt = circulation_service::return_book_at(&db, policy, issue.id, at(17, 9))
        .await
        .unwrap();
    let fine_id = receipt.fine.unwrap().id;

    let first = circulation_service::pay_fine_at(&db, fine_id, at(18, 9))
        .await
        .unwrap();
    assert!(matches!(first, PayFineOutcome::Paid(_)));
    assert_eq!(first.fine().paid_date, Some(at(18, 9)));

    let second = circulation_service::pay_fine_at(&db, fine_id, at(19, 9))
        .await
        .unwrap();
    assert!(matches!(second, PayFineOutcome::AlreadyPaid(_)));
    assert_eq!(second.fine().paid_date, Some(at(18, 9)));
}

#[tokio::test]
async fn test_available_copies_stay_within_bounds() {
    let db = setup_test_db().await;
    let policy = LoanPolicy::default();
    let book = create_book(&db, "9780000000008", 2).await;

    let mut issues = Vec::new();
    for name in ["s1", "s2", "s3"] {
        let student = create_student(&db, name).await;
        if let Ok(issue) = circulation_service::issue_book(&db, policy, student, book).await {
            issues.push(issue);
        }
        let copies = available(&db, book).await;
        assert!((0..=2).contains(&copies));
    }
    assert_eq!(issues.len(), 2);

    for issue in &issues {
        circulation_service::return_book(&db, policy, issue.id)
            .await
            .unwrap();
        let copies = available(&db, book).await;
        assert!((0..=2).contains(&copies));
    }
    assert_eq!(available(&db, book).await, 2);
}

#[tokio::test]
async fn test_overdue_counts_and_listings() {
    let db = setup_test_db().await;
    let policy = LoanPolicy::default();
    let student = create_student(&db, "asha").await;
    let book = create_book(&db, "9780000000009", 3).await;

    // due on the 15th
    circulation_service::issue_book_at(&db, policy, student, book, at(1, 9))
        .await
        .unwrap();
    // due on the 10th
    circulation_service::issue_book_at(&db, policy, student, book, at(1, 9) - Duration::days(5))
        .await
        .unwrap();

    let counts = circulation_service::overdue_counts_at(&db, at(15, 8))
        .await
        .unwrap();
    assert_eq!(counts.due_today, 1);
    assert_eq!(counts.pending_returns, 1);

    let active = circulation_service::list_active_issues(&db, Some("asha"))
        .await
        .unwrap();
    assert_eq!(active.len(), 2);
    assert_eq!(active[0].book_title, "Book 9780000000009");

    let none = circulation_service::list_active_issues(&db, Some("nobody"))
        .await
        .unwrap();
    assert!(none.is_empty());

    let history = circulation_service::student_history(&db, student)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_fines_list_unpaid_first() {
    let db = setup_test_db().await;
    let policy = LoanPolicy::default();
    let student = create_student(&db, "asha").await;
    let book = create_book(&db, "9780000000010", 2).await;

    let a = circulation_service::issue_book_at(&db, policy, student, book, at(1, 9))
        .await
        .unwrap();
    let b = circulation_service::issue_book_at(&db, policy, student, book, at(1, 9))
        .await
        .unwrap();
    let fa = circulation_service::return_book_at(&db, policy, a.id, at(17, 9))
        .await
        .unwrap()
        .fine
        .unwrap();
    circulation_service::return_book_at(&db, policy, b.id, at(20, 9))
        .await
        .unwrap();
    circulation_service::pay_fine(&db, fa.id).await.unwrap();

    let fines = circulation_service::list_fines(&db, None).await.unwrap();
    assert_eq!(fines.len(), 2);
    assert!(!fines[0].fine.paid);
    assert!(fines[1].fine.paid);
    assert_eq!(fines[0].student_name, "Student asha");
}
