use campus_library::db;
use campus_library::domain::{
    BookFilter, BookInput, BookRepository, BookUpdate, LedgerError, LoanPolicy, StaffInput,
    StudentInput, StudentRepository, StudentUpdate,
};
use campus_library::import;
use campus_library::infrastructure::{SeaOrmBookRepository, SeaOrmStudentRepository};
use campus_library::models::UserRole;
use campus_library::services::circulation_service;
use sea_orm::DatabaseConnection;

async fn setup_test_db() -> DatabaseConnection {
    db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB")
}

fn book_input(title: &str, isbn: &str, copies: i32) -> BookInput {
    BookInput {
        title: title.to_string(),
        isbn: isbn.to_string(),
        category: "Science".to_string(),
        author: "Carl Sagan".to_string(),
        description: None,
        publication_year: Some(1980),
        publisher: None,
        rack_number: Some("S-2".to_string()),
        total_copies: copies,
    }
}

fn student_input(username: &str) -> StudentInput {
    StudentInput {
        username: username.to_string(),
        email: format!("{}@campus.test", username),
        full_name: format!("Student {}", username),
        enrollment_number: Some(format!("EN-{}", username)),
        program: Some("BSc".to_string()),
        semester: None,
        contact_number: None,
        address: None,
        joining_date: None,
    }
}

#[tokio::test]
async fn test_create_book_resolves_names_and_rejects_duplicate_isbn() {
    let db = setup_test_db().await;
    let repo = SeaOrmBookRepository::new(db);

    let book = repo
        .create(book_input("Cosmos", "9780345539434", 3))
        .await
        .unwrap();
    assert_eq!(book.book.available_copies, 3);
    assert_eq!(book.category.as_deref(), Some("Science"));
    assert_eq!(book.author.as_deref(), Some("Carl Sagan"));

    let err = repo
        .create(book_input("Cosmos again", "9780345539434", 1))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    // same category and author are reused
    let second = repo
        .create(book_input("Pale Blue Dot", "9780345376596", 1))
        .await
        .unwrap();
    assert_eq!(second.book.category_id, book.book.category_id);
    assert_eq!(second.book.author_id, book.book.author_id);
}

#[tokio::test]
async fn test_find_all_filters_and_paginates() {
    let db = setup_test_db().await;
    let repo = SeaOrmBookRepository::new(db);
    for i in 0..12 {
        repo.create(book_input(&format!("Volume {}", i), &format!("97800000000{:02}", i), 1))
            .await
            .unwrap();
    }
    repo.create(book_input("Cosmos", "9780345539434", 1))
        .await
        .unwrap();

    let first = repo.find_all(BookFilter::default()).await.unwrap();
    assert_eq!(first.total, 13);
    assert_eq!(first.books.len(), 10);
    assert_eq!(first.books[0].book.title, "Cosmos");

    let second = repo
        .find_all(BookFilter {
            page: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(second.books.len(), 3);

    let found = repo
        .find_all(BookFilter {
            query: Some("cosm".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(found.total, 1);
}

#[tokio::test]
async fn test_copy_count_update_keeps_issued_copies() {
    let db = setup_test_db().await;
    let books = SeaOrmBookRepository::new(db.clone());
    let students = SeaOrmStudentRepository::new(db.clone());

    let book = books
        .create(book_input("Cosmos", "9780345539434", 2))
        .await
        .unwrap();
    let student = students.create(student_input("asha")).await.unwrap();
    circulation_service::issue_book(&db, LoanPolicy::default(), student.id, book.book.id)
        .await
        .unwrap();

    let grown = books
        .update(
            book.book.id,
            BookUpdate {
                total_copies: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(grown.book.total_copies, 5);
    assert_eq!(grown.book.available_copies, 4);

    let err = books
        .update(
            book.book.id,
            BookUpdate {
                total_copies: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    // cannot delete while a copy is out
    let err = books.soft_delete(book.book.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));
}

#[tokio::test]
async fn test_shrinking_copies_stops_at_issued_count() {
    let db = setup_test_db().await;
    let books = SeaOrmBookRepository::new(db.clone());
    let students = SeaOrmStudentRepository::new(db.clone());

    let book = books
        .create(book_input("Cosmos", "9780345539434", 3))
        .await
        .unwrap();
    for name in ["asha", "rohan"] {
        let student = students.create(student_input(name)).await.unwrap();
        circulation_service::issue_book(&db, LoanPolicy::default(), student.id, book.book.id)
            .await
            .unwrap();
    }

    let shrunk = books
        .update(
            book.book.id,
            BookUpdate {
                total_copies: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(shrunk.book.total_copies, 2);
    assert_eq!(shrunk.book.available_copies, 0);

    let err = books
        .update(
            book.book.id,
            BookUpdate {
                total_copies: Some(1),
                title: Some("Cosmos (2nd ed.)".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("2 currently issued"));

    // the refused resize leaves the whole row alone
    let stored = books.find_by_id(book.book.id).await.unwrap().unwrap();
    assert_eq!(stored.book.title, "Cosmos");
    assert_eq!(
        (stored.book.total_copies, stored.book.available_copies),
        (2, 0)
    );

    // an update with nothing to change returns the book as is
    let same = books
        .update(book.book.id, BookUpdate::default())
        .await
        .unwrap();
    assert_eq!(same.book.total_copies, 2);
}

#[tokio::test]
async fn test_soft_deleted_book_disappears() {
    let db = setup_test_db().await;
    let repo = SeaOrmBookRepository::new(db);
    let book = repo
        .create(book_input("Cosmos", "9780345539434", 1))
        .await
        .unwrap();

    repo.soft_delete(book.book.id).await.unwrap();

    assert!(repo.find_by_id(book.book.id).await.unwrap().is_none());
    assert_eq!(repo.find_all(BookFilter::default()).await.unwrap().total, 0);
    let err = repo.soft_delete(book.book.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }));
}

#[tokio::test]
async fn test_book_import_skips_existing_isbns() {
    let db = setup_test_db().await;
    let repo = SeaOrmBookRepository::new(db);
    repo.create(book_input("Cosmos", "9780345539434", 1))
        .await
        .unwrap();

    let rows = import::parse_books_csv(
        b"Title,ISBN,Category,Author,Year,Publisher,Rack,Total Copies\n\
Cosmos,978-0345539434,Science,Carl Sagan,1980,,,1\n\
Contact,978-1501197987,Fiction,Carl Sagan,1985,,,2\n",
    )
    .unwrap();
    let summary = repo.import(rows).await.unwrap();

    assert_eq!(summary.imported, 1);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn test_student_directory_lifecycle() {
    let db = setup_test_db().await;
    let repo = SeaOrmStudentRepository::new(db);

    let asha = repo.create(student_input("asha")).await.unwrap();
    assert_eq!(asha.role, UserRole::Student);

    let err = repo.create(student_input("asha")).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let found = repo.search("EN-as", 20).await.unwrap();
    assert_eq!(found.len(), 1);
    assert!(repo.search("  ", 20).await.unwrap().is_empty());

    let updated = repo
        .update(
            asha.id,
            StudentUpdate {
                semester: Some("3".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.semester.as_deref(), Some("3"));

    repo.deactivate(asha.id).await.unwrap();
    assert!(repo.find_by_id(asha.id).await.unwrap().is_none());
    assert!(repo.find_by_username("asha").await.unwrap().is_none());
    assert!(repo.search("asha", 20).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_staff_accounts_are_not_students() {
    let db = setup_test_db().await;
    let repo = SeaOrmStudentRepository::new(db);

    let librarian = repo
        .create_staff(StaffInput {
            username: "meera".to_string(),
            email: "meera@campus.test".to_string(),
            full_name: "Meera Iyer".to_string(),
            role: UserRole::Librarian,
        })
        .await
        .unwrap();
    assert!(repo.find_by_id(librarian.id).await.unwrap().is_none());

    let err = repo
        .update(librarian.id, StudentUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidState(_)));

    let err = repo
        .create_staff(StaffInput {
            username: "sneaky".to_string(),
            email: "sneaky@campus.test".to_string(),
            full_name: "Sneaky".to_string(),
            role: UserRole::Student,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn test_student_import_skips_taken_identities() {
    let db = setup_test_db().await;
    let repo = SeaOrmStudentRepository::new(db);
    repo.create(student_input("asha")).await.unwrap();

    let rows = import::parse_students_csv(
        b"Full Name,Username,Email,Enrollment Number,Program,Semester,Contact Number,Address\n\
Asha Again,asha,other@campus.test,,,,,\n\
Rohan Das,rohan,rohan@campus.test,EN-9,BCom,1,,\n",
    )
    .unwrap();
    let summary = repo.import(rows).await.unwrap();

    assert_eq!(summary.imported, 1);
    assert_eq!(summary.skipped, 1);
    assert!(repo.find_by_username("rohan").await.unwrap().is_some());
}

#[tokio::test]
async fn test_demo_seed_is_idempotent() {
    let db = setup_test_db().await;
    campus_library::seed::seed_demo_data(&db).await.unwrap();
    campus_library::seed::seed_demo_data(&db).await.unwrap();

    let books = SeaOrmBookRepository::new(db.clone());
    assert_eq!(books.find_all(BookFilter::default()).await.unwrap().total, 3);

    let students = SeaOrmStudentRepository::new(db.clone());
    assert!(students.find_by_username("asha").await.unwrap().is_some());

    let headers = campus_library::services::fee_service::list_fee_headers(&db, true)
        .await
        .unwrap();
    assert_eq!(headers.len(), 3);
    assert_eq!(headers[0].name, "Tuition Fee");
}
