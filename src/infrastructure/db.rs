use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    // Run migrations manually (simple SQL)
    run_migrations(&db).await?;

    Ok(db)
}

/// Schema, in dependency order. Every statement is idempotent.
const SCHEMA: &[&str] = &[
    "PRAGMA foreign_keys = ON",
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        full_name TEXT NOT NULL,
        role TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        enrollment_number TEXT UNIQUE,
        program TEXT,
        semester TEXT,
        contact_number TEXT,
        address TEXT,
        joining_date TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)",
    r#"
    CREATE TABLE IF NOT EXISTS categories (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS authors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS books (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        isbn TEXT NOT NULL UNIQUE,
        description TEXT,
        publication_year INTEGER,
        publisher TEXT,
        rack_number TEXT,
        total_copies INTEGER NOT NULL DEFAULT 1,
        available_copies INTEGER NOT NULL DEFAULT 1,
        category_id INTEGER NOT NULL,
        author_id INTEGER NOT NULL,
        is_deleted INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        CHECK (available_copies >= 0 AND available_copies <= total_copies),
        FOREIGN KEY (category_id) REFERENCES categories(id),
        FOREIGN KEY (author_id) REFERENCES authors(id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_books_title ON books(title)",
    r#"
    CREATE TABLE IF NOT EXISTS issues (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        book_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        issue_date TEXT NOT NULL,
        due_date TEXT NOT NULL,
        return_date TEXT,
        status TEXT NOT NULL DEFAULT 'issued',
        FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE RESTRICT,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE RESTRICT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_issues_status ON issues(status)",
    "CREATE INDEX IF NOT EXISTS idx_issues_user_id ON issues(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_issues_book_id ON issues(book_id)",
    r#"
    CREATE TABLE IF NOT EXISTS fines (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        issue_id INTEGER NOT NULL UNIQUE,
        amount REAL NOT NULL,
        paid INTEGER NOT NULL DEFAULT 0,
        paid_date TEXT,
        FOREIGN KEY (issue_id) REFERENCES issues(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS fee_headers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        priority INTEGER NOT NULL DEFAULT 0,
        due_date TEXT,
        amount REAL NOT NULL DEFAULT 0,
        admission_type TEXT NOT NULL DEFAULT 'All',
        applicable_for TEXT NOT NULL DEFAULT 'All',
        end_date TEXT,
        is_active INTEGER NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS student_fees (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        student_id INTEGER NOT NULL,
        fee_header_id INTEGER NOT NULL,
        amount REAL NOT NULL,
        due_date TEXT,
        status TEXT NOT NULL DEFAULT 'Pending',
        assigned_date TEXT NOT NULL,
        FOREIGN KEY (student_id) REFERENCES users(id) ON DELETE RESTRICT,
        FOREIGN KEY (fee_header_id) REFERENCES fee_headers(id) ON DELETE RESTRICT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_student_fees_student ON student_fees(student_id, status)",
    r#"
    CREATE TABLE IF NOT EXISTS fee_collections (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        voucher_no TEXT NOT NULL UNIQUE,
        collection_date TEXT NOT NULL,
        academic_year TEXT,
        payment_mode TEXT,
        total_amount REAL NOT NULL,
        late_fees REAL NOT NULL DEFAULT 0,
        additional_charges REAL NOT NULL DEFAULT 0,
        bank_name TEXT,
        transaction_no TEXT,
        transaction_date TEXT,
        remarks TEXT,
        student_id INTEGER NOT NULL,
        FOREIGN KEY (student_id) REFERENCES users(id) ON DELETE RESTRICT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_fee_collections_student ON fee_collections(student_id)",
    r#"
    CREATE TABLE IF NOT EXISTS fee_collection_items (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        amount_collected REAL NOT NULL,
        discount REAL NOT NULL DEFAULT 0,
        collection_id INTEGER NOT NULL,
        student_fee_id INTEGER NOT NULL,
        FOREIGN KEY (collection_id) REFERENCES fee_collections(id) ON DELETE CASCADE,
        FOREIGN KEY (student_fee_id) REFERENCES student_fees(id) ON DELETE RESTRICT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_fee_items_student_fee ON fee_collection_items(student_fee_id)",
    r#"
    CREATE TABLE IF NOT EXISTS book_requests (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        book_id INTEGER NOT NULL,
        request_date TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        FOREIGN KEY (user_id) REFERENCES users(id),
        FOREIGN KEY (book_id) REFERENCES books(id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_book_requests_status ON book_requests(status)",
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER,
        message TEXT NOT NULL,
        link TEXT,
        is_read INTEGER NOT NULL DEFAULT 0,
        timestamp TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, is_read)",
    r#"
    CREATE TABLE IF NOT EXISTS audit_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        action TEXT NOT NULL,
        details TEXT,
        timestamp TEXT NOT NULL,
        user_id INTEGER,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL
    )
    "#,
];

async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    for sql in SCHEMA {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            sql.to_string(),
        ))
        .await?;
    }

    tracing::debug!("Schema ready ({} statements)", SCHEMA.len());
    Ok(())
}
