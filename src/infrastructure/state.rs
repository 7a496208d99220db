//! Application state containing repositories and shared resources

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::domain::{BookRepository, LoanPolicy, StudentRepository};
use crate::infrastructure::{SeaOrmBookRepository, SeaOrmStudentRepository};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    /// Lending rules used by circulation handlers
    pub policy: LoanPolicy,
    pub book_repo: Arc<dyn BookRepository>,
    pub student_repo: Arc<dyn StudentRepository>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, policy: LoanPolicy) -> Self {
        let book_repo = Arc::new(SeaOrmBookRepository::new(db.clone()));
        let student_repo = Arc::new(SeaOrmStudentRepository::new(db.clone()));

        Self {
            db,
            policy,
            book_repo,
            student_repo,
        }
    }

    /// Connection handed to the ledger services
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
