//! Repository trait definitions
//!
//! These traits define the contract for the catalog and the user directory.
//! Implementations live in the infrastructure layer.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::LedgerError;
use crate::models::book::CatalogBook;
use crate::models::{UserRole, user};

/// Default page size for catalog listings
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Filter criteria for book queries
#[derive(Debug, Default, Clone, Deserialize)]
pub struct BookFilter {
    /// Case-insensitive match on title or ISBN
    pub query: Option<String>,
    /// Zero-based page index
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Paginated result with total count
#[derive(Debug, Serialize)]
pub struct PaginatedBooks {
    pub books: Vec<CatalogBook>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Input for creating a catalog entry
#[derive(Debug, Clone, Deserialize)]
pub struct BookInput {
    pub title: String,
    pub isbn: String,
    /// Category name, created on first use
    pub category: String,
    /// Author name, created on first use
    pub author: String,
    pub description: Option<String>,
    pub publication_year: Option<i32>,
    pub publisher: Option<String>,
    pub rack_number: Option<String>,
    pub total_copies: i32,
}

/// Partial update of a catalog entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub publication_year: Option<i32>,
    pub publisher: Option<String>,
    pub rack_number: Option<String>,
    /// New owned copy count; available copies move by the same delta
    pub total_copies: Option<i32>,
}

/// Outcome of a CSV import
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

/// Repository trait for the book catalog
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// List non-deleted books, newest first
    async fn find_all(&self, filter: BookFilter) -> Result<PaginatedBooks, LedgerError>;

    /// Find a non-deleted book by ID
    async fn find_by_id(&self, id: i32) -> Result<Option<CatalogBook>, LedgerError>;

    async fn create(&self, input: BookInput) -> Result<CatalogBook, LedgerError>;

    async fn update(&self, id: i32, input: BookUpdate) -> Result<CatalogBook, LedgerError>;

    /// Flag a book as deleted. Refused while a copy is out.
    async fn soft_delete(&self, id: i32) -> Result<(), LedgerError>;

    /// Insert every row with a new ISBN in a single transaction
    async fn import(&self, rows: Vec<BookInput>) -> Result<ImportSummary, LedgerError>;
}

/// Input for registering a student
#[derive(Debug, Clone, Deserialize)]
pub struct StudentInput {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub enrollment_number: Option<String>,
    pub program: Option<String>,
    pub semester: Option<String>,
    pub contact_number: Option<String>,
    pub address: Option<String>,
    pub joining_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub enrollment_number: Option<String>,
    pub program: Option<String>,
    pub semester: Option<String>,
    pub contact_number: Option<String>,
    pub address: Option<String>,
}

/// Input for registering an admin or librarian
#[derive(Debug, Clone, Deserialize)]
pub struct StaffInput {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
}

/// Repository trait for the user directory
#[async_trait]
pub trait StudentRepository: Send + Sync {
    /// Active students matching name, username or enrollment number.
    /// An empty query matches nothing.
    async fn search(&self, query: &str, limit: u64) -> Result<Vec<user::Model>, LedgerError>;

    /// Find an active student by ID
    async fn find_by_id(&self, id: i32) -> Result<Option<user::Model>, LedgerError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<user::Model>, LedgerError>;

    async fn create(&self, input: StudentInput) -> Result<user::Model, LedgerError>;

    async fn update(&self, id: i32, input: StudentUpdate) -> Result<user::Model, LedgerError>;

    /// Soft delete: history keeps referencing the row
    async fn deactivate(&self, id: i32) -> Result<(), LedgerError>;

    async fn import(&self, rows: Vec<StudentInput>) -> Result<ImportSummary, LedgerError>;

    async fn create_staff(&self, input: StaffInput) -> Result<user::Model, LedgerError>;
}
