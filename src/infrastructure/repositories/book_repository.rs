//! SeaORM implementation of BookRepository

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};

use crate::domain::{
    BookFilter, BookInput, BookRepository, BookUpdate, DEFAULT_PAGE_SIZE, ImportSummary,
    LedgerError, PaginatedBooks,
};
use crate::models::book::{self, ActiveModel, CatalogBook, Column, Entity as BookEntity};
use crate::models::{IssueStatus, author, category, issue};

/// Move total and available copies by the same delta in one conditional
/// statement, so copies lent out meanwhile are never written back.
async fn resize_copies<C: ConnectionTrait>(
    conn: &C,
    existing: &book::Model,
    total: i32,
) -> Result<book::Model, LedgerError> {
    if total < 0 {
        return Err(LedgerError::Validation(
            "total copies cannot be negative".into(),
        ));
    }
    let delta = total - existing.total_copies;

    let res = BookEntity::update_many()
        .col_expr(Column::TotalCopies, Expr::col(Column::TotalCopies).add(delta))
        .col_expr(
            Column::AvailableCopies,
            Expr::col(Column::AvailableCopies).add(delta),
        )
        .filter(Column::Id.eq(existing.id))
        .filter(Column::TotalCopies.eq(existing.total_copies))
        .filter(Column::AvailableCopies.gte(-delta))
        .exec(conn)
        .await?;

    let current = BookEntity::find_by_id(existing.id)
        .one(conn)
        .await?
        .ok_or_else(|| LedgerError::not_found("book", existing.id))?;

    if res.rows_affected == 0 {
        return Err(LedgerError::Validation(format!(
            "Cannot reduce copies to {}: {} currently issued",
            total,
            current.total_copies - current.available_copies
        )));
    }
    Ok(current)
}

/// SeaORM-based implementation of BookRepository
pub struct SeaOrmBookRepository {
    db: DatabaseConnection,
}

impl SeaOrmBookRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

pub(crate) async fn find_or_create_category<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> Result<category::Model, LedgerError> {
    if let Some(existing) = category::Entity::find()
        .filter(category::Column::Name.eq(name))
        .one(conn)
        .await?
    {
        return Ok(existing);
    }

    let created = category::ActiveModel {
        name: Set(name.to_string()),
        description: Set(None),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(created)
}

pub(crate) async fn find_or_create_author<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> Result<author::Model, LedgerError> {
    if let Some(existing) = author::Entity::find()
        .filter(author::Column::Name.eq(name))
        .one(conn)
        .await?
    {
        return Ok(existing);
    }

    let created = author::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(created)
}

fn validate_input(input: &BookInput) -> Result<(), LedgerError> {
    if input.title.trim().is_empty() {
        return Err(LedgerError::Validation("title is required".into()));
    }
    if input.isbn.trim().is_empty() {
        return Err(LedgerError::Validation("ISBN is required".into()));
    }
    if input.total_copies < 0 {
        return Err(LedgerError::Validation(
            "total copies cannot be negative".into(),
        ));
    }
    Ok(())
}

async fn insert_book<C: ConnectionTrait>(
    conn: &C,
    input: BookInput,
) -> Result<book::Model, LedgerError> {
    let category = find_or_create_category(conn, input.category.trim()).await?;
    let author = find_or_create_author(conn, input.author.trim()).await?;

    let new_book = ActiveModel {
        title: Set(input.title.trim().to_string()),
        isbn: Set(input.isbn.trim().to_string()),
        description: Set(input.description),
        publication_year: Set(input.publication_year),
        publisher: Set(input.publisher),
        rack_number: Set(input.rack_number),
        total_copies: Set(input.total_copies),
        available_copies: Set(input.total_copies),
        category_id: Set(category.id),
        author_id: Set(author.id),
        is_deleted: Set(false),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    Ok(new_book.insert(conn).await?)
}

/// Attach category and author names to a page of books
async fn with_names<C: ConnectionTrait>(
    conn: &C,
    books: Vec<book::Model>,
) -> Result<Vec<CatalogBook>, LedgerError> {
    let category_ids: HashSet<i32> = books.iter().map(|b| b.category_id).collect();
    let author_ids: HashSet<i32> = books.iter().map(|b| b.author_id).collect();

    let categories: HashMap<i32, String> = category::Entity::find()
        .filter(category::Column::Id.is_in(category_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();
    let authors: HashMap<i32, String> = author::Entity::find()
        .filter(author::Column::Id.is_in(author_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|a| (a.id, a.name))
        .collect();

    Ok(books
        .into_iter()
        .map(|book| CatalogBook {
            category: categories.get(&book.category_id).cloned(),
            author: authors.get(&book.author_id).cloned(),
            book,
        })
        .collect())
}

#[async_trait]
impl BookRepository for SeaOrmBookRepository {
    async fn find_all(&self, filter: BookFilter) -> Result<PaginatedBooks, LedgerError> {
        let mut query = BookEntity::find().filter(Column::IsDeleted.eq(false));

        if let Some(q) = &filter.query
            && !q.trim().is_empty()
        {
            let q = q.trim();
            let cond = Condition::any()
                .add(Column::Title.contains(q))
                .add(Column::Isbn.contains(q));
            query = query.filter(cond);
        }

        let per_page = filter.per_page.filter(|n| *n > 0).unwrap_or(DEFAULT_PAGE_SIZE);
        let page = filter.page.unwrap_or(0);

        let paginator = query.order_by_desc(Column::Id).paginate(&self.db, per_page);
        let total = paginator.num_items().await?;
        let books = paginator.fetch_page(page).await?;

        tracing::debug!("Catalog page {} ({} of {} books)", page, books.len(), total);

        Ok(PaginatedBooks {
            books: with_names(&self.db, books).await?,
            total,
            page,
            per_page,
        })
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<CatalogBook>, LedgerError> {
        let book = BookEntity::find_by_id(id)
            .filter(Column::IsDeleted.eq(false))
            .one(&self.db)
            .await?;

        match book {
            Some(model) => Ok(with_names(&self.db, vec![model]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn create(&self, input: BookInput) -> Result<CatalogBook, LedgerError> {
        validate_input(&input)?;

        let txn = self.db.begin().await?;

        let duplicate = BookEntity::find()
            .filter(Column::Isbn.eq(input.isbn.trim()))
            .count(&txn)
            .await?;
        if duplicate > 0 {
            return Err(LedgerError::Validation(format!(
                "A book with ISBN {} already exists",
                input.isbn.trim()
            )));
        }

        let created = insert_book(&txn, input).await?;
        let mut named = with_names(&txn, vec![created]).await?;
        txn.commit().await?;

        let book = named
            .pop()
            .ok_or_else(|| LedgerError::InvalidState("created book vanished".into()))?;
        tracing::info!("Book {} added to catalog (ISBN {})", book.book.id, book.book.isbn);
        Ok(book)
    }

    async fn update(&self, id: i32, input: BookUpdate) -> Result<CatalogBook, LedgerError> {
        let txn = self.db.begin().await?;

        let existing = BookEntity::find_by_id(id)
            .filter(Column::IsDeleted.eq(false))
            .one(&txn)
            .await?
            .ok_or_else(|| LedgerError::not_found("book", id))?;

        let existing = match input.total_copies {
            Some(total) if total != existing.total_copies => {
                resize_copies(&txn, &existing, total).await?
            }
            _ => existing,
        };

        let mut active: ActiveModel = existing.clone().into();

        if let Some(title) = input.title
            && !title.trim().is_empty()
        {
            active.title = Set(title.trim().to_string());
        }
        if let Some(name) = input.category
            && !name.trim().is_empty()
        {
            active.category_id = Set(find_or_create_category(&txn, name.trim()).await?.id);
        }
        if let Some(name) = input.author
            && !name.trim().is_empty()
        {
            active.author_id = Set(find_or_create_author(&txn, name.trim()).await?.id);
        }
        if input.description.is_some() {
            active.description = Set(input.description);
        }
        if input.publication_year.is_some() {
            active.publication_year = Set(input.publication_year);
        }
        if input.publisher.is_some() {
            active.publisher = Set(input.publisher);
        }
        if input.rack_number.is_some() {
            active.rack_number = Set(input.rack_number);
        }

        let updated = if active.is_changed() {
            active.update(&txn).await?
        } else {
            existing
        };
        let mut named = with_names(&txn, vec![updated]).await?;
        txn.commit().await?;

        tracing::info!("Book {} updated", id);
        named
            .pop()
            .ok_or_else(|| LedgerError::not_found("book", id))
    }

    async fn soft_delete(&self, id: i32) -> Result<(), LedgerError> {
        let txn = self.db.begin().await?;

        let existing = BookEntity::find_by_id(id)
            .filter(Column::IsDeleted.eq(false))
            .one(&txn)
            .await?
            .ok_or_else(|| LedgerError::not_found("book", id))?;

        let out = issue::Entity::find()
            .filter(issue::Column::BookId.eq(id))
            .filter(issue::Column::Status.eq(IssueStatus::Issued))
            .count(&txn)
            .await?;
        if out > 0 {
            return Err(LedgerError::InvalidState(format!(
                "Book {} has {} copies issued",
                id, out
            )));
        }

        let mut active: ActiveModel = existing.into();
        active.is_deleted = Set(true);
        active.update(&txn).await?;
        txn.commit().await?;

        tracing::info!("Book {} soft-deleted", id);
        Ok(())
    }

    async fn import(&self, rows: Vec<BookInput>) -> Result<ImportSummary, LedgerError> {
        let txn = self.db.begin().await?;
        let mut summary = ImportSummary::default();

        for row in rows {
            if validate_input(&row).is_err() {
                summary.skipped += 1;
                continue;
            }

            let exists = BookEntity::find()
                .filter(Column::Isbn.eq(row.isbn.trim()))
                .count(&txn)
                .await?;
            if exists > 0 {
                summary.skipped += 1;
                continue;
            }

            insert_book(&txn, row).await?;
            summary.imported += 1;
        }

        txn.commit().await?;
        tracing::info!(
            "Book import: {} imported, {} skipped",
            summary.imported,
            summary.skipped
        );
        Ok(summary)
    }
}
