use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "books")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(unique)]
    pub isbn: String,
    pub description: Option<String>,
    pub publication_year: Option<i32>,
    pub publisher: Option<String>,
    pub rack_number: Option<String>,
    /// Copies owned by the library.
    pub total_copies: i32,
    /// Copies on the shelf. Kept within `0..=total_copies` by the
    /// conditional updates in the circulation ledger.
    pub available_copies: i32,
    pub category_id: i32,
    pub author_id: i32,
    /// Soft delete flag - books referenced by issues are never removed
    pub is_deleted: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    #[sea_orm(
        belongs_to = "super::author::Entity",
        from = "Column::AuthorId",
        to = "super::author::Column::Id"
    )]
    Author,
    #[sea_orm(has_many = "super::issue::Entity")]
    Issues,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::author::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::issue::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Issues.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// DTO for API responses
#[derive(Debug, Clone, Serialize)]
pub struct CatalogBook {
    #[serde(flatten)]
    pub book: Model,
    pub category: Option<String>,
    pub author: Option<String>,
}
