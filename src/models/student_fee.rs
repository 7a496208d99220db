use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum FeeStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Partial")]
    Partial,
    #[sea_orm(string_value = "Paid")]
    Paid,
}

/// One student's obligation for one fee header.
///
/// `status` is stored but derived: it must be recomputed from the sum of the
/// fee's collection items after every allocation.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "student_fees")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub student_id: i32,
    pub fee_header_id: i32,
    pub amount: f64,
    pub due_date: Option<Date>,
    pub status: FeeStatus,
    pub assigned_date: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::StudentId",
        to = "super::user::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Student,
    #[sea_orm(
        belongs_to = "super::fee_header::Entity",
        from = "Column::FeeHeaderId",
        to = "super::fee_header::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    FeeHeader,
    #[sea_orm(has_many = "super::fee_collection_item::Entity")]
    CollectionItems,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::fee_header::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FeeHeader.def()
    }
}

impl Related<super::fee_collection_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CollectionItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
