use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One payment event (voucher).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "fee_collections")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub voucher_no: String,
    pub collection_date: DateTimeUtc,
    pub academic_year: Option<String>,
    pub payment_mode: Option<String>, // Cash, UPI, Cheque, ...
    pub total_amount: f64,
    pub late_fees: f64,
    pub additional_charges: f64,
    pub bank_name: Option<String>,
    pub transaction_no: Option<String>,
    pub transaction_date: Option<Date>,
    pub remarks: Option<String>,
    pub student_id: i32,
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
    #[sea_orm(has_many = "super::fee_collection_item::Entity")]
    Items,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::fee_collection_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
