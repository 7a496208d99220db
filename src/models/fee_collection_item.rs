use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Portion of a collection applied to one student fee.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "fee_collection_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub amount_collected: f64,
    pub discount: f64,
    pub collection_id: i32,
    pub student_fee_id: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::fee_collection::Entity",
        from = "Column::CollectionId",
        to = "super::fee_collection::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Collection,
    #[sea_orm(
        belongs_to = "super::student_fee::Entity",
        from = "Column::StudentFeeId",
        to = "super::student_fee::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    StudentFee,
}

impl Related<super::fee_collection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Collection.def()
    }
}

impl Related<super::student_fee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StudentFee.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
