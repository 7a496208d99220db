use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Fee-type template (e.g. "Library Fee"). Deactivated, never deleted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "fee_headers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub priority: i32,
    pub due_date: Option<Date>,
    pub amount: f64,
    pub admission_type: String, // 'All', 'New', 'Old'
    pub applicable_for: String, // 'All', 'Class', 'Course'
    pub end_date: Option<Date>,
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::student_fee::Entity")]
    StudentFees,
}

impl Related<super::student_fee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StudentFees.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
