use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "librarian")]
    Librarian,
    #[sea_orm(string_value = "student")]
    Student,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    /// Users are deactivated instead of deleted once history references them
    pub is_active: bool,
    pub enrollment_number: Option<String>,
    pub program: Option<String>,
    pub semester: Option<String>,
    pub contact_number: Option<String>,
    pub address: Option<String>,
    pub joining_date: Option<Date>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::issue::Entity")]
    Issues,
    #[sea_orm(has_many = "super::student_fee::Entity")]
    StudentFees,
    #[sea_orm(has_many = "super::fee_collection::Entity")]
    FeeCollections,
}

impl Related<super::issue::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Issues.def()
    }
}

impl Related<super::student_fee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StudentFees.def()
    }
}

impl Related<super::fee_collection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FeeCollections.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_student(&self) -> bool {
        self.role == UserRole::Student
    }
}
