//! SeaORM implementation of StudentRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::domain::{
    ImportSummary, LedgerError, StaffInput, StudentInput, StudentRepository, StudentUpdate,
};
use crate::models::UserRole;
use crate::models::user::{self, ActiveModel, Column, Entity as UserEntity};

pub struct SeaOrmStudentRepository {
    db: DatabaseConnection,
}

impl SeaOrmStudentRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// True when the username or email is already taken
async fn identity_taken<C: ConnectionTrait>(
    conn: &C,
    username: &str,
    email: &str,
) -> Result<bool, LedgerError> {
    let count = UserEntity::find()
        .filter(
            Condition::any()
                .add(Column::Username.eq(username))
                .add(Column::Email.eq(email)),
        )
        .count(conn)
        .await?;
    Ok(count > 0)
}

fn validate_identity(username: &str, email: &str, full_name: &str) -> Result<(), LedgerError> {
    if username.trim().is_empty() || email.trim().is_empty() || full_name.trim().is_empty() {
        return Err(LedgerError::Validation(
            "username, email and full name are required".into(),
        ));
    }
    Ok(())
}

async fn insert_student<C: ConnectionTrait>(
    conn: &C,
    input: StudentInput,
) -> Result<user::Model, LedgerError> {
    let student = ActiveModel {
        username: Set(input.username.trim().to_string()),
        email: Set(input.email.trim().to_string()),
        full_name: Set(input.full_name.trim().to_string()),
        role: Set(UserRole::Student),
        is_active: Set(true),
        enrollment_number: Set(input.enrollment_number.filter(|s| !s.trim().is_empty())),
        program: Set(input.program),
        semester: Set(input.semester),
        contact_number: Set(input.contact_number),
        address: Set(input.address),
        joining_date: Set(input.joining_date),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    Ok(student.insert(conn).await?)
}

/// Active student lookup shared by the ledgers. Deactivated students and
/// staff accounts resolve to `NotFound`.
pub(crate) async fn active_student<C: ConnectionTrait>(
    conn: &C,
    id: i32,
) -> Result<user::Model, LedgerError> {
    UserEntity::find_by_id(id)
        .filter(Column::Role.eq(UserRole::Student))
        .filter(Column::IsActive.eq(true))
        .one(conn)
        .await?
        .ok_or_else(|| LedgerError::not_found("student", id))
}

#[async_trait]
impl StudentRepository for SeaOrmStudentRepository {
    async fn search(&self, query: &str, limit: u64) -> Result<Vec<user::Model>, LedgerError> {
        let q = query.trim();
        if q.is_empty() {
            return Ok(Vec::new());
        }

        let students = UserEntity::find()
            .filter(Column::Role.eq(UserRole::Student))
            .filter(Column::IsActive.eq(true))
            .filter(
                Condition::any()
                    .add(Column::FullName.contains(q))
                    .add(Column::Username.contains(q))
                    .add(Column::EnrollmentNumber.contains(q)),
            )
            .order_by_asc(Column::FullName)
            .limit(limit)
            .all(&self.db)
            .await?;

        Ok(students)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<user::Model>, LedgerError> {
        match active_student(&self.db, id).await {
            Ok(student) => Ok(Some(student)),
            Err(LedgerError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<user::Model>, LedgerError> {
        Ok(UserEntity::find()
            .filter(Column::Username.eq(username.trim()))
            .filter(Column::Role.eq(UserRole::Student))
            .filter(Column::IsActive.eq(true))
            .one(&self.db)
            .await?)
    }

    async fn create(&self, input: StudentInput) -> Result<user::Model, LedgerError> {
        validate_identity(&input.username, &input.email, &input.full_name)?;

        let txn = self.db.begin().await?;
        if identity_taken(&txn, input.username.trim(), input.email.trim()).await? {
            return Err(LedgerError::Validation(
                "Username or email already exists".into(),
            ));
        }

        let student = insert_student(&txn, input).await?;
        txn.commit().await?;

        tracing::info!("Student {} registered ({})", student.id, student.username);
        Ok(student)
    }

    async fn update(&self, id: i32, input: StudentUpdate) -> Result<user::Model, LedgerError> {
        let txn = self.db.begin().await?;

        let existing = UserEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| LedgerError::not_found("user", id))?;
        if !existing.is_student() {
            return Err(LedgerError::InvalidState(format!(
                "User {} is not a student",
                id
            )));
        }

        if let Some(email) = &input.email
            && email.trim() != existing.email
        {
            let taken = UserEntity::find()
                .filter(Column::Email.eq(email.trim()))
                .filter(Column::Id.ne(id))
                .count(&txn)
                .await?;
            if taken > 0 {
                return Err(LedgerError::Validation("Email already exists".into()));
            }
        }

        let mut active: ActiveModel = existing.into();
        if let Some(email) = input.email {
            active.email = Set(email.trim().to_string());
        }
        if let Some(full_name) = input.full_name
            && !full_name.trim().is_empty()
        {
            active.full_name = Set(full_name.trim().to_string());
        }
        if input.enrollment_number.is_some() {
            active.enrollment_number = Set(input.enrollment_number);
        }
        if input.program.is_some() {
            active.program = Set(input.program);
        }
        if input.semester.is_some() {
            active.semester = Set(input.semester);
        }
        if input.contact_number.is_some() {
            active.contact_number = Set(input.contact_number);
        }
        if input.address.is_some() {
            active.address = Set(input.address);
        }

        let updated = active.update(&txn).await?;
        txn.commit().await?;

        tracing::info!("Student {} updated", id);
        Ok(updated)
    }

    async fn deactivate(&self, id: i32) -> Result<(), LedgerError> {
        let existing = active_student(&self.db, id).await?;

        let mut active: ActiveModel = existing.into();
        active.is_active = Set(false);
        active.update(&self.db).await?;

        tracing::info!("Student {} deactivated", id);
        Ok(())
    }

    async fn import(&self, rows: Vec<StudentInput>) -> Result<ImportSummary, LedgerError> {
        let txn = self.db.begin().await?;
        let mut summary = ImportSummary::default();

        for row in rows {
            if validate_identity(&row.username, &row.email, &row.full_name).is_err()
                || identity_taken(&txn, row.username.trim(), row.email.trim()).await?
            {
                summary.skipped += 1;
                continue;
            }

            insert_student(&txn, row).await?;
            summary.imported += 1;
        }

        txn.commit().await?;
        tracing::info!(
            "Student import: {} imported, {} skipped",
            summary.imported,
            summary.skipped
        );
        Ok(summary)
    }

    async fn create_staff(&self, input: StaffInput) -> Result<user::Model, LedgerError> {
        validate_identity(&input.username, &input.email, &input.full_name)?;
        if input.role == UserRole::Student {
            return Err(LedgerError::Validation(
                "staff accounts must be admin or librarian".into(),
            ));
        }

        let txn = self.db.begin().await?;
        if identity_taken(&txn, input.username.trim(), input.email.trim()).await? {
            return Err(LedgerError::Validation(
                "Username or email already exists".into(),
            ));
        }

        let staff = ActiveModel {
            username: Set(input.username.trim().to_string()),
            email: Set(input.email.trim().to_string()),
            full_name: Set(input.full_name.trim().to_string()),
            role: Set(input.role),
            is_active: Set(true),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        tracing::info!("Staff account {} created ({:?})", staff.id, staff.role);
        Ok(staff)
    }
}
