use sea_orm::sea_query::OnConflict;
use sea_orm::*;

use crate::infrastructure::repositories::book_repository::{
    find_or_create_author, find_or_create_category,
};
use crate::models::{UserRole, book, fee_header, user};

fn demo_user(username: &str, full_name: &str, role: UserRole) -> user::ActiveModel {
    user::ActiveModel {
        username: Set(username.to_owned()),
        email: Set(format!("{}@campus.test", username)),
        full_name: Set(full_name.to_owned()),
        role: Set(role),
        is_active: Set(true),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
}

/// Populate an empty database with a small demo campus. Safe to re-run.
pub async fn seed_demo_data(db: &DatabaseConnection) -> Result<(), DbErr> {
    // 1. Users
    let users = vec![
        demo_user("admin", "Library Admin", UserRole::Admin),
        demo_user("librarian", "Front Desk", UserRole::Librarian),
        demo_user("asha", "Asha Verma", UserRole::Student),
        demo_user("rohan", "Rohan Mehta", UserRole::Student),
    ];
    for u in users {
        user::Entity::insert(u)
            .on_conflict(
                OnConflict::column(user::Column::Username)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
    }

    // 2. Books
    let books = [
        ("The Rust Programming Language", "9781718503106", "Programming", "Steve Klabnik", 3),
        ("Database System Concepts", "9780078022159", "Databases", "Abraham Silberschatz", 2),
        ("Clean Architecture", "9780134494166", "Software Design", "Robert C. Martin", 1),
    ];
    for (title, isbn, category_name, author_name, copies) in books {
        let category = find_or_create_category(db, category_name)
            .await
            .map_err(|e| DbErr::Custom(e.to_string()))?;
        let author = find_or_create_author(db, author_name)
            .await
            .map_err(|e| DbErr::Custom(e.to_string()))?;

        let book = book::ActiveModel {
            title: Set(title.to_owned()),
            isbn: Set(isbn.to_owned()),
            total_copies: Set(copies),
            available_copies: Set(copies),
            category_id: Set(category.id),
            author_id: Set(author.id),
            is_deleted: Set(false),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        };
        book::Entity::insert(book)
            .on_conflict(OnConflict::column(book::Column::Isbn).do_nothing().to_owned())
            .exec_without_returning(db)
            .await?;
    }

    // 3. Fee headers
    if fee_header::Entity::find().count(db).await? == 0 {
        let today = chrono::Utc::now().date_naive();
        let headers = [
            ("Tuition Fee", 3, 25000.0),
            ("Library Fee", 2, 1500.0),
            ("Lab Fee", 1, 3000.0),
        ];
        for (name, priority, amount) in headers {
            fee_header::ActiveModel {
                name: Set(name.to_owned()),
                priority: Set(priority),
                due_date: Set(Some(today + chrono::Duration::days(30 * priority as i64))),
                amount: Set(amount),
                admission_type: Set("All".to_owned()),
                applicable_for: Set("All".to_owned()),
                end_date: Set(None),
                is_active: Set(true),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }

    tracing::info!("Demo data seeded");
    Ok(())
}
