//! Analytics Service - read-only aggregates for the dashboards

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use sea_orm::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ops::AddAssign;

use crate::domain::LedgerError;
use crate::models::book::{self, Entity as Book};
use crate::models::category::Entity as Category;
use crate::models::fee_collection::{self, Entity as FeeCollection};
use crate::models::fee_collection_item::Entity as FeeCollectionItem;
use crate::models::fine::{self, Entity as Fine};
use crate::models::issue::{self, Entity as Issue};
use crate::models::student_fee::Entity as StudentFee;
use crate::models::user::{self, Entity as User};
use crate::models::{IssueStatus, UserRole};
use crate::services::allocation::round_money;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminDashboard {
    pub total_books: u64,
    pub total_students: u64,
    pub issued_books: u64,
    pub total_fines: f64,
    pub fees_assigned: f64,
    pub fees_collected: f64,
    /// Assigned minus everything allocated to fees
    pub fees_due: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentDashboard {
    pub active_issues: u64,
    pub unpaid_fines: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Borrower {
    pub student_id: i32,
    pub full_name: String,
    pub issue_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CirculationStatus {
    pub available_copies: i64,
    pub issued_copies: i64,
    pub top_borrowers: Vec<Borrower>,
}

/// Window of the trend charts. Short windows bucket by day, long ones by month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendRange {
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "15d")]
    Fortnight,
    #[default]
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "6m")]
    HalfYear,
    #[serde(rename = "1y")]
    Year,
}

impl TrendRange {
    fn days(self) -> i64 {
        match self {
            TrendRange::Week => 7,
            TrendRange::Fortnight => 15,
            TrendRange::Month => 30,
            TrendRange::HalfYear => 180,
            TrendRange::Year => 365,
        }
    }

    fn monthly(self) -> bool {
        matches!(self, TrendRange::HalfYear | TrendRange::Year)
    }

    fn bucket(self, at: DateTime<Utc>) -> NaiveDate {
        let day = at.date_naive();
        if self.monthly() {
            day.with_day(1).unwrap_or(day)
        } else {
            day
        }
    }

    fn label(self, bucket: NaiveDate) -> String {
        if self.monthly() {
            bucket.format("%b %Y").to_string()
        } else {
            bucket.format("%d %b").to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries<T> {
    pub labels: Vec<String>,
    pub values: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsTrends {
    pub range: TrendRange,
    pub issues: TrendSeries<u64>,
    pub fee_collections: TrendSeries<f64>,
    pub registrations: TrendSeries<u64>,
    pub paid_fines: TrendSeries<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub books: u64,
}

const TOP_BORROWERS: usize = 5;

/// Sum points into chronological buckets; empty buckets are left out
fn series<T: Copy + Default + AddAssign>(
    range: TrendRange,
    points: impl IntoIterator<Item = (DateTime<Utc>, T)>,
) -> TrendSeries<T> {
    let mut buckets: BTreeMap<NaiveDate, T> = BTreeMap::new();
    for (at, value) in points {
        *buckets.entry(range.bucket(at)).or_default() += value;
    }
    TrendSeries {
        labels: buckets.keys().map(|b| range.label(*b)).collect(),
        values: buckets.into_values().collect(),
    }
}

fn money_series(
    range: TrendRange,
    points: impl IntoIterator<Item = (DateTime<Utc>, f64)>,
) -> TrendSeries<f64> {
    let mut totals = series(range, points);
    totals.values = totals.values.into_iter().map(round_money).collect();
    totals
}

pub async fn admin_dashboard(db: &DatabaseConnection) -> Result<AdminDashboard, LedgerError> {
    let total_books = Book::find()
        .filter(book::Column::IsDeleted.eq(false))
        .count(db)
        .await?;
    let total_students = User::find()
        .filter(user::Column::Role.eq(UserRole::Student))
        .filter(user::Column::IsActive.eq(true))
        .count(db)
        .await?;
    let issued_books = Issue::find()
        .filter(issue::Column::Status.eq(IssueStatus::Issued))
        .count(db)
        .await?;

    let total_fines: f64 = Fine::find().all(db).await?.iter().map(|f| f.amount).sum();
    let fees_assigned: f64 = StudentFee::find().all(db).await?.iter().map(|f| f.amount).sum();
    let fees_collected: f64 = FeeCollection::find()
        .all(db)
        .await?
        .iter()
        .map(|c| c.total_amount)
        .sum();
    let allocated: f64 = FeeCollectionItem::find()
        .all(db)
        .await?
        .iter()
        .map(|i| i.amount_collected)
        .sum();

    Ok(AdminDashboard {
        total_books,
        total_students,
        issued_books,
        total_fines: round_money(total_fines),
        fees_assigned: round_money(fees_assigned),
        fees_collected: round_money(fees_collected),
        fees_due: round_money(fees_assigned - allocated),
    })
}

pub async fn student_dashboard(
    db: &DatabaseConnection,
    student_id: i32,
) -> Result<StudentDashboard, LedgerError> {
    User::find_by_id(student_id)
        .one(db)
        .await?
        .ok_or_else(|| LedgerError::not_found("student", student_id))?;

    let active_issues = Issue::find()
        .filter(issue::Column::UserId.eq(student_id))
        .filter(issue::Column::Status.eq(IssueStatus::Issued))
        .count(db)
        .await?;

    let unpaid_fines: f64 = Fine::find()
        .inner_join(Issue)
        .filter(issue::Column::UserId.eq(student_id))
        .filter(fine::Column::Paid.eq(false))
        .all(db)
        .await?
        .iter()
        .map(|f| f.amount)
        .sum();

    Ok(StudentDashboard {
        active_issues,
        unpaid_fines: round_money(unpaid_fines),
    })
}

pub async fn circulation_status(db: &DatabaseConnection) -> Result<CirculationStatus, LedgerError> {
    let books = Book::find()
        .filter(book::Column::IsDeleted.eq(false))
        .all(db)
        .await?;
    let available_copies: i64 = books.iter().map(|b| b.available_copies as i64).sum();
    let issued_copies: i64 = books
        .iter()
        .map(|b| (b.total_copies - b.available_copies) as i64)
        .sum();

    let mut counts: HashMap<i32, u64> = HashMap::new();
    for issue in Issue::find().all(db).await? {
        *counts.entry(issue.user_id).or_insert(0) += 1;
    }

    let mut ranked: Vec<(i32, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(TOP_BORROWERS);

    let ids: Vec<i32> = ranked.iter().map(|(id, _)| *id).collect();
    let names: HashMap<i32, String> = User::find()
        .filter(user::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.full_name))
        .collect();

    let top_borrowers = ranked
        .into_iter()
        .map(|(student_id, issue_count)| Borrower {
            student_id,
            full_name: names
                .get(&student_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string()),
            issue_count,
        })
        .collect();

    Ok(CirculationStatus {
        available_copies,
        issued_copies,
        top_borrowers,
    })
}

pub async fn analytics_trends(
    db: &DatabaseConnection,
    range: TrendRange,
    now: DateTime<Utc>,
) -> Result<AnalyticsTrends, LedgerError> {
    let start = now - Duration::days(range.days());

    let issues = Issue::find()
        .filter(issue::Column::IssueDate.gte(start))
        .all(db)
        .await?;
    let collections = FeeCollection::find()
        .filter(fee_collection::Column::CollectionDate.gte(start))
        .all(db)
        .await?;
    let students = User::find()
        .filter(user::Column::Role.eq(UserRole::Student))
        .filter(user::Column::CreatedAt.gte(start))
        .all(db)
        .await?;
    let fines = Fine::find()
        .filter(fine::Column::Paid.eq(true))
        .filter(fine::Column::PaidDate.gte(start))
        .all(db)
        .await?;

    Ok(AnalyticsTrends {
        range,
        issues: series(range, issues.iter().map(|i| (i.issue_date, 1))),
        fee_collections: money_series(
            range,
            collections.iter().map(|c| (c.collection_date, c.total_amount)),
        ),
        registrations: series(range, students.iter().map(|u| (u.created_at, 1))),
        paid_fines: money_series(
            range,
            fines
                .iter()
                .filter_map(|f| f.paid_date.map(|at| (at, f.amount))),
        ),
    })
}

/// Book titles per category, by category name
pub async fn category_distribution(
    db: &DatabaseConnection,
) -> Result<Vec<CategoryCount>, LedgerError> {
    let names: HashMap<i32, String> = Category::find()
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for book in Book::find()
        .filter(book::Column::IsDeleted.eq(false))
        .all(db)
        .await?
    {
        let name = names
            .get(&book.category_id)
            .cloned()
            .unwrap_or_else(|| "Uncategorised".to_string());
        *counts.entry(name).or_insert(0) += 1;
    }

    Ok(counts
        .into_iter()
        .map(|(category, books)| CategoryCount { category, books })
        .collect())
}
