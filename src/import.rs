//! Spreadsheet (CSV) import parsing
//!
//! Turns uploaded CSV text into typed rows. Persistence happens in the
//! repositories and the fee service, each file in one transaction.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::{BookInput, LedgerError, StudentInput};

fn parse_error(e: impl std::fmt::Display) -> LedgerError {
    LedgerError::Validation(format!("CSV parse error: {}", e))
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Lenient money cell: blanks are zero, thousands separators are ignored
pub fn parse_amount(cell: &str) -> Option<f64> {
    let cleaned = cell.trim().replace(',', "");
    if cleaned.is_empty() {
        return Some(0.0);
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_date(cell: &str) -> Result<NaiveDate, LedgerError> {
    let cell = cell.trim();
    ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(cell, fmt).ok())
        .ok_or_else(|| LedgerError::Validation(format!("Unrecognised date '{}'", cell)))
}

#[derive(Debug, Deserialize)]
struct BookRecord {
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "ISBN")]
    isbn: String,
    #[serde(rename = "Category")]
    category: Option<String>,
    #[serde(rename = "Author")]
    author: Option<String>,
    #[serde(rename = "Year")]
    year: Option<i32>,
    #[serde(rename = "Publisher")]
    publisher: Option<String>,
    #[serde(rename = "Rack")]
    rack: Option<String>,
    #[serde(rename = "Total Copies")]
    total_copies: Option<i32>,
}

pub fn parse_books_csv(content: &[u8]) -> Result<Vec<BookInput>, LedgerError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content);

    let mut books = Vec::new();
    for result in rdr.deserialize() {
        let record: BookRecord = result.map_err(parse_error)?;
        books.push(BookInput {
            title: record.title,
            isbn: record.isbn.replace(['-', ' '], ""),
            category: blank_to_none(record.category).unwrap_or_else(|| "General".to_string()),
            author: blank_to_none(record.author).unwrap_or_else(|| "Unknown".to_string()),
            description: None,
            publication_year: record.year,
            publisher: blank_to_none(record.publisher),
            rack_number: blank_to_none(record.rack),
            total_copies: record.total_copies.unwrap_or(1),
        });
    }

    Ok(books)
}

#[derive(Debug, Deserialize)]
struct StudentRecord {
    #[serde(rename = "Full Name")]
    full_name: String,
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "Email")]
    email: String,
    #[serde(rename = "Enrollment Number")]
    enrollment_number: Option<String>,
    #[serde(rename = "Program")]
    program: Option<String>,
    #[serde(rename = "Semester")]
    semester: Option<String>,
    #[serde(rename = "Contact Number")]
    contact_number: Option<String>,
    #[serde(rename = "Address")]
    address: Option<String>,
}

pub fn parse_students_csv(content: &[u8]) -> Result<Vec<StudentInput>, LedgerError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content);

    let mut students = Vec::new();
    for result in rdr.deserialize() {
        let record: StudentRecord = result.map_err(parse_error)?;
        students.push(StudentInput {
            username: record.username,
            email: record.email,
            full_name: record.full_name,
            enrollment_number: blank_to_none(record.enrollment_number),
            program: blank_to_none(record.program),
            semester: blank_to_none(record.semester),
            contact_number: blank_to_none(record.contact_number),
            address: blank_to_none(record.address),
            joining_date: None,
        });
    }

    Ok(students)
}

/// One spreadsheet row of fee assignments: a username plus one raw cell per
/// fee header column.
#[derive(Debug, Clone, PartialEq)]
pub struct FeeAssignmentRow {
    pub username: String,
    /// `(header name, raw cell)` pairs in column order
    pub cells: Vec<(String, String)>,
}

pub fn parse_fee_assignments_csv(content: &[u8]) -> Result<Vec<FeeAssignmentRow>, LedgerError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content);

    let headers = rdr.headers().map_err(parse_error)?.clone();
    let username_col = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("username"))
        .ok_or_else(|| LedgerError::Validation("missing Username column".into()))?;

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(parse_error)?;
        let username = record.get(username_col).unwrap_or_default().to_string();
        if username.is_empty() {
            continue;
        }

        let cells = headers
            .iter()
            .zip(record.iter())
            .enumerate()
            .filter(|(i, _)| *i != username_col)
            .map(|(_, (header, cell))| (header.to_string(), cell.to_string()))
            .collect();

        rows.push(FeeAssignmentRow { username, cells });
    }

    Ok(rows)
}

/// One lump-sum payment from a bulk collection spreadsheet
#[derive(Debug, Clone, PartialEq)]
pub struct BulkCollectionRow {
    pub username: String,
    pub amount_paid: f64,
    pub discount: f64,
    pub late_fees: f64,
    pub additional_charges: f64,
    pub payment_mode: Option<String>,
    pub receipt_date: Option<NaiveDate>,
    pub transaction_no: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BulkCollectionRecord {
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "Payable Amount")]
    amount: Option<String>,
    #[serde(rename = "Discount")]
    discount: Option<String>,
    #[serde(rename = "Late Fees")]
    late_fees: Option<String>,
    #[serde(rename = "Additional Charges")]
    additional_charges: Option<String>,
    #[serde(rename = "Payment Mode")]
    payment_mode: Option<String>,
    #[serde(rename = "Receipt Date")]
    receipt_date: Option<String>,
    #[serde(rename = "Ref ID / Trans No")]
    transaction_no: Option<String>,
    #[serde(rename = "Remarks")]
    remarks: Option<String>,
}

pub fn parse_bulk_collections_csv(content: &[u8]) -> Result<Vec<BulkCollectionRow>, LedgerError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content);

    let mut rows = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        let record: BulkCollectionRecord = result.map_err(parse_error)?;

        let money = |label: &str, cell: Option<String>| -> Result<f64, LedgerError> {
            parse_amount(cell.as_deref().unwrap_or_default()).ok_or_else(|| {
                LedgerError::Validation(format!("row {}: invalid {}", line + 2, label))
            })
        };

        rows.push(BulkCollectionRow {
            username: record.username,
            amount_paid: money("payable amount", record.amount)?,
            discount: money("discount", record.discount)?,
            late_fees: money("late fees", record.late_fees)?,
            additional_charges: money("additional charges", record.additional_charges)?,
            payment_mode: blank_to_none(record.payment_mode),
            receipt_date: blank_to_none(record.receipt_date).and_then(|d| match parse_date(&d) {
                Ok(date) => Some(date),
                Err(_) => {
                    tracing::warn!(
                        "row {}: unreadable receipt date '{}', recording at collection time",
                        line + 2,
                        d
                    );
                    None
                }
            }),
            transaction_no: blank_to_none(record.transaction_no),
            remarks: blank_to_none(record.remarks),
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn books_default_missing_columns() {
        let csv = "Title,ISBN,Category,Author,Year,Publisher,Rack,Total Copies\n\
                   Dune,978-0441013593,Fiction,Frank Herbert,1965,Ace,R1,3\n\
                   Untitled,123,,,,,,\n";

        let books = parse_books_csv(csv.as_bytes()).unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0].isbn, "9780441013593");
        assert_eq!(books[0].total_copies, 3);
        assert_eq!(books[0].publication_year, Some(1965));
        assert_eq!(books[1].category, "General");
        assert_eq!(books[1].author, "Unknown");
        assert_eq!(books[1].total_copies, 1);
    }

    #[test]
    fn malformed_book_row_is_a_validation_error() {
        let csv = "Title,ISBN,Category,Author,Year,Publisher,Rack,Total Copies\n\
                   Dune,1,Fiction,Herbert,not-a-year,,,1\n";
        let err = parse_books_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn students_parse_optional_fields() {
        let csv = "Full Name,Username,Email,Enrollment Number,Program,Semester,Contact Number,Address\n\
                   Asha Verma,asha,asha@x.test,EN-1,BSc,2,,\n";
        let students = parse_students_csv(csv.as_bytes()).unwrap();
        assert_eq!(students[0].username, "asha");
        assert_eq!(students[0].enrollment_number.as_deref(), Some("EN-1"));
        assert_eq!(students[0].contact_number, None);
    }

    #[test]
    fn fee_assignment_columns_follow_headers() {
        let csv = "Username,Library Fee,Lab Fee\nasha,1500,\n,10,10\nrohan,abc,300\n";
        let rows = parse_fee_assignments_csv(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].cells,
            vec![
                ("Library Fee".to_string(), "1500".to_string()),
                ("Lab Fee".to_string(), "".to_string()),
            ]
        );
        assert_eq!(rows[1].username, "rohan");
        assert_eq!(rows[1].cells[0].1, "abc");
    }

    #[test]
    fn fee_assignment_needs_username_column() {
        let err = parse_fee_assignments_csv(b"Name,Library Fee\nasha,10\n").unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn bulk_rows_parse_amounts_and_dates() {
        let csv = "Username,Payable Amount,Discount,Late Fees,Additional Charges,Payment Mode,Receipt Date,Ref ID / Trans No,Remarks\n\
                   asha,\"1,250.50\",50,,10,UPI,15/06/2024,TX-9,June\n";
        let rows = parse_bulk_collections_csv(csv.as_bytes()).unwrap();

        let row = &rows[0];
        assert_eq!(row.amount_paid, 1250.5);
        assert_eq!(row.discount, 50.0);
        assert_eq!(row.late_fees, 0.0);
        assert_eq!(row.additional_charges, 10.0);
        assert_eq!(row.receipt_date, NaiveDate::from_ymd_opt(2024, 6, 15));
        assert_eq!(row.transaction_no.as_deref(), Some("TX-9"));
    }

    #[test]
    fn bulk_unreadable_receipt_date_falls_back_to_now() {
        let csv = "Username,Payable Amount,Discount,Late Fees,Additional Charges,Payment Mode,Receipt Date,Ref ID / Trans No,Remarks\n\
                   asha,100,,,,Cash,next tuesday,,\n";
        let rows = parse_bulk_collections_csv(csv.as_bytes()).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount_paid, 100.0);
        assert_eq!(rows[0].receipt_date, None);
    }

    #[test]
    fn bulk_rejects_garbage_amounts() {
        let csv = "Username,Payable Amount,Discount,Late Fees,Additional Charges,Payment Mode,Receipt Date,Ref ID / Trans No,Remarks\n\
                   asha,lots,,,,,,,\n";
        let err = parse_bulk_collections_csv(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn amount_cells_are_lenient() {
        assert_eq!(parse_amount(""), Some(0.0));
        assert_eq!(parse_amount(" 1,000 "), Some(1000.0));
        assert_eq!(parse_amount("x"), None);
    }
}
