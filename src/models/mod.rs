pub mod audit_log;
pub mod author;
pub mod book;
pub mod book_request;
pub mod category;
pub mod fee_collection;
pub mod fee_collection_item;
pub mod fee_header;
pub mod fine;
pub mod issue;
pub mod notification;
pub mod student_fee;
pub mod user;

pub use book_request::RequestStatus;
pub use issue::IssueStatus;
pub use student_fee::FeeStatus;
pub use user::UserRole;
