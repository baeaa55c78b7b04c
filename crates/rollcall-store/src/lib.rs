//! rollcall-store: Attendance ledger on SQLite.
//!
//! Stores students with their face descriptors, lecture sessions, and
//! attendance records keyed by (student, scope).

pub mod error;
pub mod ledger;
pub mod records;
pub mod schema;

pub use error::{Result, StoreError};
pub use ledger::Ledger;
pub use records::{AttendanceRecord, Lecture, LectureStatus, ReportFilter};
