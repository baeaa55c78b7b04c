use chrono::NaiveDate;
use rollcall_core::Scope;
use std::fmt;

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LectureStatus {
    Active,
    Completed,
}

impl LectureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LectureStatus::Active => "active",
            LectureStatus::Completed => "completed",
        }
    }

    pub(crate) fn parse(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(LectureStatus::Active),
            "completed" => Ok(LectureStatus::Completed),
            other => Err(StoreError::InvalidData(format!("unknown lecture status: {other}"))),
        }
    }
}

impl fmt::Display for LectureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lecture session. Timestamps are RFC 3339.
#[derive(Debug, Clone, PartialEq)]
pub struct Lecture {
    pub lecture_id: String,
    pub course_code: String,
    pub instructor: String,
    pub room: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub status: LectureStatus,
}

/// One attendance record. Timestamps are RFC 3339, `date` is `YYYY-MM-DD`.
///
/// For session-scoped records `exit_time` is always `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub id: String,
    pub student_id: String,
    pub scope: Scope,
    pub date: String,
    pub entry_time: String,
    pub exit_time: Option<String>,
    pub status: String,
}

impl AttendanceRecord {
    pub fn session_id(&self) -> Option<&str> {
        match &self.scope {
            Scope::Session(id) => Some(id),
            Scope::Date(_) => None,
        }
    }
}

pub(crate) fn parse_scope(kind: &str, key: &str) -> Result<Scope> {
    match kind {
        "session" => Ok(Scope::Session(key.to_string())),
        "date" => NaiveDate::parse_from_str(key, "%Y-%m-%d")
            .map(Scope::Date)
            .map_err(|e| StoreError::InvalidData(format!("bad attendance date {key:?}: {e}"))),
        other => Err(StoreError::InvalidData(format!("unknown scope kind: {other}"))),
    }
}

/// Filter for [`Ledger::attendance_report`](crate::Ledger::attendance_report).
/// Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub date: Option<NaiveDate>,
    pub session_id: Option<String>,
}
