//! Attendance report rendering.

use anyhow::Result;
use chrono::DateTime;
use rollcall_store::{AttendanceRecord, Ledger, ReportFilter};
use std::collections::HashMap;

/// What to list.
#[derive(Debug, Clone)]
pub enum ReportQuery {
    Filtered(ReportFilter),
    Student(String),
}

/// Fetch the records for `query` and render them as a table.
pub fn build_report(ledger: &Ledger, query: &ReportQuery) -> Result<String> {
    let records = match query {
        ReportQuery::Filtered(filter) => ledger.attendance_report(filter)?,
        ReportQuery::Student(student_id) => ledger.student_attendance(student_id)?,
    };

    let mut names = HashMap::new();
    for record in &records {
        if !names.contains_key(&record.student_id) {
            let name = ledger.student(&record.student_id)?.map(|s| s.name);
            names.insert(record.student_id.clone(), name);
        }
    }

    Ok(render(&records, &names))
}

pub fn render(records: &[AttendanceRecord], names: &HashMap<String, Option<String>>) -> String {
    if records.is_empty() {
        return "No attendance records".to_string();
    }

    let mut out = format!("Attendance records: {}\n", records.len());
    out.push_str(&format!(
        "{:<10}  {:<12}  {:<20}  {:<14}  {:<8}  {:<8}  {}",
        "DATE", "STUDENT", "NAME", "SCOPE", "ENTRY", "EXIT", "STATUS"
    ));
    for record in records {
        let name = names
            .get(&record.student_id)
            .and_then(|n| n.as_deref())
            .unwrap_or("-");
        let scope = match record.session_id() {
            Some(id) => format!("lecture {id}"),
            None => "day".to_string(),
        };
        let exit = record
            .exit_time
            .as_deref()
            .map(clock_time)
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "\n{:<10}  {:<12}  {:<20}  {:<14}  {:<8}  {:<8}  {}",
            record.date,
            record.student_id,
            name,
            scope,
            clock_time(&record.entry_time),
            exit,
            record.status
        ));
    }
    out
}

/// `HH:MM:SS` of an RFC 3339 timestamp; unparseable values are shown as stored.
fn clock_time(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}
