use std::path::Path;

use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use uuid::Uuid;

use rollcall_core::{
    AttendanceLedger, Descriptor, DescriptorOutcome, MarkOutcome, RegisterOutcome, RosterEntry,
    Scope, SessionOutcome, Student,
};

use crate::error::{Result, StoreError};
use crate::records::{parse_scope, AttendanceRecord, Lecture, LectureStatus, ReportFilter};
use crate::schema;

const RECORD_COLUMNS: &str =
    "id, student_id, scope_kind, scope_id, date, entry_time, exit_time, status";

/// Durable record of students, lecture sessions and attendance.
pub struct Ledger {
    conn: Connection,
}

impl Ledger {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        tracing::debug!(path = %path.display(), "ledger opened");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    // --- Students ---

    /// Insert a student, or replace the descriptors and display fields of an existing one.
    pub fn register_student(
        &self,
        student_id: &str,
        name: &str,
        department: &str,
        descriptors: &[Descriptor],
    ) -> Result<RegisterOutcome> {
        let encoded = serde_json::to_string(descriptors)?;
        let tx = self.conn.unchecked_transaction()?;

        let exists = tx
            .query_row("SELECT 1 FROM students WHERE student_id = ?1", [student_id], |_| Ok(()))
            .optional()?
            .is_some();

        let outcome = if exists {
            tx.execute(
                "UPDATE students SET face_descriptors = ?1, name = ?2, department = ?3
                 WHERE student_id = ?4",
                params![encoded, name, department, student_id],
            )?;
            RegisterOutcome::Replaced(student_id.to_string())
        } else {
            tx.execute(
                "INSERT INTO students
                 (student_id, name, department, face_descriptors, registered_on)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![student_id, name, department, encoded, Local::now().to_rfc3339()],
            )?;
            RegisterOutcome::Registered(student_id.to_string())
        };

        tx.commit()?;
        tracing::info!(
            student_id,
            descriptors = descriptors.len(),
            kind = ?outcome.kind(),
            "student registered"
        );
        Ok(outcome)
    }

    /// Append one descriptor to an existing student.
    pub fn add_descriptor(
        &self,
        student_id: &str,
        descriptor: &Descriptor,
    ) -> Result<DescriptorOutcome> {
        let tx = self.conn.unchecked_transaction()?;

        let stored: Option<String> = tx
            .query_row(
                "SELECT face_descriptors FROM students WHERE student_id = ?1",
                [student_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(stored) = stored else {
            return Ok(DescriptorOutcome::StudentNotFound(student_id.to_string()));
        };

        let mut descriptors: Vec<Descriptor> = serde_json::from_str(&stored)?;
        descriptors.push(descriptor.clone());
        tx.execute(
            "UPDATE students SET face_descriptors = ?1 WHERE student_id = ?2",
            params![serde_json::to_string(&descriptors)?, student_id],
        )?;
        tx.commit()?;

        Ok(DescriptorOutcome::Added(student_id.to_string()))
    }

    pub fn student(&self, student_id: &str) -> Result<Option<Student>> {
        let row = self
            .conn
            .query_row(
                "SELECT student_id, name, department, face_descriptors, registered_on
                 FROM students WHERE student_id = ?1",
                [student_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(student_id, name, department, encoded, registered_on)| -> Result<Student> {
            Ok(Student {
                student_id,
                name,
                department,
                descriptors: serde_json::from_str(&encoded)?,
                registered_on,
            })
        })
        .transpose()
    }

    /// Flattened roster: one entry per stored descriptor, in registration order.
    pub fn all_descriptors(&self) -> Result<impl Iterator<Item = RosterEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT student_id, name, face_descriptors FROM students ORDER BY rowid")?;
        let rows: Vec<(String, String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<std::result::Result<_, _>>()?;

        let students = rows
            .into_iter()
            .map(|(id, name, encoded)| -> Result<(String, String, Vec<Descriptor>)> {
                Ok((id, name, serde_json::from_str(&encoded)?))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(students.into_iter().flat_map(|(student_id, name, descriptors)| {
            descriptors.into_iter().map(move |descriptor| RosterEntry {
                student_id: student_id.clone(),
                name: name.clone(),
                descriptor,
            })
        }))
    }

    // --- Lectures ---

    pub fn create_session(
        &self,
        lecture_id: &str,
        course_code: &str,
        instructor: &str,
        room: &str,
    ) -> Result<SessionOutcome> {
        self.create_session_at(lecture_id, course_code, instructor, room, Local::now())
    }

    /// Create an active lecture starting at `start`. An existing id is left untouched.
    pub fn create_session_at(
        &self,
        lecture_id: &str,
        course_code: &str,
        instructor: &str,
        room: &str,
        start: DateTime<Local>,
    ) -> Result<SessionOutcome> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO lectures
             (lecture_id, course_code, instructor, room, start_time, end_time, status)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)",
            params![
                lecture_id,
                course_code,
                instructor,
                room,
                start.to_rfc3339(),
                LectureStatus::Active.as_str(),
            ],
        )?;

        if inserted == 0 {
            tracing::info!(lecture_id, "lecture already exists");
            Ok(SessionOutcome::AlreadyExists(lecture_id.to_string()))
        } else {
            tracing::info!(lecture_id, course_code, room, "lecture created");
            Ok(SessionOutcome::Created(lecture_id.to_string()))
        }
    }

    /// Close a lecture. Unknown ids match nothing and are not an error.
    pub fn end_session(&self, lecture_id: &str) -> Result<SessionOutcome> {
        let updated = self.conn.execute(
            "UPDATE lectures SET end_time = ?1, status = ?2 WHERE lecture_id = ?3",
            params![Local::now().to_rfc3339(), LectureStatus::Completed.as_str(), lecture_id],
        )?;
        Ok(SessionOutcome::Ended {
            session_id: lecture_id.to_string(),
            matched: updated > 0,
        })
    }

    pub fn lecture(&self, lecture_id: &str) -> Result<Option<Lecture>> {
        let row = self
            .conn
            .query_row(
                "SELECT lecture_id, course_code, instructor, room, start_time, end_time, status
                 FROM lectures WHERE lecture_id = ?1",
                [lecture_id],
                |row| {
                    Ok((
                        Lecture {
                            lecture_id: row.get(0)?,
                            course_code: row.get(1)?,
                            instructor: row.get(2)?,
                            room: row.get(3)?,
                            start_time: row.get(4)?,
                            end_time: row.get(5)?,
                            status: LectureStatus::Active,
                        },
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(mut lecture, status)| -> Result<Lecture> {
            lecture.status = LectureStatus::parse(&status)?;
            Ok(lecture)
        })
        .transpose()
    }

    // --- Attendance ---

    pub fn mark_attendance(&self, student_id: &str, scope: &Scope) -> Result<MarkOutcome> {
        self.mark_attendance_at(student_id, scope, Local::now())
    }

    /// Mark `student_id` present in `scope` at time `now`.
    ///
    /// The insert is conditional on the (student, scope) key, so concurrent
    /// writers cannot create duplicate records. A date-scoped repeat
    /// refreshes the exit time; a session-scoped repeat writes nothing.
    pub fn mark_attendance_at(
        &self,
        student_id: &str,
        scope: &Scope,
        now: DateTime<Local>,
    ) -> Result<MarkOutcome> {
        let timestamp = now.to_rfc3339();
        let date = match scope {
            Scope::Date(date) => *date,
            Scope::Session(_) => now.date_naive(),
        };

        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO attendance
             (id, student_id, scope_kind, scope_id, date, entry_time, exit_time, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, 'present')",
            params![
                Uuid::new_v4().to_string(),
                student_id,
                scope.kind(),
                scope.key(),
                date.format("%Y-%m-%d").to_string(),
                timestamp,
            ],
        )?;

        if inserted > 0 {
            return Ok(MarkOutcome::Marked {
                student_id: student_id.to_string(),
                scope: scope.clone(),
            });
        }

        match scope {
            Scope::Date(_) => {
                self.conn.execute(
                    "UPDATE attendance SET exit_time = ?1
                     WHERE student_id = ?2 AND scope_kind = ?3 AND scope_id = ?4",
                    params![timestamp, student_id, scope.kind(), scope.key()],
                )?;
                Ok(MarkOutcome::ExitUpdated {
                    student_id: student_id.to_string(),
                })
            }
            Scope::Session(session_id) => Ok(MarkOutcome::AlreadyMarked {
                student_id: student_id.to_string(),
                session_id: session_id.clone(),
            }),
        }
    }

    /// Records matching every set field of `filter`.
    pub fn attendance_report(&self, filter: &ReportFilter) -> Result<Vec<AttendanceRecord>> {
        let date = filter.date.map(|d| d.format("%Y-%m-%d").to_string());
        self.query_records(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM attendance
                 WHERE (?1 IS NULL OR date = ?1)
                   AND (?2 IS NULL OR (scope_kind = 'session' AND scope_id = ?2))
                 ORDER BY entry_time, rowid"
            ),
            params![date, filter.session_id],
        )
    }

    /// Full attendance history of one student.
    pub fn student_attendance(&self, student_id: &str) -> Result<Vec<AttendanceRecord>> {
        self.query_records(
            &format!(
                "SELECT {RECORD_COLUMNS} FROM attendance WHERE student_id = ?1
                 ORDER BY entry_time, rowid"
            ),
            [student_id],
        )
    }

    fn query_records<P: Params>(&self, sql: &str, params: P) -> Result<Vec<AttendanceRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let raw: Vec<RawRecord> = stmt
            .query_map(params, RawRecord::from_row)?
            .collect::<std::result::Result<_, _>>()?;
        raw.into_iter().map(RawRecord::into_record).collect()
    }
}

impl AttendanceLedger for Ledger {
    type Error = StoreError;

    fn mark_attendance(&self, student_id: &str, scope: &Scope) -> Result<MarkOutcome> {
        self.mark_attendance_at(student_id, scope, Local::now())
    }
}

struct RawRecord {
    id: String,
    student_id: String,
    scope_kind: String,
    scope_id: String,
    date: String,
    entry_time: String,
    exit_time: Option<String>,
    status: String,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            student_id: row.get(1)?,
            scope_kind: row.get(2)?,
            scope_id: row.get(3)?,
            date: row.get(4)?,
            entry_time: row.get(5)?,
            exit_time: row.get(6)?,
            status: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<AttendanceRecord> {
        Ok(AttendanceRecord {
            scope: parse_scope(&self.scope_kind, &self.scope_id)?,
            id: self.id,
            student_id: self.student_id,
            date: self.date,
            entry_time: self.entry_time,
            exit_time: self.exit_time,
            status: self.status,
        })
    }
}
