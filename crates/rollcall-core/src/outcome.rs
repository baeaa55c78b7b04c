//! Tagged results of ledger operations.
//!
//! Every outcome exposes a coarse [`OutcomeKind`] for branching and a
//! `Display` rendering for the operator console.

use crate::types::Scope;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Created,
    Updated,
    AlreadyExists,
    NotFound,
}

/// Result of marking a student present.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkOutcome {
    /// A new record was created in `scope`.
    Marked { student_id: String, scope: Scope },
    /// Date-scoped record already existed; its exit time was refreshed.
    ExitUpdated { student_id: String },
    /// Session-scoped record already existed; nothing was written.
    AlreadyMarked { student_id: String, session_id: String },
}

impl MarkOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            MarkOutcome::Marked { .. } => OutcomeKind::Created,
            MarkOutcome::ExitUpdated { .. } => OutcomeKind::Updated,
            MarkOutcome::AlreadyMarked { .. } => OutcomeKind::AlreadyExists,
        }
    }
}

impl fmt::Display for MarkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkOutcome::Marked { student_id, scope: Scope::Session(session_id) } => {
                write!(f, "Marked attendance for student {student_id} in lecture {session_id}")
            }
            MarkOutcome::Marked { student_id, scope: Scope::Date(_) } => {
                write!(f, "Marked attendance for student {student_id}")
            }
            MarkOutcome::ExitUpdated { student_id } => {
                write!(f, "Updated exit time for student {student_id}")
            }
            MarkOutcome::AlreadyMarked { student_id, session_id } => write!(
                f,
                "Already marked attendance for student {student_id} in lecture {session_id}"
            ),
        }
    }
}

/// Result of a lecture session lifecycle operation.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Created(String),
    AlreadyExists(String),
    /// `matched` is false when no session with that id was stored.
    Ended { session_id: String, matched: bool },
}

impl SessionOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            SessionOutcome::Created(_) => OutcomeKind::Created,
            SessionOutcome::AlreadyExists(_) => OutcomeKind::AlreadyExists,
            SessionOutcome::Ended { matched: true, .. } => OutcomeKind::Updated,
            SessionOutcome::Ended { matched: false, .. } => OutcomeKind::NotFound,
        }
    }
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionOutcome::Created(id) => write!(f, "Created lecture {id}"),
            SessionOutcome::AlreadyExists(id) => write!(f, "Lecture {id} already exists"),
            SessionOutcome::Ended { session_id, .. } => write!(f, "Ended lecture {session_id}"),
        }
    }
}

/// Result of registering a student.
#[derive(Debug, Clone, PartialEq)]
pub enum RegisterOutcome {
    Registered(String),
    /// The student existed; descriptors and display fields were replaced.
    Replaced(String),
}

impl RegisterOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            RegisterOutcome::Registered(_) => OutcomeKind::Created,
            RegisterOutcome::Replaced(_) => OutcomeKind::Updated,
        }
    }
}

impl fmt::Display for RegisterOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterOutcome::Registered(id) => write!(f, "Registered student {id} successfully"),
            RegisterOutcome::Replaced(id) => write!(f, "Updated face data for student {id}"),
        }
    }
}

/// Result of appending a descriptor to an existing student.
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorOutcome {
    Added(String),
    StudentNotFound(String),
}

impl DescriptorOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            DescriptorOutcome::Added(_) => OutcomeKind::Updated,
            DescriptorOutcome::StudentNotFound(_) => OutcomeKind::NotFound,
        }
    }
}

impl fmt::Display for DescriptorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorOutcome::Added(id) => write!(f, "Added new face encoding for student {id}"),
            DescriptorOutcome::StudentNotFound(id) => write!(f, "Student {id} not found"),
        }
    }
}
