//! Attendance deduplication for a single recognition run.
//!
//! [`SessionPolicy`] decides, per recognized face per processed frame,
//! whether the ledger should be asked to mark the student present. All
//! per-run state lives in a [`RunContext`] that is built fresh for each
//! run and dropped when the run ends.

use crate::outcome::MarkOutcome;
use crate::types::{Classification, Scope};
use chrono::Local;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Default minimum time between two mark attempts for the same student.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Persistence seam used by the policy to record a presence event.
pub trait AttendanceLedger {
    type Error;

    fn mark_attendance(&self, student_id: &str, scope: &Scope) -> Result<MarkOutcome, Self::Error>;
}

/// A student confirmed present during the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedStudent {
    pub student_id: String,
    pub name: String,
}

/// State of one recognition run.
#[derive(Debug)]
pub struct RunContext {
    session_id: Option<String>,
    marked: HashSet<String>,
    marked_order: Vec<MarkedStudent>,
    last_marked_at: HashMap<String, Instant>,
}

impl RunContext {
    /// Start a run scoped to a lecture session, or to the calendar day when `None`.
    pub fn new(session_id: Option<String>) -> Self {
        Self {
            session_id,
            marked: HashSet::new(),
            marked_order: Vec::new(),
            last_marked_at: HashMap::new(),
        }
    }

    /// Attendance scope for a mark issued now.
    pub fn scope(&self) -> Scope {
        match &self.session_id {
            Some(id) => Scope::Session(id.clone()),
            None => Scope::Date(Local::now().date_naive()),
        }
    }

    pub fn is_marked(&self, student_id: &str) -> bool {
        self.marked.contains(student_id)
    }

    /// Students marked during this run, in marking order.
    pub fn marked(&self) -> &[MarkedStudent] {
        &self.marked_order
    }

    fn cooldown_expired(&self, student_id: &str, now: Instant, cooldown: Duration) -> bool {
        match self.last_marked_at.get(student_id) {
            None => true,
            Some(last) => now.saturating_duration_since(*last) > cooldown,
        }
    }

    fn record_mark(&mut self, student_id: &str, name: &str, now: Instant) {
        self.last_marked_at.insert(student_id.to_string(), now);
        if self.marked.insert(student_id.to_string()) {
            self.marked_order.push(MarkedStudent {
                student_id: student_id.to_string(),
                name: name.to_string(),
            });
        }
    }
}

/// What the policy did for one classified face.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Face was not identified; nothing happened.
    Ignored,
    /// The ledger was called and returned this outcome.
    Marked(MarkOutcome),
    /// Cooldown elapsed but the student is already marked this run; no ledger call.
    AlreadyMarked { student_id: String, name: String },
    /// Still inside the cooldown window; no ledger call and nothing to report.
    CoolingDown,
}

/// Cooldown and already-marked gate in front of the ledger.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    cooldown: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl SessionPolicy {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }

    /// Evaluate one classified face at time `now`.
    ///
    /// Run state is only updated after the ledger call succeeds, so a
    /// failed write is retried on the next processed frame.
    pub fn evaluate<L: AttendanceLedger>(
        &self,
        ctx: &mut RunContext,
        face: &Classification,
        now: Instant,
        ledger: &L,
    ) -> Result<Decision, L::Error> {
        let Classification::Known { student_id, name, .. } = face else {
            return Ok(Decision::Ignored);
        };

        let already_marked = ctx.is_marked(student_id);
        if !ctx.cooldown_expired(student_id, now, self.cooldown) {
            return Ok(Decision::CoolingDown);
        }
        if already_marked {
            return Ok(Decision::AlreadyMarked {
                student_id: student_id.clone(),
                name: name.clone(),
            });
        }

        let outcome = ledger.mark_attendance(student_id, &ctx.scope())?;
        ctx.record_mark(student_id, name, now);
        tracing::debug!(student_id = %student_id, kind = ?outcome.kind(), "attendance mark issued");

        Ok(Decision::Marked(outcome))
    }
}
