//! rollcall-core: Face matching and attendance session policy.
//!
//! Matches face descriptors against the enrolled roster, decides when a
//! recognized student should be marked present, and extracts descriptors
//! with SCRFD + ArcFace through ONNX Runtime.

pub mod alignment;
pub mod detector;
pub mod encoder;
pub mod matcher;
pub mod outcome;
pub mod policy;
pub mod types;

pub use encoder::{EncoderError, FaceEncoder, OnnxFaceEncoder};
pub use matcher::{EuclideanMatcher, Matcher, DEFAULT_MATCH_THRESHOLD};
pub use outcome::{DescriptorOutcome, MarkOutcome, OutcomeKind, RegisterOutcome, SessionOutcome};
pub use policy::{
    AttendanceLedger, Decision, MarkedStudent, RunContext, SessionPolicy, DEFAULT_COOLDOWN,
};
pub use types::{Classification, Descriptor, FaceRegion, RosterEntry, Scope, Student};
