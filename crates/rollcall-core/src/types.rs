use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl FaceRegion {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Intersection over union with another region.
    pub fn iou(&self, other: &FaceRegion) -> f32 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.width * self.height + other.width * other.height - inter;
        if union > 0.0 { inter / union } else { 0.0 }
    }
}

/// Fixed-length face descriptor. Serialized as a bare array of floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor {
    pub values: Vec<f32>,
}

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean distance between two descriptors. Always non-negative.
    ///
    /// Descriptors of different length, or empty ones, are infinitely far apart.
    pub fn distance(&self, other: &Descriptor) -> f32 {
        if self.is_empty() || self.len() != other.len() {
            return f32::INFINITY;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }

    /// True when `other` lies within `threshold` of this descriptor (inclusive).
    pub fn is_match(&self, other: &Descriptor, threshold: f32) -> bool {
        self.distance(other) <= threshold
    }
}

/// A registered student and every descriptor enrolled for them.
#[derive(Debug, Clone)]
pub struct Student {
    pub student_id: String,
    pub name: String,
    pub department: String,
    pub descriptors: Vec<Descriptor>,
    pub registered_on: String,
}

/// One (identity, descriptor) pair of the flattened recognition roster.
///
/// A student with N descriptors contributes N entries.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub student_id: String,
    pub name: String,
    pub descriptor: Descriptor,
}

/// Outcome of matching a captured descriptor against the roster.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Known {
        student_id: String,
        name: String,
        distance: f32,
    },
    Unknown,
}

impl Classification {
    pub fn student_id(&self) -> Option<&str> {
        match self {
            Classification::Known { student_id, .. } => Some(student_id),
            Classification::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Classification::Known { .. })
    }
}

/// Grouping key of an attendance record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One record per student per lecture session; repeat marks are no-ops.
    Session(String),
    /// One record per student per calendar day; repeat marks refresh the exit time.
    Date(NaiveDate),
}

impl Scope {
    /// Storage discriminator for the scope regime.
    pub fn kind(&self) -> &'static str {
        match self {
            Scope::Session(_) => "session",
            Scope::Date(_) => "date",
        }
    }

    /// Storage key within the regime: session id or `YYYY-MM-DD`.
    pub fn key(&self) -> String {
        match self {
            Scope::Session(id) => id.clone(),
            Scope::Date(date) => date.format("%Y-%m-%d").to_string(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Session(id) => write!(f, "lecture {id}"),
            Scope::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(x: f32, y: f32, w: f32, h: f32) -> FaceRegion {
        FaceRegion { x, y, width: w, height: h, confidence: 0.9, landmarks: None }
    }

    #[test]
    fn test_distance_identical() {
        let a = Descriptor::new(vec![0.1, 0.2, 0.3]);
        assert_eq!(a.distance(&a.clone()), 0.0);
    }

    #[test]
    fn test_distance_is_euclidean() {
        let a = Descriptor::new(vec![0.0, 0.0]);
        let b = Descriptor::new(vec![3.0, 4.0]);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
        assert!((b.distance(&a) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_of_mismatched_lengths_is_infinite() {
        let query = Descriptor::new(vec![0.9, -0.4, 0.7]);
        assert_eq!(query.distance(&Descriptor::new(vec![])), f32::INFINITY);
        assert_eq!(query.distance(&Descriptor::new(vec![0.9])), f32::INFINITY);
        assert_eq!(Descriptor::new(vec![]).distance(&Descriptor::new(vec![])), f32::INFINITY);
        assert!(!query.is_match(&Descriptor::new(vec![0.9]), 0.5));
    }

    #[test]
    fn test_is_match_inclusive_threshold() {
        let a = Descriptor::new(vec![0.0]);
        let b = Descriptor::new(vec![0.5]);
        assert!(a.is_match(&b, 0.5));
        assert!(!a.is_match(&b, 0.49));
    }

    #[test]
    fn test_descriptor_serializes_as_array() {
        let d = Descriptor::new(vec![1.0, 2.5]);
        assert_eq!(serde_json::to_string(&d).unwrap(), "[1.0,2.5]");
        let back: Descriptor = serde_json::from_str("[1.0,2.5]").unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_iou() {
        let a = region(0.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        let b = region(5.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&b) - 50.0 / 150.0).abs() < 1e-6);
        let far = region(100.0, 100.0, 10.0, 10.0);
        assert_eq!(a.iou(&far), 0.0);
    }

    #[test]
    fn test_scope_keys() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(Scope::Date(date).kind(), "date");
        assert_eq!(Scope::Date(date).key(), "2026-03-09");
        assert_eq!(Scope::Session("L1".into()).kind(), "session");
        assert_eq!(Scope::Session("L1".into()).key(), "L1");
        assert_eq!(Scope::Session("L1".into()).to_string(), "lecture L1");
    }
}
