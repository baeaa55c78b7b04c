//! Roster matching: nearest known descriptor within a distance threshold.

use crate::types::{Classification, Descriptor, RosterEntry};

/// Default maximum descriptor distance for a positive identification.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.5;

/// Strategy for classifying a captured descriptor against the known roster.
pub trait Matcher {
    fn classify(
        &self,
        query: &Descriptor,
        roster: &[RosterEntry],
        threshold: f32,
    ) -> Classification;
}

/// Minimum Euclidean distance matcher.
///
/// Scans every roster entry. The first entry reaching the minimum wins
/// ties, so results follow roster iteration order.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn classify(
        &self,
        query: &Descriptor,
        roster: &[RosterEntry],
        threshold: f32,
    ) -> Classification {
        let mut best_dist = f32::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, entry) in roster.iter().enumerate() {
            let dist = query.distance(&entry.descriptor);
            if dist < best_dist {
                best_dist = dist;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx)
                if best_dist < threshold && query.is_match(&roster[idx].descriptor, threshold) =>
            {
                let entry = &roster[idx];
                Classification::Known {
                    student_id: entry.student_id.clone(),
                    name: entry.name.clone(),
                    distance: best_dist,
                }
            }
            _ => Classification::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, values: Vec<f32>) -> RosterEntry {
        RosterEntry {
            student_id: id.into(),
            name: format!("name-{id}"),
            descriptor: Descriptor::new(values),
        }
    }

    #[test]
    fn test_picks_nearest_entry() {
        let query = Descriptor::new(vec![1.0, 0.0, 0.0]);
        let roster = vec![
            entry("far", vec![0.0, 1.0, 0.0]),
            entry("near", vec![0.9, 0.1, 0.0]),
            entry("mid", vec![0.6, 0.4, 0.0]),
        ];

        let result = EuclideanMatcher.classify(&query, &roster, DEFAULT_MATCH_THRESHOLD);
        match result {
            Classification::Known { student_id, name, distance } => {
                assert_eq!(student_id, "near");
                assert_eq!(name, "name-near");
                assert!(distance < 0.5);
            }
            Classification::Unknown => panic!("expected a match"),
        }
    }

    #[test]
    fn test_minimum_above_threshold_is_unknown() {
        let query = Descriptor::new(vec![0.0, 0.0]);
        let roster = vec![entry("a", vec![0.7, 0.0]), entry("b", vec![0.0, 0.9])];
        assert_eq!(
            EuclideanMatcher.classify(&query, &roster, 0.5),
            Classification::Unknown
        );
    }

    #[test]
    fn test_distance_equal_to_threshold_is_unknown() {
        // is_match accepts 0.5 but the strict minimum check does not.
        let query = Descriptor::new(vec![0.0]);
        let roster = vec![entry("edge", vec![0.5])];
        assert_eq!(
            EuclideanMatcher.classify(&query, &roster, 0.5),
            Classification::Unknown
        );
    }

    #[test]
    fn test_empty_roster_is_unknown() {
        let query = Descriptor::new(vec![1.0, 0.0]);
        assert_eq!(EuclideanMatcher.classify(&query, &[], 0.5), Classification::Unknown);
    }

    #[test]
    fn test_tie_resolves_to_first_entry() {
        let query = Descriptor::new(vec![0.0, 0.0]);
        let roster = vec![
            entry("first", vec![0.1, 0.0]),
            entry("second", vec![0.0, 0.1]),
        ];
        let result = EuclideanMatcher.classify(&query, &roster, 0.5);
        assert_eq!(result.student_id(), Some("first"));
    }

    #[test]
    fn test_multiple_descriptors_per_student() {
        // The same identity appears as independent candidates.
        let query = Descriptor::new(vec![0.0, 1.0]);
        let roster = vec![
            entry("s1", vec![1.0, 0.0]),
            entry("s2", vec![0.7, 0.7]),
            entry("s1", vec![0.05, 0.95]),
        ];
        let result = EuclideanMatcher.classify(&query, &roster, 0.5);
        assert_eq!(result.student_id(), Some("s1"));
    }

    #[test]
    fn test_malformed_roster_entries_never_match() {
        let query = Descriptor::new(vec![0.9, -0.4, 0.7]);
        let roster = vec![entry("S1", vec![]), entry("S2", vec![0.9])];
        assert_eq!(EuclideanMatcher.classify(&query, &roster, 0.5), Classification::Unknown);

        let roster = vec![entry("S1", vec![]), entry("S3", vec![0.9, -0.4, 0.6])];
        assert_eq!(EuclideanMatcher.classify(&query, &roster, 0.5).student_id(), Some("S3"));
    }
}
