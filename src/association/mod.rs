// src/association/mod.rs
//
// Detection-to-track association. Two interchangeable strategies behind one
// trait: greedy max-IoU (default) and global assignment over a cost matrix.
// They agree whenever only one feasible pairing exists, and intentionally
// differ on degenerate many-to-many scenes.

pub mod greedy;
pub mod hungarian;

pub use greedy::GreedyIou;
pub use hungarian::MatrixAssignment;

use crate::config::TrackerConfig;
use crate::types::{Detection, TrackedObject};

/// Outcome of associating one frame's detections against the session state.
/// Indices refer to the slices passed to `associate`.
#[derive(Debug, Clone, Default)]
pub struct AssignmentResult {
    /// `(detection index, active-track index)` pairs
    pub matches: Vec<(usize, usize)>,
    /// `(detection index, lost-pool index)` pairs for re-acquired tracks.
    /// Only the greedy strategy produces these.
    pub revived: Vec<(usize, usize)>,
    /// Detections that matched nothing and become new tracks
    pub unmatched_detections: Vec<usize>,
}

/// Scores detections against tracks, assigns them, and reports which
/// detections are new. Each detection matches at most one track per frame and
/// vice versa.
pub trait Associator: Send + Sync {
    fn associate(
        &self,
        detections: &[Detection],
        tracks: &[TrackedObject],
        lost_tracks: &[TrackedObject],
        cfg: &TrackerConfig,
    ) -> AssignmentResult;
}

/// Strategy selection from the construction config.
pub fn for_config(cfg: &TrackerConfig) -> Box<dyn Associator> {
    if cfg.use_matrix {
        Box::new(MatrixAssignment)
    } else {
        Box::new(GreedyIou)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::types::{Detection, Movement, TrackState, TrackedObject};

    pub fn track(id: &str, class_name: &str, bbox: [f32; 4]) -> TrackedObject {
        TrackedObject {
            id: id.to_string(),
            detection: Detection::new(class_name, 0.9, bbox),
            state: TrackState::Active,
            hits: 3,
            misses: 0,
            lost_frames: 0,
            movement: Movement::starting_at(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::track;
    use super::*;

    // Both strategies must produce the same assignment when only one feasible
    // pairing exists.
    #[test]
    fn strategies_agree_on_unambiguous_scene() {
        let cfg = TrackerConfig::default();
        let tracks = vec![
            track("1", "person", [10.0, 10.0, 50.0, 50.0]),
            track("2", "vehicle", [400.0, 400.0, 80.0, 60.0]),
        ];
        let detections = vec![
            Detection::new("vehicle", 0.9, [402.0, 401.0, 80.0, 60.0]),
            Detection::new("person", 0.8, [12.0, 11.0, 50.0, 50.0]),
        ];

        for associator in [for_config(&cfg), {
            let mut matrix_cfg = cfg.clone();
            matrix_cfg.use_matrix = true;
            for_config(&matrix_cfg)
        }] {
            let mut result = associator.associate(&detections, &tracks, &[], &cfg);
            result.matches.sort_unstable();
            assert_eq!(result.matches, vec![(0, 1), (1, 0)]);
            assert!(result.unmatched_detections.is_empty());
        }
    }
}
