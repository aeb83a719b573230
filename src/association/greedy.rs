// src/association/greedy.rs
//
// Default strategy: each detection, in input order, takes the same-class
// track it overlaps best, provided the overlap strictly exceeds the class
// IoU threshold. Confirmed tracks that jump too far for IoU in one frame
// (fast objects, low frame rates) get a centroid-distance rescue bounded by
// the track's own box diagonal. Detections that still miss the active set
// get a second look at the lost pool before being declared new.

use super::{AssignmentResult, Associator};
use crate::config::TrackerConfig;
use crate::geometry;
use crate::types::{Detection, TrackState, TrackedObject};
use tracing::debug;

pub struct GreedyIou;

impl GreedyIou {
    /// Best unclaimed same-class candidate by IoU, strictly above the
    /// threshold. Ties keep the earliest-inserted track.
    fn best_by_iou(
        detection: &Detection,
        bbox: &[f32; 4],
        threshold: f32,
        pool: &[TrackedObject],
        claimed: &[bool],
    ) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (idx, track) in pool.iter().enumerate() {
            if claimed[idx] || track.detection.class_name != detection.class_name {
                continue;
            }
            let Some(track_box) = track.detection.bounding_box else {
                continue;
            };
            let overlap = geometry::iou(bbox, &track_box);
            if overlap <= threshold {
                continue;
            }
            // Strict > keeps the earlier track on equal overlap
            if best.map_or(true, |(_, score)| overlap > score) {
                best = Some((idx, overlap));
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Nearest unclaimed confirmed track of the same class whose centroid is
    /// within the track's own box diagonal. Rescues fast movers whose IoU
    /// collapses between frames; pending tracks are left to expire instead.
    fn rescue_by_centroid(
        detection: &Detection,
        bbox: &[f32; 4],
        pool: &[TrackedObject],
        claimed: &[bool],
    ) -> Option<usize> {
        let det_centroid = geometry::centroid(bbox);
        let mut best: Option<(usize, f32)> = None;
        for (idx, track) in pool.iter().enumerate() {
            if claimed[idx]
                || track.state != TrackState::Active
                || track.detection.class_name != detection.class_name
            {
                continue;
            }
            let Some(track_box) = track.detection.bounding_box else {
                continue;
            };
            let shift = geometry::distance(det_centroid, geometry::centroid(&track_box));
            if shift >= geometry::diagonal(&track_box) {
                continue;
            }
            if best.map_or(true, |(_, d)| shift < d) {
                best = Some((idx, shift));
            }
        }
        best.map(|(idx, _)| idx)
    }
}

impl Associator for GreedyIou {
    fn associate(
        &self,
        detections: &[Detection],
        tracks: &[TrackedObject],
        lost_tracks: &[TrackedObject],
        cfg: &TrackerConfig,
    ) -> AssignmentResult {
        let mut result = AssignmentResult::default();
        let mut track_claimed = vec![false; tracks.len()];
        let mut lost_claimed = vec![false; lost_tracks.len()];

        for (det_idx, det) in detections.iter().enumerate() {
            let Some(bbox) = det.bounding_box else {
                result.unmatched_detections.push(det_idx);
                continue;
            };
            let threshold = cfg.params_for(&det.class_name).iou_threshold;

            if let Some(track_idx) = Self::best_by_iou(det, &bbox, threshold, tracks, &track_claimed)
            {
                track_claimed[track_idx] = true;
                result.matches.push((det_idx, track_idx));
                continue;
            }

            if let Some(track_idx) = Self::rescue_by_centroid(det, &bbox, tracks, &track_claimed) {
                track_claimed[track_idx] = true;
                debug!(
                    track = %tracks[track_idx].id,
                    class = %det.class_name,
                    "centroid rescue: overlap collapsed but object is within reach"
                );
                result.matches.push((det_idx, track_idx));
                continue;
            }

            // Second chance: the lost pool, same class filter, same threshold
            if let Some(lost_idx) =
                Self::best_by_iou(det, &bbox, threshold, lost_tracks, &lost_claimed)
            {
                lost_claimed[lost_idx] = true;
                debug!(
                    track = %lost_tracks[lost_idx].id,
                    class = %det.class_name,
                    "re-acquired lost track"
                );
                result.revived.push((det_idx, lost_idx));
                continue;
            }

            result.unmatched_detections.push(det_idx);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::track;
    use super::*;
    use crate::types::TrackState;

    #[test]
    fn matches_highest_overlap_track() {
        let cfg = TrackerConfig::default();
        let tracks = vec![
            track("1", "person", [0.0, 0.0, 50.0, 50.0]),
            track("2", "person", [10.0, 10.0, 50.0, 50.0]),
        ];
        let detections = vec![Detection::new("person", 0.9, [9.0, 9.0, 50.0, 50.0])];

        let result = GreedyIou.associate(&detections, &tracks, &[], &cfg);
        assert_eq!(result.matches, vec![(0, 1)]);
    }

    #[test]
    fn equal_overlap_keeps_insertion_order() {
        let cfg = TrackerConfig::default();
        // Two identical tracks; the detection overlaps both identically
        let tracks = vec![
            track("1", "person", [0.0, 0.0, 50.0, 50.0]),
            track("2", "person", [0.0, 0.0, 50.0, 50.0]),
        ];
        let detections = vec![Detection::new("person", 0.9, [2.0, 2.0, 50.0, 50.0])];

        let result = GreedyIou.associate(&detections, &tracks, &[], &cfg);
        assert_eq!(result.matches, vec![(0, 0)]);
    }

    #[test]
    fn class_mismatch_never_matches() {
        let cfg = TrackerConfig::default();
        let tracks = vec![track("1", "vehicle", [0.0, 0.0, 50.0, 50.0])];
        let detections = vec![Detection::new("person", 0.9, [0.0, 0.0, 50.0, 50.0])];

        let result = GreedyIou.associate(&detections, &tracks, &[], &cfg);
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_detections, vec![0]);
    }

    #[test]
    fn centroid_rescue_keeps_fast_mover() {
        let cfg = TrackerConfig::default();
        // Disjoint boxes (IoU 0) but centroid shift 70 < diagonal 70.7
        let tracks = vec![track("1", "person", [10.0, 10.0, 50.0, 50.0])];
        let detections = vec![Detection::new("person", 0.9, [80.0, 10.0, 50.0, 50.0])];

        let result = GreedyIou.associate(&detections, &tracks, &[], &cfg);
        assert_eq!(result.matches, vec![(0, 0)]);
    }

    #[test]
    fn centroid_rescue_has_a_range_limit() {
        let cfg = TrackerConfig::default();
        // Shift 100 > diagonal 70.7: out of reach, becomes a new track
        let tracks = vec![track("1", "person", [10.0, 10.0, 50.0, 50.0])];
        let detections = vec![Detection::new("person", 0.9, [110.0, 10.0, 50.0, 50.0])];

        let result = GreedyIou.associate(&detections, &tracks, &[], &cfg);
        assert!(result.matches.is_empty());
        assert_eq!(result.unmatched_detections, vec![0]);
    }

    #[test]
    fn centroid_rescue_skips_pending_tracks() {
        let cfg = TrackerConfig::default();
        let mut pending = track("1", "person", [10.0, 10.0, 50.0, 50.0]);
        pending.state = TrackState::Pending;
        pending.hits = 1;

        let detections = vec![Detection::new("person", 0.9, [80.0, 10.0, 50.0, 50.0])];
        let result = GreedyIou.associate(&detections, &[pending], &[], &cfg);
        assert_eq!(result.unmatched_detections, vec![0]);
    }

    #[test]
    fn lost_pool_is_consulted_after_active_set() {
        let cfg = TrackerConfig::default();
        let mut lost = track("7", "person", [10.0, 10.0, 50.0, 50.0]);
        lost.state = TrackState::Lost;

        let detections = vec![Detection::new("person", 0.9, [12.0, 12.0, 50.0, 50.0])];
        let result = GreedyIou.associate(&detections, &[], &[lost], &cfg);

        assert!(result.matches.is_empty());
        assert_eq!(result.revived, vec![(0, 0)]);
        assert!(result.unmatched_detections.is_empty());
    }

    #[test]
    fn one_detection_per_track_per_frame() {
        let cfg = TrackerConfig::default();
        let tracks = vec![track("1", "person", [0.0, 0.0, 50.0, 50.0])];
        let detections = vec![
            Detection::new("person", 0.9, [1.0, 1.0, 50.0, 50.0]),
            Detection::new("person", 0.8, [2.0, 2.0, 50.0, 50.0]),
        ];

        let result = GreedyIou.associate(&detections, &tracks, &[], &cfg);
        assert_eq!(result.matches, vec![(0, 0)]);
        // The second duplicate cannot steal the track by centroid rescue
        assert_eq!(result.unmatched_detections, vec![1]);
    }
}
