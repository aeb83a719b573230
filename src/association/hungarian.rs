// src/association/hungarian.rs
//
// Global assignment: minimize total (1 - IoU) cost over the whole frame,
// which is the same as maximizing total IoU. Class and threshold filtering
// happen after the solve, so a globally optimal pairing can still be
// discarded pair by pair. Lost-track re-acquisition is not performed here.

use super::{AssignmentResult, Associator};
use crate::config::TrackerConfig;
use crate::geometry;
use crate::types::{Detection, TrackedObject};
use pathfinding::matrix::Matrix;
use pathfinding::prelude::kuhn_munkres;

/// Fixed-point scale for IoU weights; kuhn_munkres wants integers.
const WEIGHT_SCALE: f32 = 10_000.0;

pub struct MatrixAssignment;

impl Associator for MatrixAssignment {
    fn associate(
        &self,
        detections: &[Detection],
        tracks: &[TrackedObject],
        _lost_tracks: &[TrackedObject],
        cfg: &TrackerConfig,
    ) -> AssignmentResult {
        let num_dets = detections.len();
        let num_tracks = tracks.len();

        if num_dets == 0 || num_tracks == 0 {
            return AssignmentResult {
                unmatched_detections: (0..num_dets).collect(),
                ..Default::default()
            };
        }

        // Square matrix padded with zero-weight dummy pairings so every row
        // gets an assignment
        let size = num_dets.max(num_tracks);
        let mut weights: Matrix<i64> = Matrix::new(size, size, 0);
        for (i, det) in detections.iter().enumerate() {
            let Some(det_box) = det.bounding_box else {
                continue;
            };
            for (j, track) in tracks.iter().enumerate() {
                if let Some(track_box) = track.detection.bounding_box {
                    weights[(i, j)] =
                        (geometry::iou(&det_box, &track_box) * WEIGHT_SCALE) as i64;
                }
            }
        }

        let (_total, assignment) = kuhn_munkres(&weights);

        let mut result = AssignmentResult::default();
        for (det_idx, det) in detections.iter().enumerate() {
            let track_idx = assignment[det_idx];
            if track_idx >= num_tracks {
                result.unmatched_detections.push(det_idx);
                continue;
            }
            let track = &tracks[track_idx];
            let threshold = cfg.params_for(&det.class_name).iou_threshold;
            let overlap = match (det.bounding_box, track.detection.bounding_box) {
                (Some(a), Some(b)) => geometry::iou(&a, &b),
                _ => 0.0,
            };
            // Discard pairs the matrix allowed but the contract forbids
            if det.class_name != track.detection.class_name || overlap <= threshold {
                result.unmatched_detections.push(det_idx);
                continue;
            }
            result.matches.push((det_idx, track_idx));
        }

        result
    }
}
