// src/prefilter.rs
//
// Everything that runs before association, in a fixed order:
//   1. oversize rejection (detector whole-image false positives)
//   2. class / score filter
//   3. class-aware NMS
// Inputs are never mutated; survivors keep their fields untouched.

use crate::config::TrackerConfig;
use crate::geometry;
use crate::types::Detection;
use tracing::debug;

/// Box-to-image area ratio at which a detection is considered a whole-image
/// false positive.
const OVERSIZE_RATIO: f32 = 0.95;

#[derive(Debug, Clone, Default)]
pub struct PrefilterResult {
    /// Detections that survived all three stages, score order preserved only
    /// by NMS's own sort
    pub kept: Vec<Detection>,
    /// Untrackable inputs (reserved motion class, or no bounding box);
    /// excluded from tracking but passed through to the output unchanged
    pub passthrough: Vec<Detection>,
}

pub fn apply(
    detections: &[Detection],
    input_dimensions: [f32; 2],
    cfg: &TrackerConfig,
) -> PrefilterResult {
    let mut result = PrefilterResult::default();
    let image_area = input_dimensions[0] * input_dimensions[1];

    let mut candidates: Vec<&Detection> = Vec::with_capacity(detections.len());
    for det in detections {
        if det.is_untrackable() {
            result.passthrough.push(det.clone());
            continue;
        }
        let bbox = det.bounding_box.unwrap();

        if image_area > 0.0 && (bbox[2] * bbox[3]) / image_area >= OVERSIZE_RATIO {
            debug!(
                class = %det.class_name,
                ratio = (bbox[2] * bbox[3]) / image_area,
                "dropping oversized detection"
            );
            continue;
        }

        if !cfg.class_enabled(&det.class_name) {
            continue;
        }
        if det.score < cfg.params_for(&det.class_name).min_score {
            continue;
        }
        candidates.push(det);
    }

    result.kept = nms(&candidates, cfg);
    result
}

/// Non-maximum suppression, per class. Highest score wins; later same-class
/// boxes overlapping it past the class IoU threshold are discarded.
/// Detections of different classes never suppress each other.
fn nms(candidates: &[&Detection], cfg: &TrackerConfig) -> Vec<Detection> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    // Stable sort: ties keep detector order
    order.sort_by(|&a, &b| {
        candidates[b]
            .score
            .partial_cmp(&candidates[a].score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len());
    let mut suppressed = vec![false; candidates.len()];

    for (rank, &idx) in order.iter().enumerate() {
        if suppressed[idx] {
            continue;
        }
        let head = candidates[idx];
        let head_box = head.bounding_box.unwrap();
        let threshold = cfg.params_for(&head.class_name).iou_threshold;

        for &other in &order[rank + 1..] {
            if suppressed[other] {
                continue;
            }
            let candidate = candidates[other];
            if candidate.class_name != head.class_name {
                continue;
            }
            let overlap = geometry::iou(&head_box, &candidate.bounding_box.unwrap());
            if overlap > threshold {
                suppressed[other] = true;
            }
        }
        kept.push(head.clone());
    }
    kept
}
