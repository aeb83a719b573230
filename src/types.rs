// src/types.rs

use serde::{Deserialize, Serialize};

/// Reserved class name for motion pseudo-detections. Detections carrying it
/// are never tracked; the tracker appends its own sentinels on output.
pub const MOTION_CLASS: &str = "motion";

// ============================================================================
// Bounding boxes
// ============================================================================

/// Axis-aligned box in input-image coordinates, `[x, y, w, h]` with
/// `w > 0`, `h > 0`.
pub type BoundingBox = [f32; 4];

// ============================================================================
// Detections (input)
// ============================================================================

/// One class-scored box reported by the upstream detector for a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub class_name: String,
    /// Detector confidence in [0, 1]
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<DetectionHistory>,
}

impl Detection {
    pub fn new(class_name: impl Into<String>, score: f32, bounding_box: BoundingBox) -> Self {
        Self {
            class_name: class_name.into(),
            score,
            bounding_box: Some(bounding_box),
            label: None,
            history: None,
        }
    }

    /// A detection the tracker must not associate: the reserved motion class,
    /// or a detection with no box to match against.
    pub fn is_untrackable(&self) -> bool {
        self.class_name == MOTION_CLASS || self.bounding_box.is_none()
    }
}

/// First/last sighting timestamps carried through from the detector, in
/// milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionHistory {
    pub first_seen: f64,
    pub last_seen: f64,
}

// ============================================================================
// Frames
// ============================================================================

/// One frame of detector output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub detections: Vec<Detection>,
    /// `[width, height]` of the detector's input image, in pixels
    pub input_dimensions: [f32; 2],
    /// Capture timestamp in milliseconds. Optional; the tracker falls back
    /// to wall clock when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

// ============================================================================
// Tracks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackState {
    /// Seen, but not yet confirmed by enough consecutive hits
    Pending,
    /// Confirmed; reported in `FrameResult::active`
    Active,
    /// Dropped from the active set; held for re-acquisition
    Lost,
}

impl TrackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackState::Pending => "PENDING",
            TrackState::Active => "ACTIVE",
            TrackState::Lost => "LOST",
        }
    }
}

impl std::fmt::Display for TrackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-track movement classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    /// Timestamp of the frame that created the track, in milliseconds
    pub first_seen: f64,
    /// Timestamp of the most recent associated frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<f64>,
    /// Whether the centroid shifted past the class movement threshold on the
    /// most recent associated frame
    pub moving: bool,
}

impl Movement {
    pub fn starting_at(now: f64) -> Self {
        Self {
            first_seen: now,
            last_seen: None,
            moving: false,
        }
    }
}

/// A persistent identity across frames, believed to correspond to one
/// physical object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedObject {
    /// Short opaque id, unique within a session, never reused
    pub id: String,
    #[serde(flatten)]
    pub detection: Detection,
    pub state: TrackState,
    /// Consecutive frames with an association
    pub hits: u32,
    /// Consecutive frames without one, while in the active set
    pub misses: u32,
    /// Consecutive frames spent in the lost pool
    pub lost_frames: u32,
    pub movement: Movement,
}

impl TrackedObject {
    pub fn centroid(&self) -> Option<(f32, f32)> {
        self.detection
            .bounding_box
            .map(|b| crate::geometry::centroid(&b))
    }
}

// ============================================================================
// Frame results (output)
// ============================================================================

/// One entry of a `FrameResult`: a detection augmented with track identity
/// and movement once confirmed. Motion sentinels carry `className: "motion"`,
/// `score: 1` and no id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedDetection {
    pub class_name: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<DetectionHistory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement: Option<Movement>,
}

impl TrackedDetection {
    /// A detection passed through without track identity (basic mode,
    /// malformed inputs).
    pub fn passthrough(det: Detection) -> Self {
        Self {
            class_name: det.class_name,
            score: det.score,
            bounding_box: det.bounding_box,
            label: det.label,
            history: det.history,
            id: None,
            movement: None,
        }
    }

    pub fn motion_sentinel(bounding_box: Option<BoundingBox>) -> Self {
        Self {
            class_name: MOTION_CLASS.to_string(),
            score: 1.0,
            bounding_box,
            label: None,
            history: None,
            id: None,
            movement: None,
        }
    }

    pub fn is_motion(&self) -> bool {
        self.class_name == MOTION_CLASS
    }
}

impl From<&TrackedObject> for TrackedDetection {
    fn from(track: &TrackedObject) -> Self {
        // Downstream always gets a history on reported tracks: the one the
        // detector supplied, else one synthesized from movement timestamps.
        let history = track.detection.history.or(Some(DetectionHistory {
            first_seen: track.movement.first_seen,
            last_seen: track
                .movement
                .last_seen
                .unwrap_or(track.movement.first_seen),
        }));
        Self {
            class_name: track.detection.class_name.clone(),
            score: track.detection.score,
            bounding_box: track.detection.bounding_box,
            label: track.detection.label.clone(),
            history,
            id: Some(track.id.clone()),
            movement: Some(track.movement),
        }
    }
}

/// Output of one `Tracker::update` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameResult {
    /// Confirmed tracks, untracked passthroughs, then motion sentinels
    pub active: Vec<TrackedDetection>,
    /// Tracks still awaiting confirmation
    pub pending: Vec<TrackedDetection>,
    /// Fresh scene-change token, present only when the confirmed set changed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_id: Option<String>,
}

// ============================================================================
// Audio
// ============================================================================

/// Windowed audio level statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioVolumes {
    /// Log-domain mean level over the sampling window
    #[serde(rename = "dBFS")]
    pub dbfs: f64,
    /// Arithmetic standard deviation of the per-packet levels
    #[serde(rename = "dbStdDev")]
    pub db_std_dev: f64,
}
