//! Post-processing between a raw object detector and its consumers: turns a
//! noisy per-frame stream of class-scored boxes into stable, de-duplicated,
//! motion-aware tracked objects, and samples audio levels from the same
//! source.
//!
//! The host owns cameras, decoding, and inference; this crate consumes a
//! [`Frame`] of detections and produces a [`FrameResult`] per
//! [`Tracker::update`] call, plus [`AudioVolumes`] readings from the
//! [`LevelSampler`].

pub mod association;
pub mod audio;
pub mod config;
pub mod geometry;
pub mod prefilter;
pub mod scene_change;
pub mod session;
pub mod tracker;
pub mod types;

pub use association::{Associator, GreedyIou, MatrixAssignment};
pub use audio::{AudioSupervisor, LevelSampler};
pub use config::{ClassParams, MotionSentinelPolicy, TrackerConfig};
pub use session::{SessionHandle, SessionStats, TrackerError, TrackerSession};
pub use tracker::{SessionState, Tracker};
pub use types::{
    AudioVolumes, BoundingBox, Detection, DetectionHistory, Frame, FrameResult, Movement,
    TrackState, TrackedDetection, TrackedObject, MOTION_CLASS,
};
