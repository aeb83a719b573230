// src/tracker.rs
//
// Per-session object tracker: turns the noisy per-frame detection stream
// into stable identities with confirmed/pending/lost lifecycles, movement
// flags, and scene-change tokens. One instance per source; `update` is
// synchronous and mutates the session state exactly once per call.

use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::association::{self, Associator};
use crate::config::{MotionSentinelPolicy, TrackerConfig};
use crate::geometry;
use crate::prefilter::{self, PrefilterResult};
use crate::scene_change::SceneChange;
use crate::types::{
    Detection, Frame, FrameResult, Movement, TrackState, TrackedDetection, TrackedObject,
};

/// Track ids are base-36 renderings of a monotonic counter, so they stay
/// short in overlays and logs while still ordering by creation.
fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(DIGITS[(n % 36) as usize] as char);
        n /= 36;
    }
    digits.iter().rev().collect()
}

fn wall_clock_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

// ============================================================================
// Session state
// ============================================================================

/// Everything tied to the lifetime of one stream from one source.
#[derive(Debug)]
pub struct SessionState {
    session_id: String,
    current_frame: u64,
    tracks: Vec<TrackedObject>,
    lost_tracks: Vec<TrackedObject>,
    scene: SceneChange,
    next_track_id: u64,
}

impl SessionState {
    fn new() -> Self {
        Self {
            session_id: format!("{:04x}", rand::random::<u16>()),
            current_frame: 0,
            tracks: Vec::new(),
            lost_tracks: Vec::new(),
            scene: SceneChange::new(),
            next_track_id: 1,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    /// Pending and active tracks, in insertion order.
    pub fn tracks(&self) -> &[TrackedObject] {
        &self.tracks
    }

    /// Tracks held for re-acquisition. Disjoint from `tracks` at all times.
    pub fn lost_tracks(&self) -> &[TrackedObject] {
        &self.lost_tracks
    }
}

// ============================================================================
// Tracker
// ============================================================================

pub struct Tracker {
    config: TrackerConfig,
    associator: Box<dyn Associator>,
    state: SessionState,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        let associator = association::for_config(&config);
        let state = SessionState::new();
        info!(
            session = %state.session_id,
            matrix = config.use_matrix,
            "tracker session started"
        );
        Self {
            config,
            associator,
            state,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Live configuration. Settings edits between calls take effect on the
    /// next `update`.
    pub fn config_mut(&mut self) -> &mut TrackerConfig {
        &mut self.config
    }

    /// Process one frame of detector output.
    ///
    /// With `basic_only` (or the `basicDetectionsOnly` setting) the frame
    /// only passes the pre-filter: no association, no lifecycle, no ids.
    pub fn update(&mut self, frame: &Frame, basic_only: bool) -> FrameResult {
        let now = frame.timestamp.unwrap_or_else(wall_clock_ms);
        let filtered = prefilter::apply(&frame.detections, frame.input_dimensions, &self.config);

        let result = if basic_only || self.config.basic_detections_only() {
            self.basic_result(filtered)
        } else {
            self.tracked_result(filtered, now)
        };

        self.state.current_frame += 1;
        result
    }

    /// Pre-filter output only, augmented with motion entries.
    fn basic_result(&self, filtered: PrefilterResult) -> FrameResult {
        let motion = motion_entries(&filtered.kept, self.config.motion_sentinels);
        let mut active: Vec<TrackedDetection> = filtered
            .kept
            .into_iter()
            .map(TrackedDetection::passthrough)
            .collect();
        active.extend(
            filtered
                .passthrough
                .into_iter()
                .map(TrackedDetection::passthrough),
        );
        active.extend(motion);
        FrameResult {
            active,
            pending: Vec::new(),
            detection_id: None,
        }
    }

    fn tracked_result(&mut self, filtered: PrefilterResult, now: f64) -> FrameResult {
        let assignment = self.associator.associate(
            &filtered.kept,
            &self.state.tracks,
            &self.state.lost_tracks,
            &self.config,
        );

        // Matched detection per active-set track index
        let mut matched_det: HashMap<usize, usize> = assignment
            .matches
            .iter()
            .map(|&(det_idx, track_idx)| (track_idx, det_idx))
            .collect();

        // Re-acquisitions first: pull the track out of the lost pool and
        // append it to the active set so the lifecycle pass below treats it
        // like any other associated track. Highest index first so removal
        // does not shift the remaining ones.
        let mut revivals = assignment.revived.clone();
        revivals.sort_by(|a, b| b.1.cmp(&a.1));
        for (det_idx, lost_idx) in revivals {
            let mut track = self.state.lost_tracks.remove(lost_idx);
            track.state = TrackState::Pending;
            track.lost_frames = 0;
            matched_det.insert(self.state.tracks.len(), det_idx);
            self.state.tracks.push(track);
        }

        // Lifecycle pass over the active set
        let mut survivors: Vec<TrackedObject> = Vec::with_capacity(self.state.tracks.len());
        let mut to_lost: Vec<TrackedObject> = Vec::new();
        let mut newly_confirmed: Vec<String> = Vec::new();

        for (track_idx, mut track) in self.state.tracks.drain(..).enumerate() {
            match matched_det.get(&track_idx) {
                Some(&det_idx) => {
                    let det = &filtered.kept[det_idx];
                    let params = self.config.params_for(&det.class_name);

                    let prev_centroid = track.centroid();
                    track.detection.bounding_box = det.bounding_box;
                    track.detection.class_name = det.class_name.clone();
                    track.detection.label = det.label.clone();
                    track.detection.score = det.score;
                    track.hits += 1;
                    track.misses = 0;

                    let new_centroid = det.bounding_box.map(|b| geometry::centroid(&b));
                    track.movement.moving = match (prev_centroid, new_centroid) {
                        (Some(p), Some(q)) => {
                            geometry::distance(p, q) >= params.movement_threshold
                        }
                        _ => false,
                    };
                    track.movement.last_seen = Some(now);

                    if track.state == TrackState::Pending
                        && track.hits >= params.min_confirmation_frames
                    {
                        track.state = TrackState::Active;
                        info!(
                            track = %track.id,
                            class = %track.detection.class_name,
                            hits = track.hits,
                            "track confirmed"
                        );
                        newly_confirmed.push(track.id.clone());
                    }
                    survivors.push(track);
                }
                None => {
                    track.misses += 1;
                    track.movement.moving = false;
                    match track.state {
                        // Unconfirmed tracks don't earn a spot in the lost
                        // pool; they expire on a short miss budget
                        TrackState::Pending if track.misses >= self.config.max_empty_frames => {
                            debug!(track = %track.id, "dropping unconfirmed track");
                        }
                        TrackState::Active if track.misses >= self.config.max_misses => {
                            debug!(
                                track = %track.id,
                                misses = track.misses,
                                "track lost, holding for re-acquisition"
                            );
                            track.state = TrackState::Lost;
                            track.lost_frames = 0;
                            to_lost.push(track);
                        }
                        _ => survivors.push(track),
                    }
                }
            }
        }

        // Age the lost pool; revived tracks were already removed above
        let max_lost = self.config.max_lost_frames;
        self.state.lost_tracks.retain_mut(|track| {
            track.lost_frames += 1;
            if track.lost_frames > max_lost {
                debug!(track = %track.id, "evicting lost track");
                false
            } else {
                true
            }
        });
        self.state.lost_tracks.extend(to_lost);

        // New tracks for everything unmatched
        for &det_idx in &assignment.unmatched_detections {
            let det = filtered.kept[det_idx].clone();
            let params = self.config.params_for(&det.class_name);
            let id = to_base36(self.state.next_track_id);
            self.state.next_track_id += 1;

            let mut track = TrackedObject {
                id: id.clone(),
                detection: det,
                state: TrackState::Pending,
                hits: 1,
                misses: 0,
                lost_frames: 0,
                movement: Movement::starting_at(now),
            };
            debug!(
                track = %track.id,
                class = %track.detection.class_name,
                "new track"
            );
            // A confirmation threshold of 0 or 1 confirms on sight
            if params.min_confirmation_frames <= 1 {
                track.state = TrackState::Active;
                newly_confirmed.push(id);
            }
            survivors.push(track);
        }

        self.state.tracks = survivors;

        let active_ids: HashSet<String> = self
            .state
            .tracks
            .iter()
            .filter(|t| t.state == TrackState::Active)
            .map(|t| t.id.clone())
            .collect();
        let detection_id = self.state.scene.observe(
            &self.state.session_id,
            self.state.current_frame,
            &active_ids,
            &newly_confirmed,
            now,
        );

        // Result assembly: confirmed tracks, untracked passthroughs, motion
        // entries mirroring this frame's surviving detections
        let mut active: Vec<TrackedDetection> = self
            .state
            .tracks
            .iter()
            .filter(|t| t.state == TrackState::Active)
            .map(TrackedDetection::from)
            .collect();
        active.extend(
            filtered
                .passthrough
                .into_iter()
                .map(TrackedDetection::passthrough),
        );
        active.extend(motion_entries(&filtered.kept, self.config.motion_sentinels));

        let pending: Vec<TrackedDetection> = self
            .state
            .tracks
            .iter()
            .filter(|t| t.state == TrackState::Pending)
            .map(TrackedDetection::from)
            .collect();

        FrameResult {
            active,
            pending,
            detection_id,
        }
    }
}

/// Motion pseudo-detections for downstream motion consumers: one per
/// surviving detection box, or a single bare sentinel when the frame kept
/// nothing.
fn motion_entries(kept: &[Detection], policy: MotionSentinelPolicy) -> Vec<TrackedDetection> {
    match policy {
        MotionSentinelPolicy::SingleBare => vec![TrackedDetection::motion_sentinel(None)],
        MotionSentinelPolicy::PerBox => {
            let boxed: Vec<TrackedDetection> = kept
                .iter()
                .filter_map(|d| d.bounding_box)
                .map(|b| TrackedDetection::motion_sentinel(Some(b)))
                .collect();
            if boxed.is_empty() {
                vec![TrackedDetection::motion_sentinel(None)]
            } else {
                boxed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(detections: Vec<Detection>, ts: f64) -> Frame {
        Frame {
            detections,
            input_dimensions: [1000.0, 1000.0],
            timestamp: Some(ts),
        }
    }

    fn person(bbox: [f32; 4]) -> Detection {
        Detection::new("person", 0.9, bbox)
    }

    #[test]
    fn base36_rendering() {
        assert_eq!(to_base36(1), "1");
        assert_eq!(to_base36(10), "a");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn track_ids_are_monotonic_and_never_reused() {
        let mut tracker = Tracker::new(TrackerConfig::default());
        tracker.update(&frame(vec![person([0.0, 0.0, 50.0, 50.0])], 0.0), false);
        tracker.update(
            &frame(vec![person([500.0, 500.0, 50.0, 50.0])], 33.0),
            false,
        );

        let ids: Vec<_> = tracker.state().tracks().iter().map(|t| &t.id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn active_and_lost_pools_stay_disjoint() {
        let mut tracker = Tracker::new(TrackerConfig::default());
        let det = person([10.0, 10.0, 50.0, 50.0]);

        // Confirm, lose, and re-acquire while checking the invariant
        for i in 0..3 {
            tracker.update(&frame(vec![det.clone()], i as f64 * 33.0), false);
        }
        for i in 3..10 {
            tracker.update(&frame(vec![], i as f64 * 33.0), false);
        }
        tracker.update(&frame(vec![det], 400.0), false);

        let active: HashSet<_> = tracker.state().tracks().iter().map(|t| &t.id).collect();
        let lost: HashSet<_> = tracker
            .state()
            .lost_tracks()
            .iter()
            .map(|t| &t.id)
            .collect();
        assert!(active.is_disjoint(&lost));
    }

    #[test]
    fn pending_track_is_dropped_after_empty_frame_budget() {
        let mut tracker = Tracker::new(TrackerConfig::default());
        tracker.update(&frame(vec![person([10.0, 10.0, 50.0, 50.0])], 0.0), false);
        assert_eq!(tracker.state().tracks().len(), 1);

        // max_empty_frames = 3: three misses and the unconfirmed track is gone
        for i in 1..=3 {
            tracker.update(&frame(vec![], i as f64 * 33.0), false);
        }
        assert!(tracker.state().tracks().is_empty());
        assert!(tracker.state().lost_tracks().is_empty());
    }

    #[test]
    fn zero_confirmation_threshold_confirms_on_sight() {
        let mut config = TrackerConfig::default();
        config
            .settings
            .insert("person-minConfirmationFrames".into(), json!(0));
        let mut tracker = Tracker::new(config);

        let result = tracker.update(&frame(vec![person([10.0, 10.0, 50.0, 50.0])], 0.0), false);
        assert_eq!(result.pending.len(), 0);
        assert_eq!(
            result.active.iter().filter(|d| !d.is_motion()).count(),
            1
        );
        assert!(result.detection_id.is_some());
    }

    #[test]
    fn confirmation_is_sticky() {
        let mut tracker = Tracker::new(TrackerConfig::default());
        let det = person([10.0, 10.0, 50.0, 50.0]);
        for i in 0..3 {
            tracker.update(&frame(vec![det.clone()], i as f64 * 33.0), false);
        }
        assert_eq!(tracker.state().tracks()[0].state, TrackState::Active);

        // Misses below the budget and further hits never regress the state
        tracker.update(&frame(vec![], 100.0), false);
        assert_eq!(tracker.state().tracks()[0].state, TrackState::Active);
        tracker.update(&frame(vec![det], 133.0), false);
        assert_eq!(tracker.state().tracks()[0].state, TrackState::Active);
    }

    #[test]
    fn settings_change_applies_on_next_update() {
        let mut tracker = Tracker::new(TrackerConfig::default());
        let low_score = Detection::new("person", 0.4, [10.0, 10.0, 50.0, 50.0]);

        let result = tracker.update(&frame(vec![low_score.clone()], 0.0), false);
        assert!(result.pending.is_empty());

        tracker
            .config_mut()
            .settings
            .insert("person-minScore".into(), json!(0.3));
        let result = tracker.update(&frame(vec![low_score], 33.0), false);
        assert_eq!(result.pending.len(), 1);
    }

    #[test]
    fn basic_mode_bypasses_lifecycle() {
        let mut tracker = Tracker::new(TrackerConfig::default());
        let result = tracker.update(&frame(vec![person([10.0, 10.0, 50.0, 50.0])], 0.0), true);

        assert!(result.detection_id.is_none());
        assert!(result.pending.is_empty());
        assert!(tracker.state().tracks().is_empty());
        // Pre-filter output plus its motion mirror
        assert_eq!(result.active.len(), 2);
        assert_eq!(result.active[1].class_name, "motion");
        assert_eq!(
            result.active[1].bounding_box,
            Some([10.0, 10.0, 50.0, 50.0])
        );
    }

    #[test]
    fn basic_mode_via_settings_key() {
        let mut config = TrackerConfig::default();
        config
            .settings
            .insert("basicDetectionsOnly".into(), json!(true));
        let mut tracker = Tracker::new(config);

        let result = tracker.update(&frame(vec![person([10.0, 10.0, 50.0, 50.0])], 0.0), false);
        assert!(result.pending.is_empty());
        assert!(tracker.state().tracks().is_empty());
    }

    #[test]
    fn frame_counter_increments_once_per_call() {
        let mut tracker = Tracker::new(TrackerConfig::default());
        assert_eq!(tracker.state().current_frame(), 0);
        tracker.update(&frame(vec![], 0.0), false);
        tracker.update(&frame(vec![person([0.0, 0.0, 10.0, 10.0])], 33.0), true);
        assert_eq!(tracker.state().current_frame(), 2);
    }

    #[test]
    fn single_bare_sentinel_policy() {
        let mut config = TrackerConfig::default();
        config.motion_sentinels = MotionSentinelPolicy::SingleBare;
        let mut tracker = Tracker::new(config);

        let result = tracker.update(
            &frame(
                vec![
                    person([10.0, 10.0, 50.0, 50.0]),
                    person([500.0, 500.0, 50.0, 50.0]),
                ],
                0.0,
            ),
            false,
        );
        let sentinels: Vec<_> = result.active.iter().filter(|d| d.is_motion()).collect();
        assert_eq!(sentinels.len(), 1);
        assert_eq!(sentinels[0].bounding_box, None);
    }
}
