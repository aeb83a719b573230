// src/config.rs
//
// Tracker construction config plus the loosely-typed `settings` overlay the
// host passes through from its UI. Settings are re-read on every update, so
// edits between frames take effect on the next one.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Per-class tracking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassParams {
    /// Score floor; detections below it never reach association
    pub min_score: f32,
    /// Consecutive hits required to confirm a track
    pub min_confirmation_frames: u32,
    /// Shared by NMS, association, and lost-track re-acquisition
    pub iou_threshold: f32,
    /// Centroid shift in input pixels that counts as movement
    pub movement_threshold: f32,
}

impl Default for ClassParams {
    fn default() -> Self {
        Self {
            min_score: 0.7,
            min_confirmation_frames: 3,
            iou_threshold: 0.5,
            movement_threshold: 10.0,
        }
    }
}

/// How motion sentinels are appended to `FrameResult::active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MotionSentinelPolicy {
    /// One sentinel per boxed active detection; a single bare sentinel when
    /// there are none
    #[default]
    PerBox,
    /// Always exactly one bare sentinel
    SingleBare,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerConfig {
    /// Consecutive unassociated frames before a confirmed track goes to the
    /// lost pool
    pub max_misses: u32,
    /// Miss budget for pending tracks; exhausting it drops the track outright
    pub max_empty_frames: u32,
    /// Frames a lost track waits for re-acquisition before permanent eviction
    pub max_lost_frames: u32,
    /// Select the global-assignment engine instead of greedy IoU
    pub use_matrix: bool,
    pub class_defaults: ClassParams,
    /// Classes eligible for tracking; everything else is dropped up front
    pub enabled_classes: HashSet<String>,
    pub motion_sentinels: MotionSentinelPolicy,
    /// Host settings overlay; recognized keys override the fields above
    pub settings: HashMap<String, Value>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_misses: 5,
            max_empty_frames: 3,
            max_lost_frames: 40,
            use_matrix: false,
            class_defaults: ClassParams::default(),
            enabled_classes: ["person", "vehicle", "animal"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            motion_sentinels: MotionSentinelPolicy::default(),
            settings: HashMap::new(),
        }
    }
}

impl TrackerConfig {
    /// Resolve the effective parameters for a class: defaults overridden by
    /// any `{class}-*` settings keys.
    pub fn params_for(&self, class_name: &str) -> ClassParams {
        let mut params = self.class_defaults;
        if let Some(v) = self.setting_f32(&format!("{class_name}-minScore")) {
            params.min_score = v;
        }
        if let Some(v) = self.setting_u32(&format!("{class_name}-minConfirmationFrames")) {
            params.min_confirmation_frames = v;
        }
        if let Some(v) = self.setting_f32(&format!("{class_name}-iouThreshold")) {
            params.iou_threshold = v;
        }
        if let Some(v) = self.setting_f32(&format!("{class_name}-movementThreshold")) {
            params.movement_threshold = v;
        }
        params
    }

    /// Is this class eligible for tracking? An `enabledClasses` settings key
    /// overrides the construction-time set.
    pub fn class_enabled(&self, class_name: &str) -> bool {
        if let Some(Value::Array(classes)) = self.settings.get("enabledClasses") {
            return classes.iter().any(|c| c.as_str() == Some(class_name));
        }
        self.enabled_classes.contains(class_name)
    }

    /// The `basicDetectionsOnly` settings switch: pre-filter only, no
    /// lifecycle, no ids.
    pub fn basic_detections_only(&self) -> bool {
        self.setting_bool("basicDetectionsOnly").unwrap_or(false)
    }

    // Host UIs deliver numbers as JSON numbers or as strings; accept both.
    fn setting_f32(&self, key: &str) -> Option<f32> {
        match self.settings.get(key)? {
            Value::Number(n) => n.as_f64().map(|v| v as f32),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn setting_u32(&self, key: &str) -> Option<u32> {
        match self.settings.get(key)? {
            Value::Number(n) => n.as_u64().map(|v| v as u32),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn setting_bool(&self, key: &str) -> Option<bool> {
        match self.settings.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = TrackerConfig::default();
        assert_eq!(cfg.max_misses, 5);
        assert_eq!(cfg.max_empty_frames, 3);
        assert_eq!(cfg.class_defaults.min_score, 0.7);
        assert_eq!(cfg.class_defaults.min_confirmation_frames, 3);
        assert_eq!(cfg.class_defaults.iou_threshold, 0.5);
        assert_eq!(cfg.class_defaults.movement_threshold, 10.0);
    }

    #[test]
    fn per_class_settings_override_defaults() {
        let mut cfg = TrackerConfig::default();
        cfg.settings
            .insert("person-minScore".into(), json!(0.35));
        cfg.settings
            .insert("person-minConfirmationFrames".into(), json!(1));

        let person = cfg.params_for("person");
        assert_eq!(person.min_score, 0.35);
        assert_eq!(person.min_confirmation_frames, 1);
        // Untouched values fall back to defaults
        assert_eq!(person.iou_threshold, 0.5);

        let vehicle = cfg.params_for("vehicle");
        assert_eq!(vehicle.min_score, 0.7);
    }

    #[test]
    fn stringly_typed_settings_are_parsed() {
        let mut cfg = TrackerConfig::default();
        cfg.settings
            .insert("person-movementThreshold".into(), json!("25"));
        cfg.settings
            .insert("basicDetectionsOnly".into(), json!("true"));

        assert_eq!(cfg.params_for("person").movement_threshold, 25.0);
        assert!(cfg.basic_detections_only());
    }

    #[test]
    fn enabled_classes_setting_overrides_construction_set() {
        let mut cfg = TrackerConfig::default();
        assert!(cfg.class_enabled("person"));
        assert!(!cfg.class_enabled("bicycle"));

        cfg.settings
            .insert("enabledClasses".into(), json!(["bicycle"]));
        assert!(cfg.class_enabled("bicycle"));
        assert!(!cfg.class_enabled("person"));
    }
}
