// src/scene_change.rs
//
// Coarse "the scene meaningfully changed" notifications. Downstream
// consumers key recordings and thumbnails off the emitted token, so it must
// change on confirmations and disappearances but stay stable while the same
// objects are just moving around.

use std::collections::HashSet;
use tracing::info;

/// Quiet interval after which a fresh token is emitted anyway, as long as
/// something is still confirmed. Keeps long-lived scenes from pinning one
/// token forever.
pub const REFRESH_INTERVAL_MS: f64 = 5_000.0;

#[derive(Debug, Default)]
pub struct SceneChange {
    /// Ids confirmed on the previous frame
    last_active_ids: HashSet<String>,
    /// Timestamp of the last emitted token, in milliseconds
    last_emitted_at: Option<f64>,
}

impl SceneChange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare this frame's confirmed set against the previous frame's and
    /// emit a fresh `"{session}-{frame}"` token if the scene changed.
    pub fn observe(
        &mut self,
        session_id: &str,
        current_frame: u64,
        active_ids: &HashSet<String>,
        newly_confirmed: &[String],
        now: f64,
    ) -> Option<String> {
        let confirmed = !newly_confirmed.is_empty();
        let first_appearance = self.last_active_ids.is_empty() && !active_ids.is_empty();
        let disappeared = self
            .last_active_ids
            .iter()
            .any(|id| !active_ids.contains(id));
        let stale = !active_ids.is_empty()
            && self
                .last_emitted_at
                .map_or(false, |at| now - at > REFRESH_INTERVAL_MS);

        let token = if confirmed || first_appearance || disappeared || stale {
            let token = format!("{session_id}-{current_frame}");
            info!(
                detection_id = %token,
                confirmed,
                disappeared,
                stale,
                "scene change"
            );
            self.last_emitted_at = Some(now);
            Some(token)
        } else {
            None
        };

        self.last_active_ids = active_ids.clone();
        token
    }
}
