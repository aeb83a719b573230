// src/session.rs
//
// Drives one tracker over an injected detection stream. The host owns frame
// generation and the hang watchdog; this layer owns ordering, cancellation
// between frames, and end-of-stream accounting.

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::TrackerConfig;
use crate::tracker::Tracker;
use crate::types::{Frame, FrameResult};

/// Failure kinds surfaced to the host. The tracker core itself never fails;
/// per-frame anomalies are handled inline (malformed detections pass through
/// untracked).
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("no detection source supplied for session")]
    UpstreamUnavailable,

    #[error("session {session_id} saw no frame within {timeout_ms} ms")]
    SessionHung { session_id: String, timeout_ms: u64 },

    #[error("audio forwarder terminated: {0}")]
    ConnectionTerminated(String),
}

/// Handle the host keeps to end a running session. Cancellation is observed
/// strictly between frames; an in-flight update always runs to completion.
#[derive(Clone)]
pub struct SessionHandle {
    cancel: watch::Sender<bool>,
}

impl SessionHandle {
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionStats {
    pub frames_processed: u64,
    pub scene_changes: u64,
    pub cancelled: bool,
}

pub struct TrackerSession<S> {
    tracker: Tracker,
    source: S,
    cancelled: watch::Receiver<bool>,
}

impl<S> TrackerSession<S>
where
    S: Iterator<Item = Frame>,
{
    /// Build a session around a detector stream. A missing stream is a
    /// startup failure; a session never constructs without its upstream.
    pub fn new(
        config: TrackerConfig,
        source: Option<S>,
    ) -> Result<(Self, SessionHandle), TrackerError> {
        let source = source.ok_or(TrackerError::UpstreamUnavailable)?;
        let (cancel, cancelled) = watch::channel(false);
        Ok((
            Self {
                tracker: Tracker::new(config),
                source,
                cancelled,
            },
            SessionHandle { cancel },
        ))
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Pull frames until the stream ends or the host cancels, forwarding
    /// every `FrameResult` to the sink in frame order. A sink failure aborts
    /// the session; the host restarts it if it wants a retry.
    pub fn run<F>(mut self, mut sink: F) -> Result<SessionStats>
    where
        F: FnMut(FrameResult) -> Result<()>,
    {
        let session_id = self.tracker.state().session_id().to_string();
        let mut stats = SessionStats::default();

        loop {
            if *self.cancelled.borrow() {
                debug!(session = %session_id, "session cancelled");
                stats.cancelled = true;
                break;
            }
            let Some(frame) = self.source.next() else {
                break;
            };

            let result = self.tracker.update(&frame, false);
            stats.frames_processed += 1;
            if result.detection_id.is_some() {
                stats.scene_changes += 1;
            }
            sink(result).with_context(|| {
                format!(
                    "result sink failed at frame {} of session {session_id}",
                    stats.frames_processed - 1
                )
            })?;
        }

        info!(
            session = %session_id,
            frames = stats.frames_processed,
            scene_changes = stats.scene_changes,
            cancelled = stats.cancelled,
            "session finished"
        );
        Ok(stats)
    }
}
