// src/audio/supervisor.rs
//
// Long-lived audio connections degrade quietly (stalled RTP, half-open
// sockets), so the forwarder feeding the sampler is torn down and rebuilt on
// a timer. A generation sentinel keeps restarts from overlapping: a
// forwarder's completion only clears the slot if that forwarder is still the
// current one.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::session::TrackerError;

pub const DEFAULT_RESTART_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Handed to each spawned forwarder. Dropping it (normally, by the forwarder
/// task finishing) reports the termination back to the supervisor.
pub struct ForwarderContext {
    /// Flips to true when the supervisor wants this forwarder gone
    pub shutdown: watch::Receiver<bool>,
    _done: DoneGuard,
}

struct DoneGuard {
    generation: u64,
    tx: mpsc::UnboundedSender<u64>,
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(self.generation);
    }
}

struct ActiveForwarder {
    generation: u64,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct AudioSupervisor {
    restart_interval: Duration,
    next_generation: u64,
    current: Option<ActiveForwarder>,
    done_tx: mpsc::UnboundedSender<u64>,
    done_rx: mpsc::UnboundedReceiver<u64>,
}

impl Default for AudioSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_RESTART_INTERVAL)
    }
}

impl AudioSupervisor {
    pub fn new(restart_interval: Duration) -> Self {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        Self {
            restart_interval,
            next_generation: 0,
            current: None,
            done_tx,
            done_rx,
        }
    }

    /// Supervise forwarders spawned by `spawn` until cancelled. Restarts on
    /// the configured interval; a forwarder dying on its own just clears the
    /// slot and waits for the next tick.
    pub async fn run<F>(mut self, mut spawn: F, mut cancel: watch::Receiver<bool>)
    where
        F: FnMut(ForwarderContext) -> JoinHandle<()>,
    {
        self.restart(&mut spawn).await;

        let mut ticks = tokio::time::interval(self.restart_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticks.tick().await; // the interval's immediate first tick

        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    info!("restarting audio forwarder");
                    self.restart(&mut spawn).await;
                }
                Some(generation) = self.done_rx.recv() => {
                    if self.current.as_ref().map(|f| f.generation) == Some(generation) {
                        let err = TrackerError::ConnectionTerminated(format!(
                            "forwarder generation {generation}"
                        ));
                        warn!(%err, "waiting for the next supervisory tick");
                        self.current = None;
                    }
                    // Stale generations are completions of forwarders we
                    // already replaced; nothing to do
                }
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        self.stop_current().await;
                        break;
                    }
                }
            }
        }
        debug!("audio supervisor stopped");
    }

    async fn restart<F>(&mut self, spawn: &mut F)
    where
        F: FnMut(ForwarderContext) -> JoinHandle<()>,
    {
        // Stop-then-start, awaiting termination so two forwarders never
        // share the source connection
        self.stop_current().await;

        self.next_generation += 1;
        let generation = self.next_generation;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = spawn(ForwarderContext {
            shutdown: shutdown_rx,
            _done: DoneGuard {
                generation,
                tx: self.done_tx.clone(),
            },
        });
        debug!(generation, "audio forwarder started");
        self.current = Some(ActiveForwarder {
            generation,
            shutdown: shutdown_tx,
            task,
        });
    }

    async fn stop_current(&mut self) {
        if let Some(forwarder) = self.current.take() {
            let _ = forwarder.shutdown.send(true);
            let _ = forwarder.task.await;
        }
    }
}
