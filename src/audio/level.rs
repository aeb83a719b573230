// src/audio/level.rs
//
// RTP audio level sampling: 8 kHz mono 8-bit PCM payloads in, windowed
// dBFS statistics out. Per-packet levels collect in a wall-clock window;
// the window's mean is computed in the power domain so loud bursts are not
// averaged away.

use std::time::{Duration, Instant};
use tracing::debug;

use crate::types::AudioVolumes;

/// Fixed RTP header size; packets at or under it carry no samples.
const RTP_HEADER_LEN: usize = 12;

/// Levels below this RMS are clamped, putting the silence floor at -100 dBFS.
const RMS_FLOOR: f64 = 1e-5;

/// dBFS of one packet's payload.
pub fn payload_dbfs(payload: &[u8]) -> f64 {
    let sum_sq: f64 = payload
        .iter()
        .map(|&b| {
            let s = (b as f64 - 128.0) / 128.0;
            s * s
        })
        .sum();
    let rms = (sum_sq / payload.len() as f64).sqrt();
    20.0 * rms.max(RMS_FLOOR).log10()
}

pub struct LevelSampler {
    window: Duration,
    running: bool,
    samples: Vec<f64>,
    window_started: Option<Instant>,
}

impl Default for LevelSampler {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl LevelSampler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            running: false,
            samples: Vec::new(),
            window_started: None,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
        self.samples.clear();
        self.window_started = None;
    }

    /// Releases all sampling state. A stopped sampler ignores packets until
    /// started again.
    pub fn stop(&mut self) {
        self.running = false;
        self.samples.clear();
        self.window_started = None;
    }

    /// Feed one RTP packet. Returns a reading when this packet closes a
    /// sampling window.
    pub fn on_packet(&mut self, packet: &[u8]) -> Option<AudioVolumes> {
        if !self.running || packet.len() <= RTP_HEADER_LEN {
            return None;
        }
        let db = payload_dbfs(&packet[RTP_HEADER_LEN..]);
        self.on_sample(db, Instant::now())
    }

    fn on_sample(&mut self, db: f64, now: Instant) -> Option<AudioVolumes> {
        let started = *self.window_started.get_or_insert(now);

        let mut emitted = None;
        if now.duration_since(started) >= self.window {
            // A window that elapsed with nothing buffered emits nothing
            emitted = self.flush();
            self.window_started = Some(now);
        }
        self.samples.push(db);
        emitted
    }

    fn flush(&mut self) -> Option<AudioVolumes> {
        if self.samples.is_empty() {
            return None;
        }
        let n = self.samples.len() as f64;

        // Log-domain mean: average the powers, then convert back
        let mean_power = self.samples.iter().map(|d| 10f64.powf(d / 10.0)).sum::<f64>() / n;
        let mean_db = 10.0 * mean_power.log10();

        let arith_mean = self.samples.iter().sum::<f64>() / n;
        let variance = self
            .samples
            .iter()
            .map(|d| (d - arith_mean).powi(2))
            .sum::<f64>()
            / n;

        debug!(samples = self.samples.len(), dbfs = mean_db, "audio window closed");
        self.samples.clear();
        Some(AudioVolumes {
            dbfs: mean_db,
            db_std_dev: variance.sqrt(),
        })
    }
}
