// src/audio/mod.rs

pub mod level;
pub mod supervisor;

pub use level::{payload_dbfs, LevelSampler};
pub use supervisor::{AudioSupervisor, ForwarderContext, DEFAULT_RESTART_INTERVAL};
