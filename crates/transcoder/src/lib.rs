#![allow(clippy::collapsible_if)]
pub mod engine;
pub mod hls;
pub mod layout;
pub mod manifest;
pub mod orchestrator;
pub mod runner;

use std::path::PathBuf;
use std::time::Duration;

use hlsladder_core::{LadderError, ResolutionSpec, StreamMode, default_ladder};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid ladder: {0}")]
    InvalidLadder(#[from] LadderError),
    #[error("encode failed for {label}: {message}")]
    EncodeFailed { label: String, message: String },
    #[error("{label} timed out after {secs}s")]
    Timeout { label: String, secs: u64 },
    #[error("encode task for {label} did not finish: {message}")]
    TaskAborted { label: String, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Process-wide transcoder configuration. Built once at startup.
#[derive(Debug, Clone)]
pub struct TranscoderConfig {
    pub ffmpeg_path: PathBuf,
    /// Root of the published output tree; one subdirectory per job.
    pub output_root: PathBuf,
    /// Public URL prefix under which `output_root` is served.
    pub base_url: String,
    pub ladder: Vec<ResolutionSpec>,
    pub simple_segment_secs: u32,
    pub adaptive_segment_secs: u32,
    /// Upper bound on a single encode; `None` waits forever.
    pub task_timeout_secs: Option<u64>,
    /// Abort still-running siblings as soon as one resolution fails.
    pub cancel_on_failure: bool,
}

impl TranscoderConfig {
    /// Segment duration policy: long segments for plain playlists, short ones
    /// so adaptive players can switch renditions quickly.
    pub fn segment_secs(&self, mode: StreamMode) -> u32 {
        match mode {
            StreamMode::Simple => self.simple_segment_secs,
            StreamMode::Adaptive => self.adaptive_segment_secs,
        }
    }

    pub fn task_timeout(&self) -> Option<Duration> {
        self.task_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            output_root: PathBuf::from("output"),
            base_url: "http://localhost:3000/output".to_string(),
            ladder: default_ladder(),
            simple_segment_secs: 10,
            adaptive_segment_secs: 3,
            task_timeout_secs: Some(3600),
            cancel_on_failure: false,
        }
    }
}
