use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One rung of the resolution ladder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolutionSpec {
    pub width: u32,
    pub height: u32,
    pub label: String,
}

impl ResolutionSpec {
    pub fn new(width: u32, height: u32, label: impl Into<String>) -> Self {
        Self {
            width,
            height,
            label: label.into(),
        }
    }

    /// `WIDTHxHEIGHT`, as used in scale filters and manifest attributes.
    pub fn dimensions(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl std::fmt::Display for ResolutionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}x{})", self.label, self.width, self.height)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LadderError {
    #[error("malformed ladder entry {0:?}, expected WIDTHxHEIGHT:label")]
    Malformed(String),
    #[error("resolution {0} has a zero dimension")]
    ZeroDimension(String),
    #[error("resolution {0} has an empty label")]
    EmptyLabel(String),
    #[error("duplicate resolution label {0}")]
    DuplicateLabel(String),
}

/// Parses a single `WIDTHxHEIGHT:label` entry, e.g. `1280x720:720p`.
impl FromStr for ResolutionSpec {
    type Err = LadderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let malformed = || LadderError::Malformed(s.to_string());

        let (dims, label) = s.split_once(':').ok_or_else(malformed)?;
        let (w, h) = dims.split_once('x').ok_or_else(malformed)?;
        let width: u32 = w.trim().parse().map_err(|_| malformed())?;
        let height: u32 = h.trim().parse().map_err(|_| malformed())?;

        Ok(Self::new(width, height, label.trim()))
    }
}

/// The ladder used when nothing else is configured.
pub fn default_ladder() -> Vec<ResolutionSpec> {
    vec![
        ResolutionSpec::new(426, 240, "240p"),
        ResolutionSpec::new(640, 360, "360p"),
        ResolutionSpec::new(1280, 720, "720p"),
        ResolutionSpec::new(1920, 1080, "1080p"),
    ]
}

/// Parse a comma-separated ladder (`426x240:240p,640x360:360p`) and validate it.
pub fn parse_ladder(s: &str) -> Result<Vec<ResolutionSpec>, LadderError> {
    let ladder = s
        .split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(str::parse)
        .collect::<Result<Vec<ResolutionSpec>, _>>()?;
    validate_ladder(&ladder)?;
    Ok(ladder)
}

/// Every rung needs non-zero dimensions and a label no other rung uses.
pub fn validate_ladder(ladder: &[ResolutionSpec]) -> Result<(), LadderError> {
    let mut seen = HashSet::new();
    for res in ladder {
        if res.width == 0 || res.height == 0 {
            return Err(LadderError::ZeroDimension(res.label.clone()));
        }
        if res.label.is_empty() {
            return Err(LadderError::EmptyLabel(res.dimensions()));
        }
        if !seen.insert(res.label.as_str()) {
            return Err(LadderError::DuplicateLabel(res.label.clone()));
        }
    }
    Ok(())
}

/// Output flavor of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    /// One playlist per resolution, no master manifest.
    Simple,
    /// Per-resolution playlists plus a master manifest.
    Adaptive,
}

impl StreamMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Adaptive => "adaptive",
        }
    }
}

impl std::fmt::Display for StreamMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single transcode job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    FannedOut,
    Aggregating,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::FannedOut => "fanned_out",
            Self::Aggregating => "aggregating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// Any non-terminal state may fail (directory creation can fail before
    /// fan-out); completion is only reachable from aggregation.
    pub fn can_transition_to(self, next: JobState) -> bool {
        match (self, next) {
            (Self::Created, Self::FannedOut) => true,
            (Self::FannedOut, Self::Aggregating) => true,
            (Self::Aggregating, Self::Completed) => true,
            (from, Self::Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status of one encode task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum StreamStatus {
    Succeeded,
    Failed(String),
}

impl StreamStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}
