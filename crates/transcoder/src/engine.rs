//! The external encoder, seen only through its command contract: arguments
//! in, exit status and a playlist on disk out.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use hlsladder_core::ResolutionSpec;
use tracing::debug;

use crate::TranscodeError;

/// Everything one encode needs.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub source: PathBuf,
    pub resolution: ResolutionSpec,
    /// Where the media playlist goes; segments land next to it.
    pub playlist_path: PathBuf,
    pub segment_secs: u32,
}

/// Something that can turn a source file into one HLS rendition.
#[async_trait]
pub trait EncodeEngine: Send + Sync {
    /// Run the encode to completion. `Ok` means the engine reported success.
    async fn encode(&self, request: &EncodeRequest) -> Result<(), TranscodeError>;
}

/// Runs a local `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg_path: PathBuf,
}

impl FfmpegEngine {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    pub fn ffmpeg_path(&self) -> &Path {
        &self.ffmpeg_path
    }
}

#[async_trait]
impl EncodeEngine for FfmpegEngine {
    async fn encode(&self, request: &EncodeRequest) -> Result<(), TranscodeError> {
        let label = &request.resolution.label;
        let args = ffmpeg_args(request);
        debug!(ffmpeg = ?self.ffmpeg_path, ?args, label = %label, "spawning ffmpeg");

        // kill_on_drop: a timed-out or aborted task takes the process down with it.
        let output = tokio::process::Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TranscodeError::EncodeFailed {
                label: label.clone(),
                message: format!("spawn {}: {e}", self.ffmpeg_path.display()),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let message = if stderr.is_empty() {
            format!("ffmpeg exited with {}", output.status)
        } else {
            stderr_tail(stderr, 5)
        };
        Err(TranscodeError::EncodeFailed {
            label: label.clone(),
            message,
        })
    }
}

/// Arguments for one scaled HLS rendition with every segment kept in the playlist.
pub fn ffmpeg_args(request: &EncodeRequest) -> Vec<String> {
    let res = &request.resolution;
    vec![
        "-hide_banner".into(),
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        request.source.to_string_lossy().into_owned(),
        "-vf".into(),
        format!("scale={}:{}", res.width, res.height),
        "-profile:v".into(),
        "baseline".into(),
        "-level".into(),
        "3.0".into(),
        "-start_number".into(),
        "0".into(),
        "-hls_time".into(),
        request.segment_secs.to_string(),
        "-hls_list_size".into(),
        "0".into(),
        "-f".into(),
        "hls".into(),
        request.playlist_path.to_string_lossy().into_owned(),
    ]
}

/// Last `n` lines of ffmpeg's stderr, which is where the actual error sits.
fn stderr_tail(stderr: &str, n: usize) -> String {
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
