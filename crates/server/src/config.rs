//! Environment configuration, read once at startup.

use std::path::PathBuf;

use anyhow::Context;
use hlsladder_transcoder::TranscoderConfig;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    pub upload_dir: PathBuf,
    pub transcoder: TranscoderConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = TranscoderConfig::default();

        let bind = lookup("HLSLADDER_BIND").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let upload_dir = lookup("HLSLADDER_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("uploads"));

        let ladder = match lookup("HLSLADDER_LADDER") {
            Some(raw) => hlsladder_core::parse_ladder(&raw).context("invalid HLSLADDER_LADDER")?,
            None => defaults.ladder,
        };

        // 0 disables the per-encode timeout.
        let task_timeout_secs = match lookup("HLSLADDER_TASK_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .context("invalid HLSLADDER_TASK_TIMEOUT_SECS")?;
                (secs > 0).then_some(secs)
            }
            None => defaults.task_timeout_secs,
        };

        let cancel_on_failure = match lookup("HLSLADDER_CANCEL_ON_FAILURE") {
            Some(raw) => parse_bool(&raw).context("invalid HLSLADDER_CANCEL_ON_FAILURE")?,
            None => defaults.cancel_on_failure,
        };

        let transcoder = TranscoderConfig {
            ffmpeg_path: lookup("HLSLADDER_FFMPEG")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_path),
            output_root: lookup("HLSLADDER_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_root),
            base_url: lookup("HLSLADDER_BASE_URL").unwrap_or(defaults.base_url),
            ladder,
            task_timeout_secs,
            cancel_on_failure,
            ..defaults
        };

        Ok(Self {
            bind,
            upload_dir,
            transcoder,
        })
    }
}

fn parse_bool(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other:?}"),
    }
}
