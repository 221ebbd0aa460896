use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hlsladder_core::{ResolutionSpec, StreamStatus};
use tracing::{info, warn};

use crate::engine::{EncodeEngine, EncodeRequest};
use crate::hls::VARIANT_PLAYLIST;
use crate::layout::OutputLayout;
use crate::TranscodeError;

/// Outcome of encoding one rendition.
#[derive(Debug, Clone)]
pub struct StreamResult {
    pub resolution: ResolutionSpec,
    pub playlist_url: String,
    pub status: StreamStatus,
}

impl StreamResult {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Wraps a single engine invocation for one (source, resolution) pair.
#[derive(Clone)]
pub struct TaskRunner {
    engine: Arc<dyn EncodeEngine>,
    layout: OutputLayout,
    timeout: Option<Duration>,
}

impl TaskRunner {
    pub fn new(engine: Arc<dyn EncodeEngine>, layout: OutputLayout, timeout: Option<Duration>) -> Self {
        Self {
            engine,
            layout,
            timeout,
        }
    }

    /// Encode `source` into `output_dir`. Never retries and never returns an
    /// error: failures are reported through [`StreamStatus::Failed`].
    ///
    /// `output_dir` must already exist.
    pub async fn run_task(
        &self,
        job_id: &str,
        source: &Path,
        resolution: &ResolutionSpec,
        output_dir: &Path,
        segment_secs: u32,
    ) -> StreamResult {
        let playlist_url = self.layout.playlist_url(job_id, &resolution.label);
        let status = match self.encode(source, resolution, output_dir, segment_secs).await {
            Ok(()) => {
                info!(job_id, label = %resolution.label, "rendition finished");
                StreamStatus::Succeeded
            }
            Err(e) => {
                warn!(job_id, label = %resolution.label, error = %e, "rendition failed");
                StreamStatus::Failed(failure_text(e))
            }
        };

        StreamResult {
            resolution: resolution.clone(),
            playlist_url,
            status,
        }
    }

    async fn encode(
        &self,
        source: &Path,
        resolution: &ResolutionSpec,
        output_dir: &Path,
        segment_secs: u32,
    ) -> Result<(), TranscodeError> {
        if segment_secs == 0 {
            return Err(TranscodeError::InvalidInput(
                "segment duration must be positive".into(),
            ));
        }

        let request = EncodeRequest {
            source: source.to_path_buf(),
            resolution: resolution.clone(),
            playlist_path: output_dir.join(VARIANT_PLAYLIST),
            segment_secs,
        };
        remove_stale(&request.playlist_path).await?;

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.engine.encode(&request))
                .await
                .map_err(|_| TranscodeError::Timeout {
                    label: resolution.label.clone(),
                    secs: limit.as_secs(),
                })??,
            None => self.engine.encode(&request).await?,
        }

        // A clean exit that left no playlist behind is still a failed encode.
        if !tokio::fs::try_exists(&request.playlist_path).await? {
            return Err(TranscodeError::EncodeFailed {
                label: resolution.label.clone(),
                message: format!("no playlist written at {}", request.playlist_path.display()),
            });
        }
        Ok(())
    }
}

/// Drop a playlist left by an earlier run so only this encode can satisfy
/// the existence check.
pub(crate) async fn remove_stale(path: &Path) -> Result<(), TranscodeError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// The cause without the label; the orchestrator adds the label back when it
/// reports the job failure.
fn failure_text(e: TranscodeError) -> String {
    match e {
        TranscodeError::EncodeFailed { message, .. } => message,
        TranscodeError::Timeout { secs, .. } => format!("timed out after {secs}s"),
        other => other.to_string(),
    }
}
