//! On-disk layout of job output and the public URLs that point into it.
//!
//! ```text
//! <root>/<job_id>/master.m3u8          (adaptive jobs only)
//! <root>/<job_id>/<label>/index.m3u8
//! <root>/<job_id>/<label>/index0.ts …
//! ```

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::hls::{MASTER_PLAYLIST, VARIANT_PLAYLIST};
use crate::TranscodeError;

/// One upload being transcoded.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub source_path: PathBuf,
    /// `<root>/<id>`; created lazily by [`OutputLayout::ensure_job_dir`].
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
    base_url: String,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build a [`Job`] for an upload, rejecting ids that would escape the root.
    pub fn job(&self, id: &str, source_path: impl Into<PathBuf>) -> Result<Job, TranscodeError> {
        validate_job_id(id)?;
        Ok(Job {
            id: id.to_string(),
            source_path: source_path.into(),
            output_dir: self.job_dir(id),
        })
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.root.join(job_id)
    }

    pub fn resolution_dir(&self, job_id: &str, label: &str) -> PathBuf {
        self.job_dir(job_id).join(label)
    }

    pub fn playlist_path(&self, job_id: &str, label: &str) -> PathBuf {
        self.resolution_dir(job_id, label).join(VARIANT_PLAYLIST)
    }

    pub fn master_path(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join(MASTER_PLAYLIST)
    }

    /// Create the job directory. Existing directories are fine.
    pub async fn ensure_job_dir(&self, job_id: &str) -> Result<PathBuf, TranscodeError> {
        let dir = self.job_dir(job_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Create the directory for one rendition. Existing directories are fine.
    pub async fn ensure_resolution_dir(
        &self,
        job_id: &str,
        label: &str,
    ) -> Result<PathBuf, TranscodeError> {
        validate_label(label)?;
        let dir = self.resolution_dir(job_id, label);
        tokio::fs::create_dir_all(&dir).await?;
        debug!(job_id, label, dir = %dir.display(), "resolution dir ready");
        Ok(dir)
    }

    /// Public URL of `file` inside a rendition directory.
    pub fn url(&self, job_id: &str, label: &str, file: &str) -> String {
        format!("{}/{job_id}/{label}/{file}", self.base_url)
    }

    pub fn playlist_url(&self, job_id: &str, label: &str) -> String {
        self.url(job_id, label, VARIANT_PLAYLIST)
    }

    pub fn master_url(&self, job_id: &str) -> String {
        format!("{}/{job_id}/{MASTER_PLAYLIST}", self.base_url)
    }
}

/// Job ids become directory names, so they must be a single normal path component.
pub fn validate_job_id(id: &str) -> Result<(), TranscodeError> {
    if is_single_component(id) {
        Ok(())
    } else {
        Err(TranscodeError::InvalidInput(format!(
            "job id {id:?} is not a safe directory name"
        )))
    }
}

fn validate_label(label: &str) -> Result<(), TranscodeError> {
    if is_single_component(label) {
        Ok(())
    } else {
        Err(TranscodeError::InvalidInput(format!(
            "resolution label {label:?} is not a safe directory name"
        )))
    }
}

fn is_single_component(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
