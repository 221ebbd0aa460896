use std::io;
use std::path::Path;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Multipart, State};
use futures::{Stream, TryStreamExt};
use hlsladder_core::StreamMode;
use hlsladder_core::error::ApiError;
use hlsladder_transcoder::orchestrator::JobReport;
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

/// Multipart field carrying the source video.
pub const VIDEO_FIELD: &str = "video";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_playlist_url: Option<String>,
    pub hls_streams: Vec<HlsStream>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HlsStream {
    pub resolution: String,
    pub hls_url: String,
}

impl From<JobReport> for UploadResponse {
    fn from(report: JobReport) -> Self {
        let message = match report.mode {
            StreamMode::Simple => {
                "Video transcoded to multiple resolutions and segments created"
            }
            StreamMode::Adaptive => {
                "Video transcoded to multiple resolutions and adaptive HLS master playlist created"
            }
        };
        Self {
            message: message.to_string(),
            master_playlist_url: report.master_url,
            hls_streams: report
                .streams
                .into_iter()
                .map(|s| HlsStream {
                    resolution: s.resolution.label,
                    hls_url: s.playlist_url,
                })
                .collect(),
        }
    }
}

/// POST /upload: one playlist per resolution.
pub async fn upload_simple(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    transcode_upload(state, multipart, StreamMode::Simple).await
}

/// POST /upload-adaptive: per-resolution playlists plus a master playlist.
pub async fn upload_adaptive(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    transcode_upload(state, multipart, StreamMode::Adaptive).await
}

async fn transcode_upload(
    state: AppState,
    mut multipart: Multipart,
    mode: StreamMode,
) -> Result<Json<UploadResponse>, AppError> {
    let mut job_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some(VIDEO_FIELD) || field.file_name().is_none() {
            continue;
        }

        // Uploads are stored under a fresh id so client file names never reach the filesystem.
        let id = uuid::Uuid::new_v4().simple().to_string();
        let path = state.upload_dir.join(&id);
        info!(job_id = %id, original = ?field.file_name(), "receiving upload");
        stream_to_file(&path, field).await?;
        job_id = Some(id);
        break;
    }

    let job_id = job_id.ok_or_else(|| ApiError::BadRequest("No file uploaded".into()))?;
    let source = state.upload_dir.join(&job_id);
    let job = state.orchestrator.layout().job(&job_id, source)?;

    let report = state.orchestrator.run(&job, mode).await?;
    Ok(Json(report.into()))
}

/// Save a byte stream to a file.
async fn stream_to_file<S, E>(path: &Path, stream: S) -> Result<(), AppError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    async {
        let body_with_io_error = stream.map_err(io::Error::other);
        let body_reader = StreamReader::new(body_with_io_error);
        futures::pin_mut!(body_reader);

        let mut file = BufWriter::new(File::create(path).await?);
        tokio::io::copy(&mut body_reader, &mut file).await?;
        file.flush().await?;

        Ok::<_, io::Error>(())
    }
    .await
    .map_err(|e| ApiError::Internal(format!("failed to store upload: {e}")).into())
}
