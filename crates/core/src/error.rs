use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("transcode failed: {0}")]
    TranscodeFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::TranscodeFailed(_) => "transcode_failed",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::TranscodeFailed(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Human-readable headline for the response body.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(msg) => msg,
            Self::TranscodeFailed(_) => "Error transcoding video",
            Self::Internal(_) => "Internal server error",
        }
    }

    /// Underlying cause, if it is worth showing separately from the message.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::BadRequest(_) => None,
            Self::TranscodeFailed(detail) | Self::Internal(detail) => Some(detail),
        }
    }
}

/// JSON error body: `{ "message": "…", "error": "…", "code": "…" }`
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub code: String,
}

impl From<&ApiError> for ErrorEnvelope {
    fn from(e: &ApiError) -> Self {
        Self {
            message: e.message().to_string(),
            error: e.detail().map(str::to_string),
            code: e.code().to_string(),
        }
    }
}
