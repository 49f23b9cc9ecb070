use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the conversion service.
///
/// Validation errors are detected before any side effect and map to 400;
/// everything else maps to 500. Every variant renders as `{"error": message}`.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// A convert request arrived with zero file parts.
    #[error("no image files were provided")]
    EmptyBatch,

    /// The requested output format is not one we encode.
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// `set-output` was called with a missing or blank path.
    #[error("an output path is required")]
    InvalidPath,

    /// The output directory could not be created (permissions, or the path
    /// collides with an existing non-directory).
    #[error("could not create output directory {path}: {message}")]
    DirectoryCreate { path: PathBuf, message: String },

    /// Decoding or re-encoding a file failed (including corrupt input bytes).
    #[error("failed to convert {file}: {message}")]
    Codec { file: String, message: String },

    /// Writing an encoded file to disk failed.
    #[error("failed to write {path}: {message}")]
    Write { path: PathBuf, message: String },

    /// The OS refused to reveal the output folder. Never affects
    /// conversion state.
    #[error("could not open output folder: {0}")]
    FileManager(String),

    /// The multipart body could not be read.
    #[error("malformed upload: {0}")]
    Upload(String),

    /// A background conversion task died before reporting a result.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ConvertError {
    pub fn status(&self) -> StatusCode {
        match self {
            ConvertError::EmptyBatch
            | ConvertError::UnsupportedFormat(_)
            | ConvertError::InvalidPath
            | ConvertError::Upload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ConvertError {
    fn into_response(self) -> Response {
        log::error!("request failed: {self}");
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_bad_requests() {
        assert_eq!(ConvertError::EmptyBatch.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ConvertError::UnsupportedFormat("bmp".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ConvertError::InvalidPath.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn processing_errors_are_server_errors() {
        let err = ConvertError::Codec {
            file: "a.png".into(),
            message: "truncated".into(),
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ConvertError::FileManager("no handler".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
