//! Error types for the backend.
//!
//! Nothing in the synchronization core is fatal; these errors exist for the
//! HTTP edge (uploads) and map onto responses there.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The multipart form carried no usable `audio` field.
    #[error("No file uploaded")]
    MissingUpload,

    /// Reading the multipart stream failed mid-transfer.
    #[error("Upload transfer failed: {0}")]
    UploadTransfer(#[from] axum::extract::multipart::MultipartError),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    fn status(&self) -> StatusCode {
        match self {
            Error::MissingUpload | Error::UploadTransfer(_) => StatusCode::BAD_REQUEST,
            Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
