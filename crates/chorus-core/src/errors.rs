//! Frame decoding errors.

use thiserror::Error;

/// Errors produced while decoding an inbound frame.
///
/// These never terminate a connection: the relay logs them and keeps reading.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The payload is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The payload is JSON but not an object.
    #[error("frame must be a JSON object")]
    NotAnObject,
    /// A known frame type carried ill-typed fields.
    #[error("malformed {frame_type} frame: {source}")]
    Malformed {
        /// The `type` tag of the frame.
        frame_type: &'static str,
        /// Underlying field error.
        source: serde_json::Error,
    },
}

impl FrameError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Json(_) => "invalid_json",
            Self::NotAnObject => "not_an_object",
            Self::Malformed { .. } => "malformed",
        }
    }
}
