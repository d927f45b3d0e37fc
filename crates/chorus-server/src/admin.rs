//! Administrative HTTP API over the dialogue.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chorus_core::{Message, SessionId};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::relay::MessageSource;
use crate::server::AppState;

/// `{"status": ..., "message"?: ...}` reply body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusBody {
    /// `"success"` or `"error"`.
    pub status: String,
    /// Error detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusBody {
    /// A success body.
    pub fn success() -> Self {
        Self {
            status: "success".into(),
            message: None,
        }
    }

    /// An error body.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".into(),
            message: Some(message.into()),
        }
    }
}

/// An error reply with a 4xx status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// 400 Bad Request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// 404 Not Found.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(StatusBody::error(self.message))).into_response()
    }
}

/// Body of `POST /add_message`.
#[derive(Debug, Default, Deserialize)]
pub struct AddMessageRequest {
    /// Speaker role, `"user"` if absent.
    #[serde(default)]
    pub role: Option<String>,
    /// Text, `""` if absent.
    #[serde(default)]
    pub content: Option<String>,
}

/// POST /add_message
pub async fn add_message(
    State(state): State<AppState>,
    payload: Result<Json<AddMessageRequest>, JsonRejection>,
) -> Result<Json<StatusBody>, ApiError> {
    let Json(req) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "rejected add_message body");
        ApiError::bad_request(rejection.body_text())
    })?;
    let message = Message::from_parts(req.role, req.content);
    let report = state
        .relay
        .post_message(message, None, MessageSource::Admin);
    info!(recipients = report.recipients, "message appended via admin API");
    Ok(Json(StatusBody::success()))
}

/// GET /dialogue
pub async fn get_dialogue(State(state): State<AppState>) -> Json<Vec<Message>> {
    Json(state.relay.dialogue())
}

/// GET /dialogue/{session_id}
pub async fn get_session_dialogue(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let id = SessionId::from_raw(session_id);
    state
        .relay
        .session_dialogue(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("unknown session: {id}")))
}

/// DELETE /dialogue
pub async fn clear_dialogue(State(state): State<AppState>) -> Json<StatusBody> {
    let report = state.relay.clear();
    info!(recipients = report.recipients, "dialogue cleared");
    Json(StatusBody::success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_body_shape() {
        let json = serde_json::to_value(StatusBody::success()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "success"}));
    }

    #[test]
    fn error_body_shape() {
        let json = serde_json::to_value(StatusBody::error("nope")).unwrap();
        assert_eq!(json, serde_json::json!({"status": "error", "message": "nope"}));
    }

    #[test]
    fn api_error_status() {
        assert_eq!(
            ApiError::not_found("x").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::bad_request("x").into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn request_fields_are_optional() {
        let req: AddMessageRequest = serde_json::from_str("{}").unwrap();
        assert!(req.role.is_none());
        assert!(req.content.is_none());
    }
}
