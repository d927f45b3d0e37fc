//! Wire frames exchanged over a relay channel.
//!
//! Inbound frames are decoded exactly once, at the channel boundary, into
//! [`InboundFrame`]. Outbound frames are [`ServerEvent`] values serialized
//! with an internal `type` tag.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::FrameError;
use crate::messages::Message;

/// A decoded client → server frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundFrame {
    /// `{"type":"message","role"?:..,"content"?:..}` with defaults applied.
    Message(Message),
    /// `{"type":"ping"}`.
    Ping,
    /// Any other `type` value (or none at all).
    Unknown(Option<String>),
}

#[derive(Deserialize)]
struct MessageBody {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

impl InboundFrame {
    /// Decode a text payload.
    ///
    /// Fails only when the payload is not a JSON object or a `message` frame
    /// has ill-typed `role`/`content` fields. Unrecognized types decode to
    /// [`InboundFrame::Unknown`].
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(map) = value else {
            return Err(FrameError::NotAnObject);
        };
        let frame_type = map.get("type").and_then(Value::as_str).map(str::to_owned);

        match frame_type.as_deref() {
            Some("message") => {
                let body: MessageBody = serde_json::from_value(Value::Object(map))
                    .map_err(|source| FrameError::Malformed {
                        frame_type: "message",
                        source,
                    })?;
                Ok(Self::Message(Message::from_parts(body.role, body.content)))
            }
            Some("ping") => Ok(Self::Ping),
            _ => Ok(Self::Unknown(frame_type)),
        }
    }

    /// The frame's `type` tag, for logging.
    pub fn frame_type(&self) -> &str {
        match self {
            Self::Message(_) => "message",
            Self::Ping => "ping",
            Self::Unknown(Some(t)) => t,
            Self::Unknown(None) => "<missing>",
        }
    }
}

/// A server → client frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full replacement of the client's dialogue view.
    UpdateDialogue {
        /// The complete global dialogue, oldest first.
        data: Vec<Message>,
    },
    /// Reply to a client ping.
    Pong,
}

impl ServerEvent {
    /// Build an `update_dialogue` event.
    pub fn update_dialogue(data: Vec<Message>) -> Self {
        Self::UpdateDialogue { data }
    }

    /// The event's `type` tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::UpdateDialogue { .. } => "update_dialogue",
            Self::Pong => "pong",
        }
    }

    /// Serialize to the JSON wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
