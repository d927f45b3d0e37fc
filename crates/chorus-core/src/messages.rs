//! Dialogue message types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Speaker role of a dialogue message.
///
/// The three well-known roles are enumerated; any other string is kept
/// verbatim in [`Role::Other`] so clients can use their own labels.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    /// A human participant.
    #[default]
    User,
    /// The assistant / avatar side of the conversation.
    Assistant,
    /// System-generated notices.
    System,
    /// Any other client-defined role.
    Other(String),
}

impl Role {
    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.as_str() {
            "user" => Self::User,
            "assistant" => Self::Assistant,
            "system" => Self::System,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        Self::from(s.to_owned())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the dialogue log.
///
/// `start_time`, `end_time`, `audio_file`, `tts_file` and `vad_status` are
/// placeholders reserved for the voice pipeline; they default to `""`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    /// Speaker role.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Utterance start time.
    pub start_time: String,
    /// Utterance end time.
    pub end_time: String,
    /// Recorded audio file name.
    pub audio_file: String,
    /// Synthesized speech file name.
    pub tts_file: String,
    /// Voice-activity annotation.
    pub vad_status: String,
}

impl Message {
    /// Build a message with the given role and content and empty placeholders.
    pub fn new(role: impl Into<Role>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    /// Build a message applying the relay defaulting rules: a missing role
    /// becomes `user`, missing content becomes `""`.
    pub fn from_parts(role: Option<String>, content: Option<String>) -> Self {
        Self::new(
            role.map_or(Role::User, Role::from),
            content.unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_roles_parse() {
        assert_eq!(Role::from("user"), Role::User);
        assert_eq!(Role::from("assistant"), Role::Assistant);
        assert_eq!(Role::from("system"), Role::System);
    }

    #[test]
    fn free_form_role_is_preserved() {
        let role = Role::from("narrator");
        assert_eq!(role, Role::Other("narrator".into()));
        assert_eq!(role.as_str(), "narrator");
        assert_eq!(serde_json::to_value(&role).unwrap(), json!("narrator"));
    }

    #[test]
    fn default_role_is_user() {
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn new_message_has_empty_placeholders() {
        let msg = Message::new(Role::User, "hi");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "user",
                "content": "hi",
                "start_time": "",
                "end_time": "",
                "audio_file": "",
                "tts_file": "",
                "vad_status": ""
            })
        );
    }

    #[test]
    fn from_parts_applies_defaults() {
        let msg = Message::from_parts(None, None);
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "");

        let msg = Message::from_parts(Some("assistant".into()), Some("hello".into()));
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content, "hello");
    }

    #[test]
    fn partial_message_deserializes_with_defaults() {
        let msg: Message = serde_json::from_value(json!({"content": "x"})).unwrap();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "x");
        assert!(msg.tts_file.is_empty());
    }
}
