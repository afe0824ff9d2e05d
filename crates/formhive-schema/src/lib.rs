use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Platform chat identifier. Telegram group chats are negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A selectable button: `label` is shown to the user, `value` comes back in the callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub value: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Opaque reference to an inbound attachment, interpreted by the channel that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Channel that can resolve `id` (e.g. "telegram", "console")
    pub channel_type: String,
    /// Telegram file id, or a local path for the console channel
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum InboundKind {
    /// The entry command (`/start`)
    Start,
    Text { text: String },
    Photo { attachment: AttachmentRef },
    ChoiceSelected { value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub trace_id: Uuid,
    pub channel_type: String,
    pub chat_id: ChatId,
    pub kind: InboundKind,
    pub at: DateTime<Utc>,
}

impl InboundEvent {
    pub fn new(channel_type: impl Into<String>, chat_id: ChatId, kind: InboundKind) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            channel_type: channel_type.into(),
            chat_id,
            kind,
            at: Utc::now(),
        }
    }
}

/// A finished, confirmed survey ready for the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub chat_id: ChatId,
    /// One answer per question, in flow order
    pub answers: Vec<String>,
    #[serde(default)]
    pub photo_path: Option<PathBuf>,
    pub submitted_at: DateTime<Utc>,
}
