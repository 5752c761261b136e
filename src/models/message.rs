use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Attachment kind decided once at upload time and carried explicitly.
/// `pdf` is accepted as a legacy alias for `document` on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Audio,
    #[serde(alias = "pdf")]
    Document,
}

impl AttachmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttachmentKind::Image => "image",
            AttachmentKind::Audio => "audio",
            AttachmentKind::Document => "document",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "image" => Some(AttachmentKind::Image),
            "audio" => Some(AttachmentKind::Audio),
            "document" | "pdf" => Some(AttachmentKind::Document),
            _ => None,
        }
    }

    /// Label shown in conversation previews for attachment-only messages.
    pub fn preview_label(&self) -> &'static str {
        match self {
            AttachmentKind::Image => "[image]",
            AttachmentKind::Audio => "[audio]",
            AttachmentKind::Document => "[document]",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub kind: AttachmentKind,
}

/// A message as seen by callers of the store: body already decrypted.
/// Immutable after creation except `read_at` and `deleted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub room_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    /// Decrypted plaintext; empty for attachment-only messages.
    pub body: String,
    pub attachment: Option<Attachment>,
    pub read_at: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// Input to `MessageStore::append`; `id` and `created_at` are server-assigned.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub room_id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    pub attachment: Option<Attachment>,
}

/// Per-room aggregate feeding the operator inbox.
#[derive(Debug, Clone)]
pub struct RoomSummary {
    pub room_id: String,
    /// Latest non-deleted message, decrypted. None when every message in the
    /// room has been soft-deleted.
    pub last_message: Option<Message>,
    /// Timestamp of the latest message including soft-deleted ones.
    pub last_activity: DateTime<Utc>,
    /// Unread messages addressed to the operator.
    pub unread_count: i64,
}

/// Support rooms are always operator <-> counterparty; the room id is derived
/// from the pair, never stored separately.
pub fn room_id_for(operator_id: &str, counterparty_id: &str) -> String {
    format!("{operator_id}-{counterparty_id}")
}

/// Extract the counterparty identity from a derived room id.
pub fn counterparty_of<'a>(operator_id: &str, room_id: &'a str) -> Option<&'a str> {
    room_id
        .strip_prefix(operator_id)
        .and_then(|rest| rest.strip_prefix('-'))
        .filter(|rest| !rest.is_empty())
}
