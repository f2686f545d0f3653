use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::models::conversation::UserRole;

/// Delivery state of a message. Variant order is the legal transition order:
/// a message only ever moves forward through `Sent -> Delivered -> Seen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Seen,
}

impl MessageStatus {
    /// Forward-only transition: requesting an earlier (or equal) state keeps
    /// the current one.
    pub fn advance(self, next: MessageStatus) -> MessageStatus {
        if next > self {
            next
        } else {
            self
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Seen => "seen",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown message status: {0}")]
pub struct ParseStatusError(String);

impl FromStr for MessageStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "seen" => Ok(MessageStatus::Seen),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// A persisted message. The durable `id` is assigned by the record store;
/// client-side provisional IDs never reach this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_role: UserRole,
    pub text: Option<String>,
    pub attachment_url: Option<String>,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub seen_at: Option<DateTime<Utc>>,
    /// Actors who removed this message from their own view only.
    pub deleted_for: Vec<Uuid>,
    /// Author-initiated global deletion; content is cleared for everyone.
    pub tombstoned: bool,
}

impl Message {
    /// Per-viewer filter applied at read time: a self-delete hides the
    /// message for that actor and nobody else.
    pub fn hidden_for(&self, viewer_id: Uuid) -> bool {
        self.deleted_for.contains(&viewer_id)
    }
}

/// Wire shape of a message: everything a client renders, without the
/// `deleted_for` bookkeeping of the other party. Tombstoned content is
/// cleared here as well, so a redacted message reads empty no matter which
/// storage path produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_role: UserRole,
    pub text: Option<String>,
    pub attachment_url: Option<String>,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub seen_at: Option<DateTime<Utc>>,
    pub tombstoned: bool,
}

impl From<&Message> for MessageView {
    fn from(m: &Message) -> Self {
        let (text, attachment_url) = if m.tombstoned {
            (None, None)
        } else {
            (m.text.clone(), m.attachment_url.clone())
        };
        MessageView {
            id: m.id,
            conversation_id: m.conversation_id,
            sender_id: m.sender_id,
            sender_role: m.sender_role,
            text,
            attachment_url,
            status: m.status,
            created_at: m.created_at,
            delivered_at: m.delivered_at,
            seen_at: m.seen_at,
            tombstoned: m.tombstoned,
        }
    }
}
