//! WebSocket event vocabulary.
//!
//! All events are tagged enums with `object.action` names and one consistent
//! JSON shape per direction. Serialization happens here and nowhere else;
//! handlers never hand-build event JSON.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::message::{MessageStatus, MessageView};

/// Events the server pushes to a connected client.
///
/// Pushes are best-effort hints: the record store remains the source of
/// truth, and a client can always reconstruct state from the fetch surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Full set of currently-online users; re-broadcast on every presence
    /// change.
    #[serde(rename = "online.users")]
    OnlineUsers { user_ids: Vec<Uuid> },

    /// New message fanned out to the counterpart.
    #[serde(rename = "message.incoming")]
    MessageIncoming { message: MessageView },

    /// Delivery-state transition for one message or a seen-batch. Only
    /// durable IDs ever appear here.
    #[serde(rename = "status.update")]
    StatusUpdate {
        message_ids: Vec<Uuid>,
        status: MessageStatus,
    },

    /// Self-delete signal, pushed only to the acting party's own connection.
    #[serde(rename = "message.deleted")]
    MessageDeleted { message_id: Uuid },

    /// Global deletion; both parties replace rendered content with a
    /// placeholder.
    #[serde(rename = "message.redacted")]
    MessageRedacted { message_id: Uuid },

    /// Transient typing indicator; the receiving client self-clears after a
    /// short timeout.
    #[serde(rename = "typing")]
    Typing { from: Uuid },
}

impl ServerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::OnlineUsers { .. } => "online.users",
            Self::MessageIncoming { .. } => "message.incoming",
            Self::StatusUpdate { .. } => "status.update",
            Self::MessageDeleted { .. } => "message.deleted",
            Self::MessageRedacted { .. } => "message.redacted",
            Self::Typing { .. } => "typing",
        }
    }
}

/// Events a client sends over its socket. The sender's identity comes from
/// the authenticated connection, never from the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Join the presence registry. Connections are invisible to presence
    /// until they announce.
    #[serde(rename = "presence.announce")]
    Announce,

    /// Batch acknowledgement that the viewer has seen these messages.
    #[serde(rename = "message.seen")]
    Seen {
        message_ids: Vec<Uuid>,
        counterpart_id: Uuid,
    },

    /// Fire-and-forget typing signal toward the counterpart.
    #[serde(rename = "typing")]
    Typing { counterpart_id: Uuid },
}
