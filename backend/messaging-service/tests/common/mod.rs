//! Shared fixtures: a chat service over the in-memory record store, plus
//! raw presence connections that capture pushed events for assertions.

#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use uuid::Uuid;

use carelink_messaging::middleware::auth::Identity;
use carelink_messaging::models::conversation::UserRole;
use carelink_messaging::presence::{ConnectionHandle, PresenceRegistry};
use carelink_messaging::services::chat_service::{ChatService, OutgoingContent};
use carelink_messaging::store::MemoryStore;
use carelink_messaging::websocket::events::ServerEvent;

pub struct TestBed {
    pub chat: ChatService,
    pub presence: PresenceRegistry,
    pub doctor: Identity,
    pub patient: Identity,
}

impl TestBed {
    pub fn new() -> Self {
        let presence = PresenceRegistry::new();
        let chat = ChatService::new(Arc::new(MemoryStore::new()), presence.clone());
        Self {
            chat,
            presence,
            doctor: Identity {
                user_id: Uuid::new_v4(),
                role: UserRole::Doctor,
            },
            patient: Identity {
                user_id: Uuid::new_v4(),
                role: UserRole::Patient,
            },
        }
    }

    /// Register a live connection for `who` and return its handle plus the
    /// receiving end where pushed events land.
    pub async fn connect(
        &self,
        who: Identity,
    ) -> (ConnectionHandle, UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = unbounded_channel();
        let handle = ConnectionHandle::new(tx);
        self.presence
            .register(who.user_id, who.role, handle.clone())
            .await;
        (handle, rx)
    }
}

/// Collect everything currently queued on a connection.
pub fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn text(s: &str) -> OutgoingContent {
    OutgoingContent {
        text: Some(s.to_string()),
        attachment_url: None,
    }
}
