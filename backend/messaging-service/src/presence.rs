//! Process-wide presence registry.
//!
//! The single piece of shared mutable state every connection handler
//! touches. All mutation goes through one lock owned by this struct; nothing
//! here is durable, so a restart starts from zero connections and users stay
//! offline until they reconnect.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::conversation::UserRole;
use crate::websocket::events::ServerEvent;

/// Push side of one client connection. The `id` is the handle's own identity:
/// unregistration matches on it, so a stale disconnect can never evict a
/// newer registration for the same user.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    tx: UnboundedSender<ServerEvent>,
}

impl ConnectionHandle {
    pub fn new(tx: UnboundedSender<ServerEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Non-blocking best-effort push. `false` means the receiving task is
    /// gone and the handle is stale.
    pub fn push(&self, event: ServerEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

#[derive(Default, Clone)]
pub struct PresenceRegistry {
    // user_id -> active connection; one handle per user, last write wins
    inner: Arc<RwLock<HashMap<Uuid, ConnectionHandle>>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for `user_id`, replacing any prior handle
    /// (single-active-connection policy), then broadcast the new online set.
    pub async fn register(&self, user_id: Uuid, role: UserRole, handle: ConnectionHandle) {
        tracing::debug!(%user_id, %role, connection = %handle.id, "presence registered");
        {
            let mut guard = self.inner.write().await;
            guard.insert(user_id, handle);
        }
        self.broadcast_online().await;
    }

    /// Remove the entry holding exactly this handle. Keyed by handle
    /// identity, not user ID: after a reconnect, the old socket's teardown
    /// must not knock the new registration out.
    pub async fn unregister(&self, handle: &ConnectionHandle) {
        let removed = {
            let mut guard = self.inner.write().await;
            let stale = guard
                .iter()
                .find(|(_, active)| active.id == handle.id)
                .map(|(user_id, _)| *user_id);
            match stale {
                Some(user_id) => {
                    guard.remove(&user_id);
                    tracing::debug!(%user_id, connection = %handle.id, "presence unregistered");
                    true
                }
                None => false,
            }
        };
        if removed {
            self.broadcast_online().await;
        }
    }

    pub async fn lookup(&self, user_id: Uuid) -> Option<ConnectionHandle> {
        self.inner.read().await.get(&user_id).cloned()
    }

    pub async fn list_online(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.inner.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Push the full online set to every registered connection, pruning
    /// handles whose receiving task has gone away.
    async fn broadcast_online(&self) {
        let mut guard = self.inner.write().await;
        let mut user_ids: Vec<Uuid> = guard.keys().copied().collect();
        user_ids.sort();
        let event = ServerEvent::OnlineUsers { user_ids };
        guard.retain(|_, handle| handle.push(event.clone()));
    }
}
