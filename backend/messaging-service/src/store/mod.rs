//! The durable record store behind the messaging pipeline.
//!
//! The store is the sole source of truth: persistence happens-before any
//! fan-out, and every mutation here is authoritative. Two backends implement
//! the seam: Postgres for deployments, an in-memory map for tests and
//! DB-less development runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::conversation::{Conversation, UserRole};
use crate::models::message::Message;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgRecordStore;

/// Insert payload for a new message; the store assigns the durable ID,
/// `created_at` and the initial `Sent` status.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_role: UserRole,
    pub text: Option<String>,
    pub attachment_url: Option<String>,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Idempotent upsert keyed on the (doctor, patient) pair.
    async fn ensure_conversation(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
    ) -> AppResult<Conversation>;

    async fn conversation(&self, id: Uuid) -> AppResult<Option<Conversation>>;

    async fn conversation_for_pair(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
    ) -> AppResult<Option<Conversation>>;

    /// Conversation summaries for either party, most recently updated first.
    async fn conversations_for_user(&self, user_id: Uuid) -> AppResult<Vec<Conversation>>;

    /// Update the last-message fields (last-writer-wins on `sent_at`) and
    /// atomically increment the non-sender's unread counter. The increment
    /// must survive racing sends; the last-message fields may lose the race.
    async fn record_send(
        &self,
        conversation_id: Uuid,
        preview: &str,
        sender_role: UserRole,
        sent_at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Zero the viewer's unread counter.
    async fn resolve_unread(&self, conversation_id: Uuid, viewer_role: UserRole) -> AppResult<()>;

    async fn insert_message(&self, new: NewMessage) -> AppResult<Message>;

    async fn message(&self, id: Uuid) -> AppResult<Option<Message>>;

    /// Messages of one conversation ordered by `created_at`.
    async fn thread(
        &self,
        conversation_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Message>>;

    /// `Sent -> Delivered` transition; returns the updated message, or `None`
    /// when the message is past `Sent` (or tombstoned) and nothing changed.
    async fn mark_delivered(
        &self,
        message_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Message>>;

    /// Batch `-> Seen` transition, filtered to messages of this conversation
    /// authored by `author_id` that are not already seen and not tombstoned.
    /// Returns the IDs that actually transitioned, so resubmitting an
    /// already-seen batch yields an empty result.
    async fn mark_seen(
        &self,
        conversation_id: Uuid,
        message_ids: &[Uuid],
        author_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<Uuid>>;

    /// Per-viewer soft delete: adds the actor to the message's hidden set.
    async fn add_deleted_for(&self, message_id: Uuid, actor_id: Uuid) -> AppResult<()>;

    /// Global deletion: clears content and freezes the message. Terminal.
    async fn tombstone(&self, message_id: Uuid) -> AppResult<Message>;
}
