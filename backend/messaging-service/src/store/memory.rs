//! In-memory record store.
//!
//! Backs tests and DB-less development runs. One `RwLock` over the whole
//! state keeps every mutation atomic, which is exactly the guarantee the
//! Postgres backend gets from single-statement updates.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::conversation::{Conversation, UserRole};
use crate::models::message::{Message, MessageStatus};
use crate::store::{NewMessage, RecordStore};

#[derive(Default)]
struct Inner {
    conversations: HashMap<Uuid, Conversation>,
    // (doctor_id, patient_id) -> conversation id; mirrors the unique pair index
    pairs: HashMap<(Uuid, Uuid), Uuid>,
    messages: HashMap<Uuid, Message>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn ensure_conversation(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
    ) -> AppResult<Conversation> {
        let mut guard = self.inner.write().await;
        if let Some(id) = guard.pairs.get(&(doctor_id, patient_id)) {
            return Ok(guard.conversations[id].clone());
        }
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            doctor_id,
            patient_id,
            last_message_text: None,
            last_message_at: None,
            unread_doctor: 0,
            unread_patient: 0,
            created_at: now,
            updated_at: now,
        };
        guard.pairs.insert((doctor_id, patient_id), conversation.id);
        guard
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn conversation(&self, id: Uuid) -> AppResult<Option<Conversation>> {
        Ok(self.inner.read().await.conversations.get(&id).cloned())
    }

    async fn conversation_for_pair(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
    ) -> AppResult<Option<Conversation>> {
        let guard = self.inner.read().await;
        Ok(guard
            .pairs
            .get(&(doctor_id, patient_id))
            .and_then(|id| guard.conversations.get(id))
            .cloned())
    }

    async fn conversations_for_user(&self, user_id: Uuid) -> AppResult<Vec<Conversation>> {
        let guard = self.inner.read().await;
        let mut out: Vec<Conversation> = guard
            .conversations
            .values()
            .filter(|c| c.participant(user_id))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }

    async fn record_send(
        &self,
        conversation_id: Uuid,
        preview: &str,
        sender_role: UserRole,
        sent_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut guard = self.inner.write().await;
        let conversation = guard
            .conversations
            .get_mut(&conversation_id)
            .ok_or(AppError::NotFound)?;
        // Last-writer-wins on the last-message fields; the unread increment
        // is unconditional so racing sends lose neither count.
        if conversation.last_message_at.map_or(true, |t| t <= sent_at) {
            conversation.last_message_text = Some(preview.to_string());
            conversation.last_message_at = Some(sent_at);
        }
        match sender_role {
            UserRole::Doctor => conversation.unread_patient += 1,
            UserRole::Patient => conversation.unread_doctor += 1,
        }
        conversation.updated_at = Utc::now();
        Ok(())
    }

    async fn resolve_unread(&self, conversation_id: Uuid, viewer_role: UserRole) -> AppResult<()> {
        let mut guard = self.inner.write().await;
        let conversation = guard
            .conversations
            .get_mut(&conversation_id)
            .ok_or(AppError::NotFound)?;
        match viewer_role {
            UserRole::Doctor => conversation.unread_doctor = 0,
            UserRole::Patient => conversation.unread_patient = 0,
        }
        Ok(())
    }

    async fn insert_message(&self, new: NewMessage) -> AppResult<Message> {
        let mut guard = self.inner.write().await;
        if !guard.conversations.contains_key(&new.conversation_id) {
            return Err(AppError::NotFound);
        }
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: new.conversation_id,
            sender_id: new.sender_id,
            sender_role: new.sender_role,
            text: new.text,
            attachment_url: new.attachment_url,
            status: MessageStatus::Sent,
            created_at: Utc::now(),
            delivered_at: None,
            seen_at: None,
            deleted_for: Vec::new(),
            tombstoned: false,
        };
        guard.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn message(&self, id: Uuid) -> AppResult<Option<Message>> {
        Ok(self.inner.read().await.messages.get(&id).cloned())
    }

    async fn thread(
        &self,
        conversation_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Message>> {
        let guard = self.inner.read().await;
        let mut out: Vec<Message> = guard
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn mark_delivered(
        &self,
        message_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Message>> {
        let mut guard = self.inner.write().await;
        let Some(message) = guard.messages.get_mut(&message_id) else {
            return Ok(None);
        };
        if message.status != MessageStatus::Sent || message.tombstoned {
            return Ok(None);
        }
        message.status = MessageStatus::Delivered;
        message.delivered_at = Some(at);
        Ok(Some(message.clone()))
    }

    async fn mark_seen(
        &self,
        conversation_id: Uuid,
        message_ids: &[Uuid],
        author_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<Uuid>> {
        let mut guard = self.inner.write().await;
        let mut transitioned = Vec::new();
        for id in message_ids {
            let Some(message) = guard.messages.get_mut(id) else {
                continue;
            };
            if message.conversation_id != conversation_id
                || message.sender_id != author_id
                || message.status == MessageStatus::Seen
                || message.tombstoned
            {
                continue;
            }
            message.status = MessageStatus::Seen;
            message.seen_at = Some(at);
            transitioned.push(*id);
        }
        Ok(transitioned)
    }

    async fn add_deleted_for(&self, message_id: Uuid, actor_id: Uuid) -> AppResult<()> {
        let mut guard = self.inner.write().await;
        let message = guard
            .messages
            .get_mut(&message_id)
            .ok_or(AppError::NotFound)?;
        if !message.deleted_for.contains(&actor_id) {
            message.deleted_for.push(actor_id);
        }
        Ok(())
    }

    async fn tombstone(&self, message_id: Uuid) -> AppResult<Message> {
        let mut guard = self.inner.write().await;
        let message = guard
            .messages
            .get_mut(&message_id)
            .ok_or(AppError::NotFound)?;
        message.tombstoned = true;
        message.text = None;
        message.attachment_url = None;
        Ok(message.clone())
    }
}
