//! The messaging pipeline: persist -> aggregate -> fan-out -> status echo.
//!
//! Persistence is authoritative and happens first; everything pushed over a
//! connection afterwards is a best-effort hint. A crash or a stale handle
//! after the persist leaves a durably `Sent` message that the counterpart
//! reconciles on its next thread fetch.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::THREAD_PAGE_LIMIT;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::Identity;
use crate::models::conversation::{participant_pair, Conversation, UserRole};
use crate::models::message::{Message, MessageStatus, MessageView};
use crate::presence::PresenceRegistry;
use crate::store::{NewMessage, RecordStore};
use crate::websocket::events::ServerEvent;

/// Preview text recorded on the conversation when a message has no body.
const ATTACHMENT_PREVIEW: &str = "[attachment]";

/// Content of an outgoing message. Text and attachment URL may both be set;
/// at least one must be.
#[derive(Debug, Clone, Default)]
pub struct OutgoingContent {
    pub text: Option<String>,
    pub attachment_url: Option<String>,
}

impl OutgoingContent {
    fn validate(&self) -> AppResult<()> {
        let has_text = self.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        if has_text || self.attachment_url.is_some() {
            Ok(())
        } else {
            Err(AppError::BadRequest(
                "message needs text or an attachment".into(),
            ))
        }
    }
}

/// Paging for thread fetches; clamped to the store-side cap.
#[derive(Debug, Clone, Copy)]
pub struct ThreadPage {
    pub limit: i64,
    pub offset: i64,
}

impl Default for ThreadPage {
    fn default() -> Self {
        Self {
            limit: THREAD_PAGE_LIMIT,
            offset: 0,
        }
    }
}

/// Summary row for the caller's conversation list.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub counterpart_id: Uuid,
    pub last_message_text: Option<String>,
    pub last_message_at: Option<chrono::DateTime<Utc>>,
    pub unread_count: i64,
}

#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn RecordStore>,
    presence: PresenceRegistry,
}

impl ChatService {
    pub fn new(store: Arc<dyn RecordStore>, presence: PresenceRegistry) -> Self {
        Self { store, presence }
    }

    /// Send a message to the counterpart.
    ///
    /// Returns the canonical persisted message: `Delivered` when the
    /// counterpart's connection accepted the push, `Sent` otherwise. The
    /// caller's client replaces its optimistic entry with this value.
    pub async fn send(
        &self,
        sender: Identity,
        counterpart_id: Uuid,
        content: OutgoingContent,
    ) -> AppResult<Message> {
        content.validate()?;
        let (doctor_id, patient_id) =
            participant_pair(sender.user_id, sender.role, counterpart_id);
        let conversation = self.store.ensure_conversation(doctor_id, patient_id).await?;

        let mut message = self
            .store
            .insert_message(NewMessage {
                conversation_id: conversation.id,
                sender_id: sender.user_id,
                sender_role: sender.role,
                text: content.text,
                attachment_url: content.attachment_url,
            })
            .await?;

        let preview = message
            .text
            .clone()
            .unwrap_or_else(|| ATTACHMENT_PREVIEW.to_string());
        self.store
            .record_send(conversation.id, &preview, sender.role, message.created_at)
            .await?;

        // Fan-out is best-effort from here on: the message is durably Sent
        // and a failed push must never fail the send.
        let pushed = match self.presence.lookup(counterpart_id).await {
            Some(handle) => {
                let accepted = handle.push(ServerEvent::MessageIncoming {
                    message: MessageView::from(&message),
                });
                if !accepted {
                    tracing::warn!(
                        message_id = %message.id,
                        %counterpart_id,
                        "stale connection handle, counterpart treated as offline"
                    );
                }
                accepted
            }
            None => false,
        };

        if pushed {
            if let Some(updated) = self.store.mark_delivered(message.id, Utc::now()).await? {
                message = updated;
            }
        }

        // Status echo to the sender's own connection: Delivered when fan-out
        // succeeded, otherwise an informational Sent confirmation.
        self.push_to(
            sender.user_id,
            ServerEvent::StatusUpdate {
                message_ids: vec![message.id],
                status: message.status,
            },
        )
        .await;

        Ok(message)
    }

    /// Batch seen-acknowledgement from the viewer for messages authored by
    /// the counterpart. Idempotent: already-seen IDs transition nothing and
    /// push nothing.
    pub async fn mark_seen(
        &self,
        viewer: Identity,
        counterpart_id: Uuid,
        message_ids: &[Uuid],
    ) -> AppResult<Vec<Uuid>> {
        let (doctor_id, patient_id) =
            participant_pair(viewer.user_id, viewer.role, counterpart_id);
        let Some(conversation) = self
            .store
            .conversation_for_pair(doctor_id, patient_id)
            .await?
        else {
            return Ok(Vec::new());
        };

        let seen = if message_ids.is_empty() {
            Vec::new()
        } else {
            self.store
                .mark_seen(conversation.id, message_ids, counterpart_id, Utc::now())
                .await?
        };

        // The viewer has the thread open; their counter resets either way.
        self.store
            .resolve_unread(conversation.id, viewer.role)
            .await?;

        if !seen.is_empty() {
            self.push_to(
                counterpart_id,
                ServerEvent::StatusUpdate {
                    message_ids: seen.clone(),
                    status: MessageStatus::Seen,
                },
            )
            .await;
        }

        Ok(seen)
    }

    /// Hide a message from the actor's own view. The counterpart's view is
    /// untouched, and only the actor's own connection hears about it.
    pub async fn delete_for_self(&self, actor: Identity, message_id: Uuid) -> AppResult<()> {
        let message = self
            .store
            .message(message_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let conversation = self
            .store
            .conversation(message.conversation_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !conversation.participant(actor.user_id) {
            return Err(AppError::Forbidden(
                "only conversation participants can delete messages".into(),
            ));
        }

        self.store.add_deleted_for(message_id, actor.user_id).await?;
        self.push_to(actor.user_id, ServerEvent::MessageDeleted { message_id })
            .await;
        Ok(())
    }

    /// Author-only global deletion: content is cleared for both parties and
    /// both active connections get a redaction signal.
    pub async fn delete_for_everyone(&self, actor: Identity, message_id: Uuid) -> AppResult<()> {
        let message = self
            .store
            .message(message_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if message.sender_id != actor.user_id {
            return Err(AppError::Forbidden(
                "only the author can delete for everyone".into(),
            ));
        }

        let message = self.store.tombstone(message_id).await?;
        let conversation = self
            .store
            .conversation(message.conversation_id)
            .await?
            .ok_or(AppError::NotFound)?;
        for party in [conversation.doctor_id, conversation.patient_id] {
            self.push_to(party, ServerEvent::MessageRedacted { message_id })
                .await;
        }
        Ok(())
    }

    /// Ordered thread between the viewer and the counterpart, filtered for
    /// the viewer: self-deleted messages are dropped, tombstones read empty.
    pub async fn thread(
        &self,
        viewer: Identity,
        counterpart_id: Uuid,
        page: ThreadPage,
    ) -> AppResult<Vec<MessageView>> {
        let (doctor_id, patient_id) =
            participant_pair(viewer.user_id, viewer.role, counterpart_id);
        let Some(conversation) = self
            .store
            .conversation_for_pair(doctor_id, patient_id)
            .await?
        else {
            return Ok(Vec::new());
        };

        let limit = page.limit.clamp(1, THREAD_PAGE_LIMIT);
        let messages = self
            .store
            .thread(conversation.id, limit, page.offset.max(0))
            .await?;
        Ok(messages
            .iter()
            .filter(|m| !m.hidden_for(viewer.user_id))
            .map(MessageView::from)
            .collect())
    }

    /// Conversation summaries for the caller, most recent first.
    pub async fn conversations(&self, viewer: Identity) -> AppResult<Vec<ConversationSummary>> {
        let conversations = self.store.conversations_for_user(viewer.user_id).await?;
        Ok(conversations
            .iter()
            .map(|c| summarize(c, viewer.role))
            .collect())
    }

    /// Fire-and-forget typing signal; dropped silently when the counterpart
    /// is offline.
    pub async fn typing(&self, from: Identity, counterpart_id: Uuid) {
        self.push_to(counterpart_id, ServerEvent::Typing { from: from.user_id })
            .await;
    }

    async fn push_to(&self, user_id: Uuid, event: ServerEvent) {
        if let Some(handle) = self.presence.lookup(user_id).await {
            if !handle.push(event) {
                tracing::debug!(%user_id, "dropped push to stale connection");
            }
        }
    }
}

fn summarize(conversation: &Conversation, viewer_role: UserRole) -> ConversationSummary {
    ConversationSummary {
        id: conversation.id,
        counterpart_id: conversation.counterpart_id(viewer_role),
        last_message_text: conversation.last_message_text.clone(),
        last_message_at: conversation.last_message_at,
        unread_count: conversation.unread_for(viewer_role),
    }
}
