//! Postgres record store.
//!
//! Single-statement updates carry the concurrency guarantees: unread
//! counters are SQL-side increments, status transitions are guarded by
//! `WHERE` clauses, and the pair uniqueness lives in a unique index.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::conversation::{Conversation, UserRole};
use crate::models::message::{Message, MessageStatus};
use crate::store::{NewMessage, RecordStore};

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, sender_role, text, \
     attachment_url, status, created_at, delivered_at, seen_at, deleted_for, tombstoned";

const CONVERSATION_COLUMNS: &str = "id, doctor_id, patient_id, last_message_text, \
     last_message_at, unread_doctor, unread_patient, created_at, updated_at";

pub struct PgRecordStore {
    db: Pool<Postgres>,
}

impl PgRecordStore {
    pub fn new(db: Pool<Postgres>) -> Self {
        Self { db }
    }
}

fn decode<T: std::error::Error + Send + Sync + 'static>(e: T) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(e))
}

fn row_to_message(r: &PgRow) -> Result<Message, sqlx::Error> {
    let sender_role: String = r.try_get("sender_role")?;
    let status: String = r.try_get("status")?;
    Ok(Message {
        id: r.try_get("id")?,
        conversation_id: r.try_get("conversation_id")?,
        sender_id: r.try_get("sender_id")?,
        sender_role: sender_role.parse::<UserRole>().map_err(decode)?,
        text: r.try_get("text")?,
        attachment_url: r.try_get("attachment_url")?,
        status: status.parse::<MessageStatus>().map_err(decode)?,
        created_at: r.try_get("created_at")?,
        delivered_at: r.try_get("delivered_at")?,
        seen_at: r.try_get("seen_at")?,
        deleted_for: r.try_get("deleted_for")?,
        tombstoned: r.try_get("tombstoned")?,
    })
}

fn row_to_conversation(r: &PgRow) -> Result<Conversation, sqlx::Error> {
    Ok(Conversation {
        id: r.try_get("id")?,
        doctor_id: r.try_get("doctor_id")?,
        patient_id: r.try_get("patient_id")?,
        last_message_text: r.try_get("last_message_text")?,
        last_message_at: r.try_get("last_message_at")?,
        unread_doctor: r.try_get("unread_doctor")?,
        unread_patient: r.try_get("unread_patient")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn ensure_conversation(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
    ) -> AppResult<Conversation> {
        sqlx::query(
            "INSERT INTO conversations (id, doctor_id, patient_id) VALUES ($1, $2, $3) \
             ON CONFLICT (doctor_id, patient_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(doctor_id)
        .bind(patient_id)
        .execute(&self.db)
        .await?;

        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             WHERE doctor_id = $1 AND patient_id = $2"
        ))
        .bind(doctor_id)
        .bind(patient_id)
        .fetch_one(&self.db)
        .await?;
        Ok(row_to_conversation(&row)?)
    }

    async fn conversation(&self, id: Uuid) -> AppResult<Option<Conversation>> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.as_ref().map(row_to_conversation).transpose()?)
    }

    async fn conversation_for_pair(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
    ) -> AppResult<Option<Conversation>> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             WHERE doctor_id = $1 AND patient_id = $2"
        ))
        .bind(doctor_id)
        .bind(patient_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.as_ref().map(row_to_conversation).transpose()?)
    }

    async fn conversations_for_user(&self, user_id: Uuid) -> AppResult<Vec<Conversation>> {
        let rows = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             WHERE doctor_id = $1 OR patient_id = $1 \
             ORDER BY updated_at DESC \
             LIMIT 100"
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows
            .iter()
            .map(row_to_conversation)
            .collect::<Result<_, _>>()?)
    }

    async fn record_send(
        &self,
        conversation_id: Uuid,
        preview: &str,
        sender_role: UserRole,
        sent_at: DateTime<Utc>,
    ) -> AppResult<()> {
        // Last-writer-wins guard on the last-message fields.
        sqlx::query(
            "UPDATE conversations \
             SET last_message_text = $2, last_message_at = $3, updated_at = NOW() \
             WHERE id = $1 AND (last_message_at IS NULL OR last_message_at <= $3)",
        )
        .bind(conversation_id)
        .bind(preview)
        .bind(sent_at)
        .execute(&self.db)
        .await?;

        // Unconditional SQL-side increment: racing sends lose neither count.
        let unread_column = match sender_role {
            UserRole::Doctor => "unread_patient",
            UserRole::Patient => "unread_doctor",
        };
        sqlx::query(&format!(
            "UPDATE conversations SET {unread_column} = {unread_column} + 1, \
             updated_at = NOW() WHERE id = $1"
        ))
        .bind(conversation_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn resolve_unread(&self, conversation_id: Uuid, viewer_role: UserRole) -> AppResult<()> {
        let unread_column = match viewer_role {
            UserRole::Doctor => "unread_doctor",
            UserRole::Patient => "unread_patient",
        };
        sqlx::query(&format!(
            "UPDATE conversations SET {unread_column} = 0 WHERE id = $1"
        ))
        .bind(conversation_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn insert_message(&self, new: NewMessage) -> AppResult<Message> {
        let row = sqlx::query(&format!(
            "INSERT INTO messages (id, conversation_id, sender_id, sender_role, text, attachment_url) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new.conversation_id)
        .bind(new.sender_id)
        .bind(new.sender_role.as_str())
        .bind(&new.text)
        .bind(&new.attachment_url)
        .fetch_one(&self.db)
        .await?;
        Ok(row_to_message(&row)?)
    }

    async fn message(&self, id: Uuid) -> AppResult<Option<Message>> {
        let row = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.as_ref().map(row_to_message).transpose()?)
    }

    async fn thread(
        &self,
        conversation_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<Message>> {
        let rows = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE conversation_id = $1 \
             ORDER BY created_at ASC, id ASC \
             LIMIT $2 OFFSET $3"
        ))
        .bind(conversation_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.iter().map(row_to_message).collect::<Result<_, _>>()?)
    }

    async fn mark_delivered(
        &self,
        message_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Message>> {
        let row = sqlx::query(&format!(
            "UPDATE messages SET status = 'delivered', delivered_at = $2 \
             WHERE id = $1 AND status = 'sent' AND NOT tombstoned \
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(message_id)
        .bind(at)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.as_ref().map(row_to_message).transpose()?)
    }

    async fn mark_seen(
        &self,
        conversation_id: Uuid,
        message_ids: &[Uuid],
        author_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<Uuid>> {
        let rows = sqlx::query(
            "UPDATE messages SET status = 'seen', seen_at = $4 \
             WHERE conversation_id = $1 AND id = ANY($2) AND sender_id = $3 \
               AND status <> 'seen' AND NOT tombstoned \
             RETURNING id",
        )
        .bind(conversation_id)
        .bind(message_ids.to_vec())
        .bind(author_id)
        .bind(at)
        .fetch_all(&self.db)
        .await?;
        Ok(rows
            .iter()
            .map(|r| r.try_get("id"))
            .collect::<Result<_, sqlx::Error>>()?)
    }

    async fn add_deleted_for(&self, message_id: Uuid, actor_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE messages SET deleted_for = array_append(deleted_for, $2) \
             WHERE id = $1 AND NOT ($2 = ANY(deleted_for))",
        )
        .bind(message_id)
        .bind(actor_id)
        .execute(&self.db)
        .await?;
        // Zero rows is fine when the actor already hid the message, but a
        // missing message should surface.
        if result.rows_affected() == 0 && self.message(message_id).await?.is_none() {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn tombstone(&self, message_id: Uuid) -> AppResult<Message> {
        let row = sqlx::query(&format!(
            "UPDATE messages SET tombstoned = TRUE, text = NULL, attachment_url = NULL \
             WHERE id = $1 \
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(message_id)
        .fetch_optional(&self.db)
        .await?;
        match row {
            Some(row) => Ok(row_to_message(&row)?),
            None => Err(AppError::NotFound),
        }
    }
}
