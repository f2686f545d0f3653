use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::Identity;
use crate::models::message::MessageView;
use crate::services::chat_service::{OutgoingContent, ThreadPage};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: Option<String>,
    pub attachment_url: Option<String>,
    /// Client-generated optimistic ID. Echoed back verbatim so the client
    /// can swap its provisional entry for the canonical message; it is never
    /// persisted and never appears in a status update.
    pub provisional_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message: MessageView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisional_id: Option<String>,
}

pub async fn send_message(
    State(state): State<AppState>,
    identity: Identity,
    Path(counterpart_id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    let message = state
        .chat
        .send(
            identity,
            counterpart_id,
            OutgoingContent {
                text: body.text,
                attachment_url: body.attachment_url,
            },
        )
        .await?;
    Ok(Json(SendMessageResponse {
        message: MessageView::from(&message),
        provisional_id: body.provisional_id,
    }))
}

#[derive(Debug, Deserialize, Default)]
pub struct ThreadQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn get_thread(
    State(state): State<AppState>,
    identity: Identity,
    Path(counterpart_id): Path<Uuid>,
    Query(query): Query<ThreadQuery>,
) -> Result<Json<Vec<MessageView>>, AppError> {
    let defaults = ThreadPage::default();
    let page = ThreadPage {
        limit: query.limit.unwrap_or(defaults.limit),
        offset: query.offset.unwrap_or(defaults.offset),
    };
    let thread = state.chat.thread(identity, counterpart_id, page).await?;
    Ok(Json(thread))
}

/// Deletion scope, dispatched to two distinct operations. The wire carries a
/// `mode` discriminator; below this DTO everything is statically typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    Me,
    Everyone,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMessageRequest {
    pub mode: DeleteMode,
}

pub async fn delete_message(
    State(state): State<AppState>,
    identity: Identity,
    Path(message_id): Path<Uuid>,
    Json(body): Json<DeleteMessageRequest>,
) -> Result<StatusCode, AppError> {
    match body.mode {
        DeleteMode::Me => state.chat.delete_for_self(identity, message_id).await?,
        DeleteMode::Everyone => {
            state
                .chat
                .delete_for_everyone(identity, message_id)
                .await?
        }
    }
    Ok(StatusCode::NO_CONTENT)
}
