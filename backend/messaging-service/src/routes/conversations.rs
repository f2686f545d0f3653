use axum::extract::State;
use axum::Json;

use crate::error::AppError;
use crate::middleware::auth::Identity;
use crate::services::chat_service::ConversationSummary;
use crate::state::AppState;

/// List the caller's conversations, most recently active first. The unread
/// count is the caller's own counter; the counterpart's is not exposed.
pub async fn list_conversations(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<Vec<ConversationSummary>>, AppError> {
    let summaries = state.chat.conversations(identity).await?;
    Ok(Json(summaries))
}
