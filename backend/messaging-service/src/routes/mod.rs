use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::logging;
use crate::state::AppState;
use crate::websocket::handlers::ws_handler;

pub mod conversations;
pub mod messages;

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/conversations", get(conversations::list_conversations))
        .route(
            "/conversations/:counterpart_id/messages",
            post(messages::send_message).get(messages::get_thread),
        )
        .route("/messages/:message_id", delete(messages::delete_message))
        .route("/ws", get(ws_handler));

    let router = Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health));

    logging::add_tracing(router)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
