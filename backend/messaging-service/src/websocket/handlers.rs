use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::middleware::auth::Identity;
use crate::models::conversation::UserRole;
use crate::presence::ConnectionHandle;
use crate::state::AppState;
use crate::websocket::events::ClientEvent;

/// Identity assertion for the socket; the gateway forwards it as query
/// parameters since browsers cannot set headers on a websocket upgrade.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub user_id: Uuid,
    pub role: UserRole,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, params, socket))
}

async fn handle_socket(state: AppState, params: WsParams, socket: WebSocket) {
    let identity = Identity {
        user_id: params.user_id,
        role: params.role,
    };
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = unbounded_channel();
    let handle = ConnectionHandle::new(tx);

    loop {
        tokio::select! {
            // Events queued for this client by the pipeline or the registry.
            maybe = rx.recv() => {
                let Some(event) = maybe else { break };
                match serde_json::to_string(&event) {
                    Ok(text) => {
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to serialize server event"),
                }
            }

            // Frames from the client.
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => handle_client_event(event, identity, &handle, &state).await,
                            Err(e) => debug!(error = %e, "ignoring unparseable client event"),
                        }
                    }
                    // Ping/Pong are answered by the framework.
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_))) => {}
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                }
            }
        }
    }

    // Connection loss unregisters this handle; in-flight seen/send work has
    // already completed against the store by the time we get here.
    state.presence.unregister(&handle).await;
}

async fn handle_client_event(
    event: ClientEvent,
    identity: Identity,
    handle: &ConnectionHandle,
    state: &AppState,
) {
    match event {
        ClientEvent::Announce => {
            state
                .presence
                .register(identity.user_id, identity.role, handle.clone())
                .await;
        }
        ClientEvent::Seen {
            message_ids,
            counterpart_id,
        } => {
            if let Err(e) = state
                .chat
                .mark_seen(identity, counterpart_id, &message_ids)
                .await
            {
                warn!(error = %e, user_id = %identity.user_id, "seen acknowledgement failed");
            }
        }
        ClientEvent::Typing { counterpart_id } => {
            state.chat.typing(identity, counterpart_id).await;
        }
    }
}
