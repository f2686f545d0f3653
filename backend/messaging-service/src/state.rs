use crate::{config::Config, presence::PresenceRegistry, services::chat_service::ChatService};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub chat: ChatService,
    pub presence: PresenceRegistry,
    pub config: Arc<Config>,
}
