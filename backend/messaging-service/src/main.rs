use std::sync::Arc;

use carelink_messaging::{
    config::Config,
    db, error, logging,
    presence::PresenceRegistry,
    routes,
    services::chat_service::ChatService,
    state::AppState,
    store::{MemoryStore, PgRecordStore, RecordStore},
};

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(Config::from_env()?);

    let store: Arc<dyn RecordStore> = match cfg.database_url.as_deref() {
        Some(url) => {
            let pool = db::init_pool(url)
                .await
                .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;
            // Run embedded migrations (idempotent); schema drift is fatal.
            db::MIGRATOR
                .run(&pool)
                .await
                .map_err(|e| {
                    error::AppError::StartServer(format!("database migrations failed: {e}"))
                })?;
            Arc::new(PgRecordStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory record store");
            Arc::new(MemoryStore::new())
        }
    };

    let presence = PresenceRegistry::new();
    let chat = ChatService::new(store, presence.clone());
    let state = AppState {
        chat,
        presence,
        config: cfg.clone(),
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting carelink-messaging");

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;
    axum::serve(listener, routes::router(state))
        .await
        .map_err(|e| error::AppError::StartServer(e.to_string()))?;

    Ok(())
}
