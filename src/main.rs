use std::sync::Arc;

use tracing::{info, warn};

use dm_service::config::Config;
use dm_service::db::init_pool;
use dm_service::directory::{MemoryUserDirectory, PgUserDirectory, UserDirectory};
use dm_service::error::AppError;
use dm_service::logging::init_tracing;
use dm_service::routes::build_router;
use dm_service::services::MessagingService;
use dm_service::state::AppState;
use dm_service::store::memory::MemoryStore;
use dm_service::store::postgres::PgStore;
use dm_service::store::{ConversationStore, MessageStore};
use dm_service::websocket::ConnectionRegistry;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    init_tracing();
    let config = Arc::new(Config::from_env()?);

    let (conversations, messages, directory): (
        Arc<dyn ConversationStore>,
        Arc<dyn MessageStore>,
        Arc<dyn UserDirectory>,
    ) = match &config.database_url {
        Some(url) => {
            let pool = init_pool(url).await?;
            info!("connected to postgres, migrations applied");
            let store = Arc::new(PgStore::new(pool.clone()));
            (
                store.clone(),
                store,
                Arc::new(PgUserDirectory::new(pool)),
            )
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            (
                store.clone(),
                store,
                Arc::new(MemoryUserDirectory::permissive()),
            )
        }
    };

    let registry = ConnectionRegistry::new();
    let messaging = Arc::new(MessagingService::new(
        conversations,
        messages,
        directory,
        registry.clone(),
        config.store_timeout,
    ));
    let state = AppState {
        messaging,
        registry,
        config: config.clone(),
    };

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::StartServer(format!("failed to bind {addr}: {e}")))?;
    info!(%addr, "dm-service listening");

    axum::serve(listener, build_router(state))
        .await
        .map_err(|e| AppError::StartServer(e.to_string()))
}
