use std::net::SocketAddr;
use std::sync::Arc;

use jsonwebtoken::{encode, EncodingKey, Header};
use uuid::Uuid;

use dm_service::config::Config;
use dm_service::directory::MemoryUserDirectory;
use dm_service::middleware::auth::Claims;
use dm_service::routes::build_router;
use dm_service::services::MessagingService;
use dm_service::state::AppState;
use dm_service::store::memory::MemoryStore;
use dm_service::websocket::ConnectionRegistry;

pub const TEST_SECRET: &str = "test-secret";

pub struct TestApp {
    pub addr: SocketAddr,
    pub directory: Arc<MemoryUserDirectory>,
    pub messaging: Arc<MessagingService>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    #[allow(dead_code)]
    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }

    /// Register a user in the in-memory directory and hand back its id.
    pub fn register_user(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.directory.insert(id, name);
        id
    }
}

/// Boot the full service on an ephemeral port, backed by the in-memory
/// store and directory.
pub async fn spawn_app() -> TestApp {
    let config = Arc::new(Config::test_defaults());
    let store = Arc::new(MemoryStore::new());
    let directory = Arc::new(MemoryUserDirectory::new());
    let registry = ConnectionRegistry::new();
    let messaging = Arc::new(MessagingService::new(
        store.clone(),
        store,
        directory.clone(),
        registry.clone(),
        config.store_timeout,
    ));
    let state = AppState {
        messaging: messaging.clone(),
        registry,
        config,
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, build_router(state))
            .await
            .expect("serve");
    });

    TestApp {
        addr,
        directory,
        messaging,
    }
}

/// Sign a token the way the external credential service would.
pub fn token_for(user_id: Uuid) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("sign test token")
}
