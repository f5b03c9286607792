use std::sync::Arc;

use crate::config::Config;
use crate::services::MessagingService;
use crate::websocket::ConnectionRegistry;

/// Shared state handed to every handler. Cheap to clone; the registry is
/// internally reference counted.
#[derive(Clone)]
pub struct AppState {
    pub messaging: Arc<MessagingService>,
    pub registry: ConnectionRegistry,
    pub config: Arc<Config>,
}
