use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;

use crate::middleware::auth::auth_middleware;
use crate::state::AppState;
use crate::websocket::handlers::ws_handler;

pub mod conversations;
pub mod messages;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/conversations", get(conversations::list_conversations))
        .route("/api/messages/unread", get(messages::unread_counts))
        .route("/api/messages/:peer_id", get(messages::history))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(api)
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}
