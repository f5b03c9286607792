use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::middleware::auth::authenticated_user;
use crate::state::AppState;
use crate::websocket::message_types::{WsInboundEvent, WsOutboundEvent};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// GET /ws — live channel upgrade. The connection's identity comes from the
/// verified token, never from anything the client sends on the socket.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let token = params.token.clone().or_else(|| {
        headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|s| s.to_string())
    });

    let user_id = match token
        .as_deref()
        .map(|t| authenticated_user(t, &state.config.jwt_secret))
    {
        Some(Ok(id)) => id,
        _ => {
            warn!("live channel rejected: missing or invalid token");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(state, user_id, socket))
}

async fn handle_socket(state: AppState, user_id: Uuid, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (session_id, mut rx) = state.registry.join(user_id).await;
    debug!(user = %user_id, "live channel open");

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                match outgoing {
                    Some(payload) => {
                        if sender.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(raw))) => {
                        if let Some(reply) = handle_event(&state, user_id, &raw).await {
                            match serde_json::to_string(&reply) {
                                Ok(json) => {
                                    if sender.send(Message::Text(json)).await.is_err() {
                                        break;
                                    }
                                }
                                Err(e) => warn!(error = %e, "failed to serialize ws reply"),
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    // Ping/pong handled by the framework; binary ignored.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    // Stops further delivery to this session only; an in-flight send that
    // already persisted is not rolled back.
    state.registry.leave(user_id, session_id).await;
    debug!(user = %user_id, "live channel closed");
}

/// Dispatch one inbound event. A returned event goes back to this connection
/// only; fan-out of accepted messages happens inside the facade.
async fn handle_event(state: &AppState, session_user: Uuid, raw: &str) -> Option<WsOutboundEvent> {
    let event = match serde_json::from_str::<WsInboundEvent>(raw) {
        Ok(event) => event,
        Err(e) => {
            return Some(WsOutboundEvent::Error {
                code: "bad_event".into(),
                message: format!("unparseable event: {e}"),
            })
        }
    };

    match event {
        WsInboundEvent::Join { user_id } => {
            if user_id == session_user {
                Some(WsOutboundEvent::Joined { user_id })
            } else {
                warn!(session = %session_user, claimed = %user_id, "join with foreign identity rejected");
                Some(WsOutboundEvent::Error {
                    code: "identity_mismatch".into(),
                    message: "join must name the authenticated user".into(),
                })
            }
        }
        WsInboundEvent::SendMessage {
            sender_id,
            receiver_id,
            content,
        } => {
            if sender_id != session_user {
                warn!(session = %session_user, claimed = %sender_id, "spoofed sender rejected");
                return Some(WsOutboundEvent::Error {
                    code: "identity_mismatch".into(),
                    message: "sender must be the authenticated user".into(),
                });
            }
            match state.messaging.send(session_user, receiver_id, &content).await {
                // The facade already fanned receive_message out to both sides.
                Ok(_) => None,
                Err(e) => {
                    if e.is_internal() {
                        warn!(error = %e, "send over live channel failed");
                    }
                    Some(WsOutboundEvent::Error {
                        code: "send_failed".into(),
                        message: e.client_message(),
                    })
                }
            }
        }
    }
}
