use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::{Extension, Json};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::MessageDto;
use crate::state::AppState;

/// GET /api/messages/unread, per-sender unread counts for the caller.
pub async fn unread_counts(
    State(state): State<AppState>,
    Extension(viewer_id): Extension<Uuid>,
) -> AppResult<Json<HashMap<Uuid, i64>>> {
    let counts = state.messaging.fetch_unread_counts(viewer_id).await?;
    Ok(Json(counts))
}

/// GET /api/messages/:peer_id, full ordered history with that peer.
/// Fetching marks the peer's messages read for the caller.
pub async fn history(
    State(state): State<AppState>,
    Extension(viewer_id): Extension<Uuid>,
    Path(peer_id): Path<Uuid>,
) -> AppResult<Json<Vec<MessageDto>>> {
    let messages = state.messaging.fetch_history(viewer_id, peer_id).await?;
    Ok(Json(messages))
}
