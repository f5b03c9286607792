use axum::extract::State;
use axum::{Extension, Json};
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::ConversationSummary;
use crate::state::AppState;

/// GET /api/conversations, newest activity first.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(viewer_id): Extension<Uuid>,
) -> AppResult<Json<Vec<ConversationSummary>>> {
    let summaries = state.messaging.fetch_conversation_list(viewer_id).await?;
    Ok(Json(summaries))
}
