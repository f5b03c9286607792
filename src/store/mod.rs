use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Conversation, Message};

pub mod memory;
pub mod postgres;

/// Cap on `list_for_user` results, shared by every backend. The list surface
/// has no pagination; older conversations stay reachable through history.
pub const CONVERSATION_LIST_LIMIT: usize = 100;

/// Owns the pair-to-conversation mapping and its metadata.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Atomic insert-if-absent on the normalized pair: every caller racing
    /// on first contact must end up holding the same conversation record.
    /// Fails with a validation error when `a == b`.
    async fn get_or_create(&self, a: Uuid, b: Uuid) -> Result<Conversation, AppError>;

    /// Resolve the pair's conversation without creating one.
    async fn find(&self, a: Uuid, b: Uuid) -> Result<Option<Conversation>, AppError>;

    /// Refresh preview and activity timestamp after a new message.
    async fn touch(
        &self,
        conversation_id: Uuid,
        preview: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// All conversations involving `user_id`, most recently active first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>, AppError>;
}

/// Owns the ordered message records of a conversation, including the unread
/// scan that backs per-peer counters.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist one message. `at` is clamped forward so `sent_at` never
    /// regresses within the conversation; `seq` records insertion order.
    async fn append(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<Message, AppError>;

    /// Full history, ascending by (sent_at, seq). Re-callable.
    async fn history(&self, conversation_id: Uuid) -> Result<Vec<Message>, AppError>;

    /// Flip read=true on every message in the conversation addressed to
    /// `viewer`. Idempotent.
    async fn mark_read(&self, conversation_id: Uuid, viewer: Uuid) -> Result<(), AppError>;

    /// Peer id -> count of messages where receiver=user, read=false.
    async fn unread_counts(&self, user_id: Uuid) -> Result<HashMap<Uuid, i64>, AppError>;
}
