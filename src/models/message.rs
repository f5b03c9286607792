use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One persisted unit of sent content. `sent_at` is server-assigned and
/// non-decreasing within a conversation; `seq` records insertion order and
/// breaks timestamp ties.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub seq: i64,
    pub read: bool,
}

/// Wire shape for history responses and `receive_message` events, with
/// sender/receiver resolved to display names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDto {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub receiver_id: Uuid,
    pub receiver_name: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub read: bool,
}

impl MessageDto {
    pub fn new(message: Message, sender_name: String, receiver_name: String) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            sender_name,
            receiver_id: message.receiver_id,
            receiver_name,
            content: message.content,
            sent_at: message.sent_at,
            read: message.read,
        }
    }
}
