//! Postgres backend. Pair uniqueness is enforced by the UNIQUE (user_lo,
//! user_hi) index, so get-or-create is a single ON CONFLICT DO NOTHING
//! insert followed by a read; racing first messages converge on one row.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{normalize_pair, Conversation, Message};
use crate::store::{ConversationStore, MessageStore, CONVERSATION_LIST_LIMIT};

pub struct PgStore {
    db: Pool<Postgres>,
}

impl PgStore {
    pub fn new(db: Pool<Postgres>) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.db
    }
}

fn row_to_conversation(row: &sqlx::postgres::PgRow) -> Conversation {
    Conversation {
        id: row.get("id"),
        user_lo: row.get("user_lo"),
        user_hi: row.get("user_hi"),
        last_message_preview: row.get("last_message_preview"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_message(row: &sqlx::postgres::PgRow) -> Message {
    Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        content: row.get("content"),
        sent_at: row.get("sent_at"),
        seq: row.get("seq"),
        read: row.get("read"),
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn get_or_create(&self, a: Uuid, b: Uuid) -> Result<Conversation, AppError> {
        if a == b {
            return Err(AppError::BadRequest(
                "a conversation requires two distinct users".into(),
            ));
        }
        let (lo, hi) = normalize_pair(a, b);
        sqlx::query(
            "INSERT INTO conversations (id, user_lo, user_hi) VALUES ($1, $2, $3) \
             ON CONFLICT (user_lo, user_hi) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(lo)
        .bind(hi)
        .execute(&self.db)
        .await?;

        let row = sqlx::query(
            "SELECT id, user_lo, user_hi, last_message_preview, updated_at \
             FROM conversations WHERE user_lo = $1 AND user_hi = $2",
        )
        .bind(lo)
        .bind(hi)
        .fetch_one(&self.db)
        .await?;
        Ok(row_to_conversation(&row))
    }

    async fn find(&self, a: Uuid, b: Uuid) -> Result<Option<Conversation>, AppError> {
        let (lo, hi) = normalize_pair(a, b);
        let row = sqlx::query(
            "SELECT id, user_lo, user_hi, last_message_preview, updated_at \
             FROM conversations WHERE user_lo = $1 AND user_hi = $2",
        )
        .bind(lo)
        .bind(hi)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.as_ref().map(row_to_conversation))
    }

    async fn touch(
        &self,
        conversation_id: Uuid,
        preview: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE conversations \
             SET last_message_preview = $2, updated_at = GREATEST(updated_at, $3) \
             WHERE id = $1",
        )
        .bind(conversation_id)
        .bind(preview)
        .bind(at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>, AppError> {
        let rows = sqlx::query(
            "SELECT id, user_lo, user_hi, last_message_preview, updated_at \
             FROM conversations \
             WHERE user_lo = $1 OR user_hi = $1 \
             ORDER BY updated_at DESC \
             LIMIT $2",
        )
        .bind(user_id)
        .bind(CONVERSATION_LIST_LIMIT as i64)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.iter().map(row_to_conversation).collect())
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn append(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<Message, AppError> {
        let mut tx = self.db.begin().await?;

        // Lock the conversation row so clamp + seq assignment are serialized
        // per conversation without blocking unrelated conversations.
        let locked = sqlx::query("SELECT id FROM conversations WHERE id = $1 FOR UPDATE")
            .bind(conversation_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(AppError::NotFound);
        }

        let row = sqlx::query(
            "SELECT COALESCE(MAX(sent_at), 'epoch'::timestamptz) AS last_at, \
                    COALESCE(MAX(seq), 0) AS last_seq \
             FROM messages WHERE conversation_id = $1",
        )
        .bind(conversation_id)
        .fetch_one(&mut *tx)
        .await?;
        let last_at: DateTime<Utc> = row.get("last_at");
        let last_seq: i64 = row.get("last_seq");

        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            receiver_id,
            content: content.to_string(),
            sent_at: if at > last_at { at } else { last_at },
            seq: last_seq + 1,
            read: false,
        };
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, sender_id, receiver_id, content, sent_at, seq) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(&message.content)
        .bind(message.sent_at)
        .bind(message.seq)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(message)
    }

    async fn history(&self, conversation_id: Uuid) -> Result<Vec<Message>, AppError> {
        let known: Option<i32> = sqlx::query_scalar("SELECT 1 FROM conversations WHERE id = $1")
            .bind(conversation_id)
            .fetch_optional(&self.db)
            .await?;
        if known.is_none() {
            return Err(AppError::NotFound);
        }
        let rows = sqlx::query(
            "SELECT id, conversation_id, sender_id, receiver_id, content, sent_at, seq, read \
             FROM messages \
             WHERE conversation_id = $1 \
             ORDER BY sent_at ASC, seq ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.iter().map(row_to_message).collect())
    }

    async fn mark_read(&self, conversation_id: Uuid, viewer: Uuid) -> Result<(), AppError> {
        // An UPDATE touching 0 rows cannot distinguish an unknown
        // conversation from an already-read one, so check existence first.
        let known: Option<i32> = sqlx::query_scalar("SELECT 1 FROM conversations WHERE id = $1")
            .bind(conversation_id)
            .fetch_optional(&self.db)
            .await?;
        if known.is_none() {
            return Err(AppError::NotFound);
        }
        let result = sqlx::query(
            "UPDATE messages SET read = TRUE \
             WHERE conversation_id = $1 AND receiver_id = $2 AND read = FALSE",
        )
        .bind(conversation_id)
        .bind(viewer)
        .execute(&self.db)
        .await?;
        tracing::debug!(
            conversation = %conversation_id,
            viewer = %viewer,
            marked = result.rows_affected(),
            "unread messages marked read"
        );
        Ok(())
    }

    async fn unread_counts(&self, user_id: Uuid) -> Result<HashMap<Uuid, i64>, AppError> {
        let rows = sqlx::query(
            "SELECT sender_id, COUNT(*) AS unread \
             FROM messages \
             WHERE receiver_id = $1 AND read = FALSE \
             GROUP BY sender_id",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get("sender_id"), row.get("unread")))
            .collect())
    }
}
