//! Non-durable backend. One mutex-guarded map doubles as the single-writer
//! serialization point for first-contact races; the guard is never held
//! across an await.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{normalize_pair, Conversation, Message};
use crate::store::{ConversationStore, MessageStore, CONVERSATION_LIST_LIMIT};

#[derive(Default)]
struct Inner {
    by_pair: HashMap<(Uuid, Uuid), Uuid>,
    conversations: HashMap<Uuid, Conversation>,
    // Messages per conversation, already in append order.
    messages: HashMap<Uuid, Vec<Message>>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn get_or_create(&self, a: Uuid, b: Uuid) -> Result<Conversation, AppError> {
        if a == b {
            return Err(AppError::BadRequest(
                "a conversation requires two distinct users".into(),
            ));
        }
        let pair = normalize_pair(a, b);
        let mut inner = self.lock();
        if let Some(id) = inner.by_pair.get(&pair) {
            let id = *id;
            return Ok(inner.conversations[&id].clone());
        }
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_lo: pair.0,
            user_hi: pair.1,
            last_message_preview: String::new(),
            updated_at: Utc::now(),
        };
        inner.by_pair.insert(pair, conversation.id);
        inner.messages.insert(conversation.id, Vec::new());
        inner
            .conversations
            .insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn find(&self, a: Uuid, b: Uuid) -> Result<Option<Conversation>, AppError> {
        let pair = normalize_pair(a, b);
        let inner = self.lock();
        Ok(inner
            .by_pair
            .get(&pair)
            .map(|id| inner.conversations[id].clone()))
    }

    async fn touch(
        &self,
        conversation_id: Uuid,
        preview: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut inner = self.lock();
        let conversation = inner
            .conversations
            .get_mut(&conversation_id)
            .ok_or(AppError::NotFound)?;
        conversation.last_message_preview = preview.to_string();
        if at > conversation.updated_at {
            conversation.updated_at = at;
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>, AppError> {
        let inner = self.lock();
        let mut out: Vec<Conversation> = inner
            .conversations
            .values()
            .filter(|c| c.user_lo == user_id || c.user_hi == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        out.truncate(CONVERSATION_LIST_LIMIT);
        Ok(out)
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<Message, AppError> {
        let mut inner = self.lock();
        let messages = inner
            .messages
            .get_mut(&conversation_id)
            .ok_or(AppError::NotFound)?;
        let (last_at, last_seq) = messages
            .last()
            .map(|m| (m.sent_at, m.seq))
            .unwrap_or((DateTime::<Utc>::MIN_UTC, 0));
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id,
            receiver_id,
            content: content.to_string(),
            // Clamp forward: sent_at never regresses within a conversation.
            sent_at: if at > last_at { at } else { last_at },
            seq: last_seq + 1,
            read: false,
        };
        messages.push(message.clone());
        Ok(message)
    }

    async fn history(&self, conversation_id: Uuid) -> Result<Vec<Message>, AppError> {
        let inner = self.lock();
        inner
            .messages
            .get(&conversation_id)
            .cloned()
            .ok_or(AppError::NotFound)
    }

    async fn mark_read(&self, conversation_id: Uuid, viewer: Uuid) -> Result<(), AppError> {
        let mut inner = self.lock();
        let messages = inner
            .messages
            .get_mut(&conversation_id)
            .ok_or(AppError::NotFound)?;
        for message in messages.iter_mut().filter(|m| m.receiver_id == viewer) {
            message.read = true;
        }
        Ok(())
    }

    async fn unread_counts(&self, user_id: Uuid) -> Result<HashMap<Uuid, i64>, AppError> {
        let inner = self.lock();
        let mut counts = HashMap::new();
        for message in inner.messages.values().flatten() {
            if message.receiver_id == user_id && !message.read {
                *counts.entry(message.sender_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn concurrent_get_or_create_yields_one_conversation() {
        let store = Arc::new(MemoryStore::new());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            // Half the callers pass the pair reversed.
            let (x, y) = if i % 2 == 0 { (a, b) } else { (b, a) };
            handles.push(tokio::spawn(async move {
                store.get_or_create(x, y).await.map(|c| c.id)
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1, "all racing callers share one conversation");
        assert_eq!(store.list_for_user(a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_or_create_rejects_self_pair() {
        let store = MemoryStore::new();
        let a = Uuid::new_v4();
        assert!(matches!(
            store.get_or_create(a, a).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn append_clamps_sent_at_forward() {
        let store = MemoryStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let conv = store.get_or_create(a, b).await.unwrap();

        let later = Utc::now();
        let earlier = later - chrono::Duration::seconds(30);
        let first = store.append(conv.id, a, b, "first", later).await.unwrap();
        let second = store.append(conv.id, a, b, "second", earlier).await.unwrap();

        assert!(second.sent_at >= first.sent_at);
        assert_eq!(second.seq, first.seq + 1);

        let history = store.history(conv.id).await.unwrap();
        assert_eq!(
            history.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
            vec!["first", "second"]
        );
    }

    #[tokio::test]
    async fn unread_scan_and_idempotent_mark_read() {
        let store = MemoryStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let conv = store.get_or_create(a, b).await.unwrap();

        store.append(conv.id, a, b, "hello", Utc::now()).await.unwrap();
        store.append(conv.id, a, b, "again", Utc::now()).await.unwrap();
        store.append(conv.id, b, a, "reply", Utc::now()).await.unwrap();

        let counts = store.unread_counts(b).await.unwrap();
        assert_eq!(counts.get(&a), Some(&2));
        let counts = store.unread_counts(a).await.unwrap();
        assert_eq!(counts.get(&b), Some(&1));

        store.mark_read(conv.id, b).await.unwrap();
        store.mark_read(conv.id, b).await.unwrap();
        assert!(store.unread_counts(b).await.unwrap().is_empty());
        // The sender's own unread state is untouched.
        assert_eq!(store.unread_counts(a).await.unwrap().get(&b), Some(&1));

        let history = store.history(conv.id).await.unwrap();
        assert!(history
            .iter()
            .filter(|m| m.receiver_id == b)
            .all(|m| m.read));
    }

    #[tokio::test]
    async fn list_for_user_orders_by_recent_activity() {
        let store = MemoryStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        let with_b = store.get_or_create(a, b).await.unwrap();
        let with_c = store.get_or_create(a, c).await.unwrap();

        let now = Utc::now();
        store.touch(with_b.id, "old", now).await.unwrap();
        store
            .touch(with_c.id, "new", now + chrono::Duration::seconds(1))
            .await
            .unwrap();

        let listed = store.list_for_user(a).await.unwrap();
        assert_eq!(
            listed.iter().map(|c| c.id).collect::<Vec<_>>(),
            vec![with_c.id, with_b.id]
        );
    }

    #[tokio::test]
    async fn list_for_user_is_capped_at_the_shared_limit() {
        let store = MemoryStore::new();
        let hub = Uuid::new_v4();
        for _ in 0..CONVERSATION_LIST_LIMIT + 5 {
            store.get_or_create(hub, Uuid::new_v4()).await.unwrap();
        }
        let listed = store.list_for_user(hub).await.unwrap();
        assert_eq!(listed.len(), CONVERSATION_LIST_LIMIT);
    }

    #[tokio::test]
    async fn append_to_unknown_conversation_is_not_found() {
        let store = MemoryStore::new();
        let result = store
            .append(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), "x", Utc::now())
            .await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn find_without_conversation_is_none() {
        let store = MemoryStore::new();
        assert!(store
            .find(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }
}
