use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::directory::UserDirectory;
use crate::error::{AppError, AppResult};
use crate::models::{ConversationSummary, MessageDto};
use crate::store::{ConversationStore, MessageStore};
use crate::websocket::message_types::WsOutboundEvent;
use crate::websocket::ConnectionRegistry;

/// Request-facing orchestration over the stores, the user directory and the
/// live-channel registry: send, history, conversation list, unread counts.
pub struct MessagingService {
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageStore>,
    directory: Arc<dyn UserDirectory>,
    registry: ConnectionRegistry,
    store_timeout: Duration,
}

impl MessagingService {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        messages: Arc<dyn MessageStore>,
        directory: Arc<dyn UserDirectory>,
        registry: ConnectionRegistry,
        store_timeout: Duration,
    ) -> Self {
        Self {
            conversations,
            messages,
            directory,
            registry,
            store_timeout,
        }
    }

    /// Bound a store call so an unresponsive backend surfaces as
    /// StoreUnavailable instead of hanging the caller's task.
    async fn bounded<T, F>(&self, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::StoreUnavailable("store call timed out".into())),
        }
    }

    /// Persist a message and push it live to both participants. If the
    /// append fails nothing is broadcast and the error surfaces to the
    /// caller; there is no automatic retry.
    pub async fn send(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: &str,
    ) -> AppResult<MessageDto> {
        if content.trim().is_empty() {
            return Err(AppError::BadRequest("message content cannot be empty".into()));
        }
        if sender_id == receiver_id {
            return Err(AppError::BadRequest("sender and receiver must differ".into()));
        }
        if !self.bounded(self.directory.exists(receiver_id)).await? {
            return Err(AppError::BadRequest("unknown receiver".into()));
        }

        let conversation = self
            .bounded(self.conversations.get_or_create(sender_id, receiver_id))
            .await?;
        let message = self
            .bounded(self.messages.append(
                conversation.id,
                sender_id,
                receiver_id,
                content,
                Utc::now(),
            ))
            .await?;
        self.bounded(
            self.conversations
                .touch(conversation.id, &message.content, message.sent_at),
        )
        .await?;

        let sender_name = self.name_or_id(sender_id).await?;
        let receiver_name = self.name_or_id(receiver_id).await?;
        let dto = MessageDto::new(message, sender_name, receiver_name);

        // Live push is best-effort: participants with no open sessions simply
        // read the message from history later.
        if let Ok(payload) = serde_json::to_string(&WsOutboundEvent::ReceiveMessage {
            message: dto.clone(),
        }) {
            self.registry
                .broadcast(&[sender_id, receiver_id], &payload)
                .await;
        }
        info!(
            conversation = %dto.conversation_id,
            sender = %sender_id,
            receiver = %receiver_id,
            "message persisted"
        );
        Ok(dto)
    }

    /// Ordered history with `peer_id`; an empty list when no conversation
    /// exists yet. Viewing is what resets the unread count for this peer.
    pub async fn fetch_history(
        &self,
        viewer_id: Uuid,
        peer_id: Uuid,
    ) -> AppResult<Vec<MessageDto>> {
        let Some(conversation) = self
            .bounded(self.conversations.find(viewer_id, peer_id))
            .await?
        else {
            return Ok(Vec::new());
        };

        self.bounded(self.messages.mark_read(conversation.id, viewer_id))
            .await?;
        let history = self.bounded(self.messages.history(conversation.id)).await?;

        let viewer_name = self.name_or_id(viewer_id).await?;
        let peer_name = self.name_or_id(peer_id).await?;
        let name_of = |id: Uuid| {
            if id == viewer_id {
                viewer_name.clone()
            } else {
                peer_name.clone()
            }
        };
        Ok(history
            .into_iter()
            .map(|m| {
                let sender_name = name_of(m.sender_id);
                let receiver_name = name_of(m.receiver_id);
                MessageDto::new(m, sender_name, receiver_name)
            })
            .collect())
    }

    /// Conversation list for the viewer, most recently active first.
    pub async fn fetch_conversation_list(
        &self,
        viewer_id: Uuid,
    ) -> AppResult<Vec<ConversationSummary>> {
        let conversations = self
            .bounded(self.conversations.list_for_user(viewer_id))
            .await?;
        let mut out = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let peer_id = conversation.peer_of(viewer_id);
            out.push(ConversationSummary {
                peer_id,
                peer_display_name: self.name_or_id(peer_id).await?,
                last_message_preview: conversation.last_message_preview,
            });
        }
        Ok(out)
    }

    pub async fn fetch_unread_counts(&self, viewer_id: Uuid) -> AppResult<HashMap<Uuid, i64>> {
        self.bounded(self.messages.unread_counts(viewer_id)).await
    }

    async fn name_or_id(&self, user_id: Uuid) -> AppResult<String> {
        Ok(self
            .bounded(self.directory.display_name(user_id))
            .await?
            .unwrap_or_else(|| user_id.to_string()))
    }
}
