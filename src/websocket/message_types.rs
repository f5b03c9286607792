use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::MessageDto;

/// Inbound live-channel events, client to server.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsInboundEvent {
    /// Handshake ack. The connection is registered under the token-derived
    /// identity at upgrade; a join naming anyone else is rejected, never
    /// honored.
    #[serde(rename = "join")]
    Join { user_id: Uuid },

    #[serde(rename = "send_message")]
    SendMessage {
        sender_id: Uuid,
        receiver_id: Uuid,
        content: String,
    },
}

/// Outbound live-channel events, server to client.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsOutboundEvent {
    #[serde(rename = "joined")]
    Joined { user_id: Uuid },

    /// Delivered to every registered connection of both participants.
    #[serde(rename = "receive_message")]
    ReceiveMessage { message: MessageDto },

    #[serde(rename = "error")]
    Error { code: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_events_parse_from_tagged_json() {
        let sender = Uuid::new_v4();
        let receiver = Uuid::new_v4();
        let raw = format!(
            r#"{{"type":"send_message","sender_id":"{sender}","receiver_id":"{receiver}","content":"hi"}}"#
        );
        let event: WsInboundEvent = serde_json::from_str(&raw).expect("parse");
        match event {
            WsInboundEvent::SendMessage {
                sender_id,
                receiver_id,
                content,
            } => {
                assert_eq!(sender_id, sender);
                assert_eq!(receiver_id, receiver);
                assert_eq!(content, "hi");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn outbound_events_carry_their_tag() {
        let json = serde_json::to_string(&WsOutboundEvent::Joined {
            user_id: Uuid::new_v4(),
        })
        .expect("serialize");
        assert!(json.contains(r#""type":"joined""#));

        let json = serde_json::to_string(&WsOutboundEvent::Error {
            code: "identity_mismatch".into(),
            message: "nope".into(),
        })
        .expect("serialize");
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains("identity_mismatch"));
    }
}
