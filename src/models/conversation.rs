use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The canonical channel between exactly two users. The participant pair is
/// stored normalized (user_lo < user_hi) so {A,B} and {B,A} resolve to the
/// same record.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_lo: Uuid,
    pub user_hi: Uuid,
    pub last_message_preview: String,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// The other participant from `viewer`'s point of view.
    pub fn peer_of(&self, viewer: Uuid) -> Uuid {
        if viewer == self.user_lo {
            self.user_hi
        } else {
            self.user_lo
        }
    }
}

/// One entry of the conversation-list surface, shaped for the viewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub peer_id: Uuid,
    pub peer_display_name: String,
    pub last_message_preview: String,
}

/// Normalize an unordered pair. Uuid ordering is arbitrary but stable, which
/// is all the uniqueness key needs.
pub fn normalize_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_pair_is_order_insensitive() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(normalize_pair(a, b), normalize_pair(b, a));
        let (lo, hi) = normalize_pair(a, b);
        assert!(lo < hi);
    }

    #[test]
    fn peer_of_returns_the_other_participant() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (lo, hi) = normalize_pair(a, b);
        let conv = Conversation {
            id: Uuid::new_v4(),
            user_lo: lo,
            user_hi: hi,
            last_message_preview: String::new(),
            updated_at: chrono::Utc::now(),
        };
        assert_eq!(conv.peer_of(a), b);
        assert_eq!(conv.peer_of(b), a);
    }
}
