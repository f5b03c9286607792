pub mod conversation;
pub mod message;

pub use conversation::{normalize_pair, Conversation, ConversationSummary};
pub use message::{Message, MessageDto};
