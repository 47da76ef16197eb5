pub mod conversation_store;
pub mod truncation;

pub use conversation_store::{Conversation, ConversationStore};
pub use truncation::{TRUNCATION_MARKER, truncate};
