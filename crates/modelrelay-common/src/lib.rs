pub mod error;
pub mod message;
pub mod types;

pub use error::{Error, Result};
pub use message::{Message, Role};
pub use types::{ConversationId, LIVENESS_PATH};
