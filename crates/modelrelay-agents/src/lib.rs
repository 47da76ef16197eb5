pub mod openai;
pub mod providers;

pub use openai::OpenAiCompatBackend;
pub use providers::{ChatBackend, Completion, ReasoningConvention, SendOptions};
