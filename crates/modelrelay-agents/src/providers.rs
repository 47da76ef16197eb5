use async_trait::async_trait;
use modelrelay_common::{Message, Result};
use modelrelay_config::ModelConfig;
use serde::{Deserialize, Serialize};

/// A chat-completion backend. One call per invocation, no retries.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send `messages` to `model` and return the assistant reply.
    async fn send(
        &self,
        model: &ModelConfig,
        messages: &[Message],
        options: SendOptions,
    ) -> Result<Completion>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
    /// Ask the backend for an extended-thinking trace.
    pub reasoning: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// How a provider expects reasoning to be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningConvention {
    /// `"reasoning_effort": "high"`
    OpenAi,
    /// `"reasoning": {"effort": "high"}`
    OpenRouter,
    /// `"enable_thinking": true`
    Qwen,
    /// Reasoning models emit traces unprompted.
    None,
}

impl ReasoningConvention {
    pub fn for_provider(provider: Option<&str>) -> Self {
        match provider.map(|p| p.trim().to_ascii_lowercase()).as_deref() {
            Some("openai") => Self::OpenAi,
            Some("openrouter") => Self::OpenRouter,
            Some("qwen") | Some("dashscope") => Self::Qwen,
            _ => Self::None,
        }
    }

    /// Insert the provider's reasoning parameter into a request body.
    pub fn apply(&self, body: &mut serde_json::Map<String, serde_json::Value>) {
        use serde_json::json;
        match self {
            Self::OpenAi => {
                body.insert("reasoning_effort".into(), json!("high"));
            }
            Self::OpenRouter => {
                body.insert("reasoning".into(), json!({ "effort": "high" }));
            }
            Self::Qwen => {
                body.insert("enable_thinking".into(), json!(true));
            }
            Self::None => {}
        }
    }
}
