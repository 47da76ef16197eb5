use std::time::Duration;

use async_trait::async_trait;
use modelrelay_common::{Error, Message, Result};
use modelrelay_config::ModelConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::providers::{ChatBackend, Completion, ReasoningConvention, SendOptions};

/// Client for OpenAI-compatible `/chat/completions` endpoints.
#[derive(Clone)]
pub struct OpenAiCompatBackend {
    client: Client,
}

impl OpenAiCompatBackend {
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Backend(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn build_body(&self, model: &ModelConfig, messages: &[Message], options: SendOptions) -> Result<serde_json::Value> {
        let request = ChatCompletionRequest {
            model: &model.model_name,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            stream: false,
        };

        let mut body = match serde_json::to_value(&request)? {
            serde_json::Value::Object(map) => map,
            _ => return Err(Error::Backend("request did not serialize to an object".into())),
        };
        if options.reasoning {
            ReasoningConvention::for_provider(model.provider.as_deref()).apply(&mut body);
        }
        Ok(serde_json::Value::Object(body))
    }
}

#[async_trait]
impl ChatBackend for OpenAiCompatBackend {
    async fn send(
        &self,
        model: &ModelConfig,
        messages: &[Message],
        options: SendOptions,
    ) -> Result<Completion> {
        let url = format!("{}/chat/completions", model.base_url.trim_end_matches('/'));
        let body = self.build_body(model, messages, options)?;

        debug!(
            "sending {} message(s) to model '{}' ({})",
            messages.len(),
            model.id,
            model.model_name
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&model.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Backend(format!("request to '{}' failed: {e}", model.id)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!("model '{}' returned {status}", model.id);
            return Err(Error::Backend(format!(
                "model '{}' returned {status}: {error_text}",
                model.id
            )));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            Error::Backend(format!("failed to parse response from '{}': {e}", model.id))
        })?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| Error::Backend(format!("model '{}' returned no choices", model.id)))?;

        let content = message
            .content
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                Error::Backend(format!("model '{}' returned an empty completion", model.id))
            })?;

        let reasoning = message
            .reasoning_content
            .or(message.reasoning)
            .filter(|r| !r.trim().is_empty());

        Ok(Completion { content, reasoning })
    }
}

// Request Types
#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

// Response Types
#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    reasoning_content: Option<String>,
    reasoning: Option<String>,
}
