use std::sync::Arc;

use modelrelay_agents::{ChatBackend, SendOptions};
use modelrelay_common::{ConversationId, Error, Message, Result};
use modelrelay_config::{AppConfig, ModelConfig};
use modelrelay_store::{ConversationStore, truncate};
use rmcp::schemars;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Arguments of the `chat` tool.
#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The user message to send.
    pub message: String,
    /// Continue an existing conversation. Omit to start a new one.
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Model to answer with. Naming a different model than the conversation's
    /// forks the conversation into a new id bound to that model.
    #[serde(default)]
    pub model_id: Option<String>,
    /// Request an extended reasoning trace when the provider supports it.
    #[serde(default)]
    pub reasoning: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub conversation_id: String,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub model_id: String,
}

/// Arguments of the `history` tool.
#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    pub conversation_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryReply {
    pub conversation_id: String,
    pub model_id: String,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelList {
    pub models: Vec<ModelSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModelSummary {
    pub id: String,
    pub model_name: String,
    pub base_url: String,
}

/// Routes tool invocations to the conversation store and the chat backend.
pub struct ChatService {
    config: Arc<AppConfig>,
    store: Arc<ConversationStore>,
    backend: Arc<dyn ChatBackend>,
}

impl ChatService {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<ConversationStore>,
        backend: Arc<dyn ChatBackend>,
    ) -> Self {
        Self {
            config,
            store,
            backend,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[instrument(skip_all, fields(conversation = request.conversation_id.as_deref(), model = request.model_id.as_deref()))]
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatReply> {
        let requested = request
            .model_id
            .as_deref()
            .map(|id| self.lookup_model(id))
            .transpose()?;

        let (conversation_id, model) = match request.conversation_id.as_deref() {
            Some(raw) => {
                let id = ConversationId::from(raw);
                let existing = self.store.get(&id)?;
                match requested {
                    Some(model) if model.id != existing.model_id => {
                        let forked = self.store.clone_conversation(&id, &model.id)?;
                        info!(
                            "switched conversation {id} from '{}' to '{}' as {forked}",
                            existing.model_id, model.id
                        );
                        (forked, model)
                    }
                    Some(model) => (id, model),
                    None => (id, self.lookup_model(&existing.model_id)?),
                }
            }
            None => {
                let model = match requested {
                    Some(model) => model,
                    None => self
                        .config
                        .default_model()
                        .ok_or_else(|| Error::UnknownModel("no default model configured".into()))?,
                };
                let id = self.store.create(&model.id);
                info!("started conversation {id} with model '{}'", model.id);
                (id, model)
            }
        };

        let mut messages = self.store.get(&conversation_id)?.messages;
        messages.push(Message::user(request.message.as_str()));
        let view = truncate(&messages, self.store.truncate_limit());

        let options = SendOptions {
            reasoning: request.reasoning.unwrap_or(false),
        };
        let completion = self.backend.send(model, &view, options).await?;

        // The user turn is only recorded once the backend has answered.
        self.store
            .append_exchange(&conversation_id, request.message, completion.content.as_str())?;

        Ok(ChatReply {
            conversation_id: conversation_id.to_string(),
            response: completion.content,
            reasoning: completion.reasoning,
            model_id: model.id.clone(),
        })
    }

    pub fn list_models(&self) -> ModelList {
        ModelList {
            models: self
                .config
                .models
                .iter()
                .map(|m| ModelSummary {
                    id: m.id.clone(),
                    model_name: m.model_name.clone(),
                    base_url: m.base_url.clone(),
                })
                .collect(),
        }
    }

    pub fn history(&self, request: HistoryRequest) -> Result<HistoryReply> {
        let id = ConversationId::from(request.conversation_id);
        let model_id = self.store.get(&id)?.model_id;
        let messages = self.store.history(&id)?;
        Ok(HistoryReply {
            conversation_id: id.to_string(),
            model_id,
            messages,
        })
    }

    fn lookup_model(&self, id: &str) -> Result<&ModelConfig> {
        self.config
            .model(id)
            .ok_or_else(|| Error::UnknownModel(id.to_string()))
    }
}
