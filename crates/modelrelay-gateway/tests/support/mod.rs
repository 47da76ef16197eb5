use std::sync::Arc;
use std::time::Duration;

use modelrelay_agents::OpenAiCompatBackend;
use modelrelay_config::{AppConfig, ModelConfig};
use modelrelay_gateway::ChatService;
use modelrelay_store::ConversationStore;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Start a mock backend that always answers with `reply`.
pub async fn mock_backend(reply: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": reply}}]
        })))
        .mount(&server)
        .await;
    server
}

pub fn model(id: &str, server: &MockServer) -> ModelConfig {
    ModelConfig {
        id: id.to_string(),
        model_name: format!("{id}-model"),
        base_url: server.uri(),
        api_key: format!("{id}-key"),
        provider: None,
    }
}

pub fn service(models: Vec<ModelConfig>, truncate_limit: usize) -> Arc<ChatService> {
    let config = AppConfig {
        truncate_limit,
        models,
        ..AppConfig::default()
    };
    let backend = OpenAiCompatBackend::new(Duration::from_secs(5)).unwrap();
    Arc::new(ChatService::new(
        Arc::new(config),
        Arc::new(ConversationStore::new(truncate_limit)),
        Arc::new(backend),
    ))
}
