use serde::{Deserialize, Serialize};

pub const DEFAULT_HTTP_PORT: u16 = 8765;
pub const DEFAULT_TRUNCATE_LIMIT: usize = 50;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Top-level configuration file (`config.yaml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Maximum number of messages sent to a backend per turn. `0` disables truncation.
    #[serde(default = "default_truncate_limit")]
    pub truncate_limit: usize,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Model used when a chat call names none. Defaults to the first entry.
    #[serde(default)]
    pub default_model: Option<String>,

    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            truncate_limit: default_truncate_limit(),
            request_timeout_secs: default_request_timeout(),
            default_model: None,
            models: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn model(&self, id: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.id == id)
    }

    /// The model a conversation is bound to when the caller does not pick one.
    pub fn default_model(&self) -> Option<&ModelConfig> {
        match &self.default_model {
            Some(id) => self.model(id),
            None => self.models.first(),
        }
    }
}

/// One backend model entry.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub id: String,
    pub model_name: String,
    pub base_url: String,
    pub api_key: String,
    #[serde(default)]
    pub provider: Option<String>,
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("id", &self.id)
            .field("model_name", &self.model_name)
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("provider", &self.provider)
            .finish()
    }
}

fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}

fn default_truncate_limit() -> usize {
    DEFAULT_TRUNCATE_LIMIT
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str) -> ModelConfig {
        ModelConfig {
            id: id.to_string(),
            model_name: format!("{id}-model"),
            base_url: "http://localhost:1234/v1".to_string(),
            api_key: "secret".to_string(),
            provider: None,
        }
    }

    #[test]
    fn default_model_falls_back_to_first_entry() {
        let config = AppConfig {
            models: vec![model("a"), model("b")],
            ..AppConfig::default()
        };
        assert_eq!(config.default_model().unwrap().id, "a");
    }

    #[test]
    fn explicit_default_model_wins() {
        let config = AppConfig {
            default_model: Some("b".to_string()),
            models: vec![model("a"), model("b")],
            ..AppConfig::default()
        };
        assert_eq!(config.default_model().unwrap().id, "b");
    }

    #[test]
    fn debug_output_hides_api_key() {
        let rendered = format!("{:?}", model("a"));
        assert!(!rendered.contains("secret"));
    }
}
