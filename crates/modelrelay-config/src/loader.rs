use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use modelrelay_common::{Error, Result};
use regex::Regex;
use tracing::{debug, info};

use crate::model::AppConfig;

/// Environment variable consulted when no `--config` flag is given.
pub const CONFIG_ENV_VAR: &str = "MODELRELAY_CONFIG";

static ENV_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env reference regex should compile")
});

/// Loads and validates `config.yaml`.
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve the config path: explicit flag, then `MODELRELAY_CONFIG`, then the
    /// platform config directory.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path));
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Ok(Self::new(path));
        }
        let dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("could not determine config directory".into()))?;
        Ok(Self::new(dir.join("modelrelay").join("config.yaml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<AppConfig> {
        info!("loading config from {}", self.path.display());
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::Config(format!(
                "failed to read config at {}: {e}",
                self.path.display()
            ))
        })?;
        Self::parse(&raw)
    }

    /// Parse, expand `${VAR}` references, and validate a YAML document.
    pub fn parse(raw: &str) -> Result<AppConfig> {
        Self::parse_with_env(raw, |name| std::env::var(name).ok())
    }

    pub fn parse_with_env(raw: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<AppConfig> {
        let mut config: AppConfig = serde_yaml::from_str(raw)
            .map_err(|e| Error::Config(format!("invalid config: {e}")))?;

        for model in &mut config.models {
            model.api_key = expand_env(&model.api_key, &lookup)?;
            model.base_url = expand_env(&model.base_url, &lookup)?;
        }

        Self::validate(&config)?;
        debug!("config loaded with {} model(s)", config.models.len());
        Ok(config)
    }

    pub fn validate(config: &AppConfig) -> Result<()> {
        if config.models.is_empty() {
            return Err(Error::Config("at least one model must be configured".into()));
        }
        if config.http_port == 0 {
            return Err(Error::Config("httpPort must be non-zero".into()));
        }
        // A limit of 1 keeps no message on either side of the marker, so the newest
        // user turn would never reach the backend. 0 disables truncation.
        if config.truncate_limit == 1 {
            return Err(Error::Config(
                "truncateLimit must be 0 (disabled) or at least 2".into(),
            ));
        }

        let mut seen = HashSet::new();
        for (index, model) in config.models.iter().enumerate() {
            if model.id.trim().is_empty() {
                return Err(Error::Config(format!("models[{index}].id is required")));
            }
            if !seen.insert(model.id.as_str()) {
                return Err(Error::Config(format!("duplicate model id '{}'", model.id)));
            }
            if model.model_name.trim().is_empty() {
                return Err(Error::Config(format!(
                    "model '{}' is missing modelName",
                    model.id
                )));
            }
            if model.api_key.trim().is_empty() {
                return Err(Error::Config(format!("model '{}' is missing apiKey", model.id)));
            }
            let url = url::Url::parse(&model.base_url).map_err(|e| {
                Error::Config(format!("model '{}' has invalid baseUrl: {e}", model.id))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "model '{}' baseUrl must be http or https",
                    model.id
                )));
            }
        }

        if let Some(default) = &config.default_model {
            if config.model(default).is_none() {
                return Err(Error::Config(format!(
                    "defaultModel '{default}' does not match any model id"
                )));
            }
        }

        Ok(())
    }
}

fn expand_env(value: &str, lookup: &impl Fn(&str) -> Option<String>) -> Result<String> {
    let mut missing = None;
    let expanded = ENV_REF.replace_all(value, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        lookup(name).unwrap_or_else(|| {
            missing.get_or_insert_with(|| name.to_string());
            String::new()
        })
    });
    match missing {
        Some(name) => Err(Error::Config(format!(
            "environment variable '{name}' is not set"
        ))),
        None => Ok(expanded.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = r#"
httpPort: 9000
truncateLimit: 10
models:
  - id: gpt
    modelName: gpt-4.1
    baseUrl: https://api.openai.com/v1
    apiKey: sk-test
    provider: openai
  - id: local
    modelName: qwen3
    baseUrl: http://localhost:11434/v1
    apiKey: ${LOCAL_KEY}
"#;

    fn env(name: &str) -> Option<String> {
        (name == "LOCAL_KEY").then(|| "from-env".to_string())
    }

    #[test]
    fn parses_models_and_expands_env() {
        let config = ConfigLoader::parse_with_env(BASIC, env).unwrap();
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.truncate_limit, 10);
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.models[0].provider.as_deref(), Some("openai"));
        assert_eq!(config.models[1].api_key, "from-env");
    }

    #[test]
    fn missing_env_var_is_config_error() {
        let err = ConfigLoader::parse_with_env(BASIC, |_| None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("LOCAL_KEY"));
    }

    #[test]
    fn defaults_apply_when_omitted() {
        let raw = r#"
models:
  - id: a
    modelName: m
    baseUrl: http://localhost/v1
    apiKey: k
"#;
        let config = ConfigLoader::parse_with_env(raw, |_| None).unwrap();
        assert_eq!(config.http_port, crate::DEFAULT_HTTP_PORT);
        assert_eq!(config.truncate_limit, crate::DEFAULT_TRUNCATE_LIMIT);
    }

    #[test]
    fn empty_model_list_is_rejected() {
        let err = ConfigLoader::parse_with_env("models: []", |_| None).unwrap_err();
        assert!(err.to_string().contains("at least one model"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let raw = r#"
models:
  - { id: a, modelName: m, baseUrl: "http://x/v1", apiKey: k }
  - { id: a, modelName: n, baseUrl: "http://y/v1", apiKey: k }
"#;
        let err = ConfigLoader::parse_with_env(raw, |_| None).unwrap_err();
        assert!(err.to_string().contains("duplicate model id"));
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let raw = r#"
models:
  - { id: a, baseUrl: "http://x/v1", apiKey: k }
"#;
        let err = ConfigLoader::parse_with_env(raw, |_| None).unwrap_err();
        assert!(err.to_string().contains("modelName"));
    }

    #[test]
    fn non_http_base_url_is_rejected() {
        let raw = r#"
models:
  - { id: a, modelName: m, baseUrl: "ftp://x/v1", apiKey: k }
"#;
        let err = ConfigLoader::parse_with_env(raw, |_| None).unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn unknown_default_model_is_rejected() {
        let raw = r#"
defaultModel: nope
models:
  - { id: a, modelName: m, baseUrl: "http://x/v1", apiKey: k }
"#;
        let err = ConfigLoader::parse_with_env(raw, |_| None).unwrap_err();
        assert!(err.to_string().contains("defaultModel"));
    }

    #[test]
    fn negative_truncate_limit_fails_to_parse() {
        let raw = r#"
truncateLimit: -1
models:
  - { id: a, modelName: m, baseUrl: "http://x/v1", apiKey: k }
"#;
        assert!(ConfigLoader::parse_with_env(raw, |_| None).is_err());
    }

    #[test]
    fn truncate_limit_of_one_is_rejected() {
        let raw = r#"
truncateLimit: 1
models:
  - { id: a, modelName: m, baseUrl: "http://x/v1", apiKey: k }
"#;
        let err = ConfigLoader::parse_with_env(raw, |_| None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("truncateLimit"));

        for limit in [0, 2, 3] {
            let raw = raw.replace("truncateLimit: 1", &format!("truncateLimit: {limit}"));
            let config = ConfigLoader::parse_with_env(&raw, |_| None).unwrap();
            assert_eq!(config.truncate_limit, limit);
        }
    }

    #[test]
    fn explicit_path_wins_resolution() {
        let loader = ConfigLoader::resolve(Some(PathBuf::from("/tmp/explicit.yaml"))).unwrap();
        assert_eq!(loader.path(), Path::new("/tmp/explicit.yaml"));
    }
}
