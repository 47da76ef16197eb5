use thiserror::Error;

/// Errors surfaced by every modelrelay crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("conversation not found: {0}")]
    NotFound(String),

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error(
        "service on port {port} did not become healthy after {attempts} attempts \
         (check for a port conflict or a slow startup)"
    )]
    StartupTimeout { port: u16, attempts: u32 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("process error: {0}")]
    Process(String),

    #[error("MCP error: {0}")]
    Mcp(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
