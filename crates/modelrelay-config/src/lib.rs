pub mod loader;
pub mod model;

pub use loader::ConfigLoader;
pub use model::{AppConfig, ModelConfig, DEFAULT_HTTP_PORT, DEFAULT_TRUNCATE_LIMIT};
