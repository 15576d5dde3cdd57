pub mod defaults;
pub mod paths;
pub mod service;
pub mod settings;
pub mod validation;

use std::path::PathBuf;

use thiserror::Error;

pub use paths::AppPaths;
pub use service::{redacted, resolve_config, ConfigService};
pub use settings::{
    AppConfig, ChatConfig, CollectionMode, EmbeddingBackend, EmbeddingConfig, GenerationConfig,
    RetrievalConfig, ServerConfig, TextIngestMode, TimeoutConfig, VectorBackend,
    VectorIndexConfig,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{0}")]
    Invalid(String),
}
