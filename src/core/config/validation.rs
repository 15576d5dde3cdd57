use serde_json::{Map, Value};

use super::settings::{AppConfig, EmbeddingBackend, VectorBackend};
use super::ConfigError;

/// Shape checks on the raw tree, so a typo reports the offending path instead
/// of a generic deserialization error.
pub fn validate_config(config: &Value) -> Result<(), ConfigError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65_535)?;
        validate_string_array_field(server, "server.cors_allowed_origins", "cors_allowed_origins")?;
        validate_u64_field(
            server,
            "server.max_upload_bytes",
            "max_upload_bytes",
            1,
            1_000_000_000,
        )?;
        validate_u64_field(
            server,
            "server.max_requests_per_minute",
            "max_requests_per_minute",
            0,
            1_000_000,
        )?;
    }

    if let Some(embedding) = expect_optional_object(root, "embedding")? {
        validate_optional_string_field(embedding, "embedding.provider", "provider")?;
        validate_optional_string_field(embedding, "embedding.model", "model")?;
        validate_u64_field(embedding, "embedding.dimensions", "dimensions", 1, 65_536)?;
        validate_optional_string_field(embedding, "embedding.base_url", "base_url")?;
        validate_u64_field(embedding, "embedding.batch_size", "batch_size", 1, 2048)?;
        validate_u64_field(embedding, "embedding.max_retries", "max_retries", 0, 10)?;
        validate_u64_field(
            embedding,
            "embedding.hashing_dimension",
            "hashing_dimension",
            8,
            65_536,
        )?;
    }

    if let Some(index) = expect_optional_object(root, "vector_index")? {
        validate_optional_string_field(index, "vector_index.backend", "backend")?;
        validate_optional_string_field(index, "vector_index.url", "url")?;
        validate_optional_string_field(index, "vector_index.collection_name", "collection_name")?;
        validate_optional_string_field(index, "vector_index.collection_mode", "collection_mode")?;
    }

    if let Some(generation) = expect_optional_object(root, "generation")? {
        validate_optional_string_field(generation, "generation.model", "model")?;
        validate_optional_string_field(generation, "generation.base_url", "base_url")?;
        validate_u64_field(generation, "generation.max_tokens", "max_tokens", 1, 128_000)?;
        validate_f64_field(generation, "generation.temperature", "temperature", 0.0, 2.0)?;
        validate_u64_field(generation, "generation.max_retries", "max_retries", 0, 10)?;
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        validate_u64_field(retrieval, "retrieval.top_k", "top_k", 1, 100)?;
        validate_u64_field(
            retrieval,
            "retrieval.max_chunk_chars",
            "max_chunk_chars",
            16,
            1_000_000,
        )?;
        validate_u64_field(retrieval, "retrieval.chunk_overlap", "chunk_overlap", 0, 1_000_000)?;
    }

    if let Some(chat) = expect_optional_object(root, "chat")? {
        validate_u64_field(chat, "chat.history_turns", "history_turns", 0, 100)?;
        validate_optional_string_field(chat, "chat.text_ingest_mode", "text_ingest_mode")?;
    }

    if let Some(timeouts) = expect_optional_object(root, "timeouts")? {
        validate_u64_field(
            timeouts,
            "timeouts.request_timeout_secs",
            "request_timeout_secs",
            1,
            3_600,
        )?;
    }

    Ok(())
}

/// Cross-field checks that only make sense on the typed configuration.
pub fn validate_settings(config: &AppConfig) -> Result<(), ConfigError> {
    if config.retrieval.chunk_overlap >= config.retrieval.max_chunk_chars {
        return Err(ConfigError::Invalid(format!(
            "retrieval.chunk_overlap ({}) must be smaller than retrieval.max_chunk_chars ({})",
            config.retrieval.chunk_overlap, config.retrieval.max_chunk_chars
        )));
    }

    if config.embedding.provider == EmbeddingBackend::OpenAi {
        require_non_empty("embedding.model", &config.embedding.model)?;
        require_http_url("embedding.base_url", &config.embedding.base_url)?;
    }

    if config.vector_index.backend == VectorBackend::Qdrant {
        require_http_url("vector_index.url", &config.vector_index.url)?;
        require_non_empty(
            "vector_index.collection_name",
            &config.vector_index.collection_name,
        )?;
    }

    require_non_empty("generation.model", &config.generation.model)?;
    require_http_url("generation.base_url", &config.generation.base_url)?;

    Ok(())
}

fn require_non_empty(path: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!(
            "Invalid config at '{}': value cannot be empty",
            path
        )));
    }
    Ok(())
}

fn require_http_url(path: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        return Ok(());
    }
    Err(ConfigError::Invalid(format!(
        "Invalid config at '{}': expected an http(s) URL, got '{}'",
        path, value
    )))
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ConfigError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(config_type_error(key, "object")),
    }
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() {
        return Ok(());
    }
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ConfigError::Invalid(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(ConfigError::Invalid(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() || value.as_str().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "string"))
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ConfigError {
    ConfigError::Invalid(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}
