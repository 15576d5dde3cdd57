pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
pub const DEFAULT_MAX_REQUESTS_PER_MINUTE: u32 = 120;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";
pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 64;
pub const DEFAULT_HASHING_DIMENSION: usize = 256;

pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
pub const DEFAULT_COLLECTION_NAME: &str = "rag-chat";

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 8000;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

pub fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:4200".to_string(),
        "https://localhost:4200".to_string(),
        "http://127.0.0.1:4200".to_string(),
        "https://*.vercel.app".to_string(),
    ]
}
