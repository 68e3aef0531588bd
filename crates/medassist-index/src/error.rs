/// Errors raised by vector index backends.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Transport failure talking to the index service.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Qdrant client error.
    #[error("Qdrant error: {0}")]
    Qdrant(#[from] Box<qdrant_client::QdrantError>),

    /// Query embedding failed.
    #[error("embedding failed: {0}")]
    Embedding(#[from] medassist_llm::LlmError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The service answered with a non-success status.
    #[error("{backend} search failed (status {status})")]
    Status { backend: &'static str, status: u16 },

    #[error("invalid namespace: {0:?}")]
    InvalidNamespace(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;
