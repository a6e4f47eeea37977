use thiserror::Error;

/// Error kinds for the deal pipeline.
///
/// Per-item and per-adapter errors are never fatal to a run: the registry
/// converts adapter failures into an empty contribution, and the sync engine
/// counts upload failures per listing. Only `Config` aborts before any
/// network activity.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Network, rendering or transport failure while fetching a source.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Malformed or unexpected page/feed structure.
    #[error("parse error: {0}")]
    Parse(String),

    /// Destination store rejected or failed to accept a record.
    #[error("upload error: {0}")]
    Upload(String),

    /// Adapter exceeded its time budget.
    #[error("timed out after {0} seconds")]
    Timeout(u64),

    /// Bad or missing configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether a retry layer should consider this failure transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Timeout(_) => true,
            EngineError::Fetch(msg) | EngineError::Upload(msg) => {
                msg.contains("timeout") || msg.contains("connect") || msg.contains("reset")
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        EngineError::Fetch(e.to_string())
    }
}
