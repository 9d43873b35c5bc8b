use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load documents from {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("{stage} timed out after {}s", .after.as_secs())]
    Timeout { stage: &'static str, after: Duration },
}

impl Error {
    /// Whether the error originated in an external service (model server or index).
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::Embedding(_) | Error::Index(_) | Error::Generation(_) | Error::Timeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
