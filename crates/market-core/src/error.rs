use std::path::PathBuf;
use thiserror::Error;

/// A single upstream fetch failed after its retries were exhausted.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{source_name} unavailable for {symbol} after {attempts} attempt(s): {reason}")]
pub struct SourceUnavailable {
    pub source_name: String,
    pub symbol: String,
    pub attempts: u32,
    pub reason: String,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error(transparent)]
    Unavailable(#[from] SourceUnavailable),

    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    pub fn unavailable(
        source_name: impl Into<String>,
        symbol: impl Into<String>,
        attempts: u32,
        reason: impl Into<String>,
    ) -> Self {
        FetchError::Unavailable(SourceUnavailable {
            source_name: source_name.into(),
            symbol: symbol.into(),
            attempts,
            reason: reason.into(),
        })
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
