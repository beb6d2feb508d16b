//! Error types for the Kagami engine

use thiserror::Error;

/// Main error type for the engine
#[derive(Debug, Error)]
pub enum Error {
    #[error("network fetch failed: {0}")]
    Network(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("dispose error: {0}")]
    Dispose(String),

    #[error("invalid asset data: {0}")]
    Decode(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to load {what}: {source}")]
    Load {
        what: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap an error with the human-readable name of what was being loaded.
    ///
    /// Used by the loader facade so UI callers see "failed to load avatar
    /// model: ..." instead of raw cache internals.
    pub fn while_loading(self, what: &'static str) -> Self {
        Error::Load {
            what,
            source: Box::new(self),
        }
    }

    /// True if this error (or the error it wraps) is a network failure.
    pub fn is_network(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::Load { source, .. } => source.is_network(),
            _ => false,
        }
    }
}
