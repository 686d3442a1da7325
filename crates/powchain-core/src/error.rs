use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = ChainError> = std::result::Result<T, E>;

/// Boxed error from a storage backend.
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("block encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    /// The store could not be opened at all. Fatal at startup.
    #[error("store unavailable at {}: {source}", .path.display())]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: BackendError,
    },

    #[error("store operation failed: {0}")]
    Store(#[source] BackendError),

    /// No block stored under this hash (hex). During traversal this
    /// means a broken link.
    #[error("block {0} not found")]
    NotFound(String),

    #[error("iterator advanced past the genesis block")]
    Exhausted,

    #[error("mining cancelled after {attempts} attempts")]
    MiningCancelled { attempts: u64 },

    #[error("mining deadline reached after {attempts} attempts")]
    MiningTimeout { attempts: u64 },

    #[error("nonce space exhausted without meeting the target")]
    NonceSpaceExhausted,

    /// An append was built on a tip that is no longer the stored tip.
    #[error("stale tip: block links to {expected}, store tip is {found}")]
    StaleTip { expected: String, found: String },
}

impl ChainError {
    pub fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ChainError::Store(Box::new(err))
    }
}

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error(transparent)]
    Bincode(#[from] bincode::Error),

    #[error("stored hash {stored} does not match recomputed hash {computed}")]
    HashMismatch { stored: String, computed: String },

    /// Hash agrees with the content but does not meet the target.
    #[error("block {hash} does not meet the proof-of-work target")]
    InsufficientWork { hash: String },

    #[error("block {found} stored under key {key}")]
    KeyMismatch { key: String, found: String },

    #[error("latest-hash pointer has {0} bytes, expected 32")]
    BadPointer(usize),
}
