use craft_config::ConfigError;
use craft_store::StoreError;
use thiserror::Error;

/// Invalid start/close/request ordering on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionStateError {
    #[error("session has not been started yet")]
    NotStarted,
    #[error("session is already running")]
    AlreadyRunning,
    #[error("session is already closed")]
    AlreadyClosed,
}

#[derive(Debug, Error)]
pub enum CraftError {
    #[error(transparent)]
    Session(#[from] SessionStateError),

    /// Non-2xx answer from the game. Never retried.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        status: u16,
        url: String,
        body: String,
    },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("failed to decode pairing response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The blocking task that writes the discovery file panicked or was cancelled.
    #[error("discovery store task failed: {0}")]
    StoreTask(#[source] tokio::task::JoinError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl CraftError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// The HTTP status, if this is a status error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T, E = CraftError> = std::result::Result<T, E>;
