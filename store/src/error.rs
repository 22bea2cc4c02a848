use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("discoveries file '{}' not found", path.display())]
    NotFound { path: PathBuf },

    #[error("path '{}' is not a file", path.display())]
    NotAFile { path: PathBuf },

    #[error("path '{}' is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("path '{}' is not writable", path.display())]
    ReadOnly { path: PathBuf },

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("discoveries file '{}' is malformed: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode discoveries: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
