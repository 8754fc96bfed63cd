//! Error types for the prompt index

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Prompt index error type
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Path '{}' is not inside index root '{}'", path.display(), root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Invalid exclude pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl IndexError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        IndexError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, IndexError>;
