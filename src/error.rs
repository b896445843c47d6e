use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Illegal state: {0}")]
    IllegalState(String),
    #[error("{what} index {index} out of range (size {len})")]
    Index {
        what: &'static str,
        index: usize,
        len: usize,
    },
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Corrupt data: {0}")]
    CorruptData(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Maps a failed open/read of `path` to `NotFound` when the file is missing.
pub(crate) fn io_at(path: &Path, err: std::io::Error) -> Error {
    match err.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
        _ => Error::Io(err),
    }
}

/// Shorthand for raising an `InvalidConfiguration` error.
pub(crate) fn invalid<T>(msg: impl Into<String>) -> Result<T> {
    Err(Error::InvalidConfiguration(msg.into()))
}
