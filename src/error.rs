// Festival Scoreboard - Error types
// One enum for the library; binaries wrap it with anyhow context.

use thiserror::Error;

use crate::auth::AuthError;
use crate::upload::UploadError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("event not found: {0}")]
    NotFound(String),

    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    /// A writer panicked while holding a store lock.
    #[error("store lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, Error>;

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Error::LockPoisoned
    }
}
