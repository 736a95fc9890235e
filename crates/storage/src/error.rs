use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database not found at {0}")]
    NotFound(String),

    #[error("statement is not read-only")]
    ReadOnly,
}

pub type Result<T> = std::result::Result<T, Error>;
