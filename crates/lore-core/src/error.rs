//! Error types for Lore.

use thiserror::Error;

/// Core error type for Lore operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias using Lore's Error.
pub type Result<T> = std::result::Result<T, Error>;
