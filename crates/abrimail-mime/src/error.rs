//! Error types for message parsing.

/// Result type alias for message parsing.
pub type Result<T> = std::result::Result<T, Error>;

/// Message parsing error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A header needed for the operation is absent.
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    /// The date header is not valid RFC 2822.
    #[error("Invalid date: {0}")]
    InvalidDate(#[from] chrono::ParseError),
}
