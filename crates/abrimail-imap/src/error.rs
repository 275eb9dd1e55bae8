//! Error types for the IMAP engine.

use thiserror::Error;

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure (I/O, TLS, timeout, peer closed, invalid settings).
    #[error(transparent)]
    Transport(#[from] abrimail_transport::Error),

    /// The server greeting was missing or not `* OK`/`* PREAUTH`.
    #[error("Connection rejected: {0}")]
    Connection(String),

    /// LOGIN was refused.
    #[error("Authentication failed: {response}")]
    Auth {
        /// Command as sent, with the password masked.
        command: String,
        /// Raw tagged line from the server.
        response: String,
    },

    /// Operation invoked in the wrong session phase.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The tagged reply reported NO, BAD or anything but OK.
    #[error("Command `{command}` failed: {response}")]
    Protocol {
        /// Command as sent, with secrets masked.
        command: String,
        /// Raw tagged line from the server.
        response: String,
    },

    /// Argument rejected before anything was sent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A response could not be parsed.
    #[error("Parse error at position {position}: {message}")]
    Parse {
        /// Byte position where the error occurred.
        position: usize,
        /// Description of what went wrong.
        message: String,
    },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
