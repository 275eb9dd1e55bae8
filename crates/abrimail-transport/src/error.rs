//! Error types for the transport layer.

use std::time::Duration;

use thiserror::Error;

use crate::settings::SettingsError;

/// Errors that can occur while opening or using a line transport.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS server-name validation.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Connection settings failed validation.
    #[error("Invalid settings: {0}")]
    Settings(#[from] SettingsError),

    /// TCP connect or TLS negotiation failed.
    #[error("Connection to {address} failed: {reason}")]
    Connection {
        /// `host:port` that was dialled.
        address: String,
        /// What went wrong.
        reason: String,
    },

    /// The peer closed the connection.
    #[error("Connection closed by peer")]
    EndOfStream,

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// The transport was already closed locally.
    #[error("Transport is closed")]
    Closed,

    /// Framing violation (line too long, literal too large).
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type alias using the transport error.
pub type Result<T> = std::result::Result<T, Error>;
