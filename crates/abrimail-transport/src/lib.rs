//! # abrimail-transport
//!
//! Connection plumbing shared by the AbriMail IMAP and SMTP engines.
//!
//! This crate provides:
//! - [`ConnectionSettings`] with validation and provider presets
//! - [`open`], which dials TCP and negotiates TLS with server-name checks
//! - [`LineStream`], a buffered line/exact-length reader with timeouts
//!
//! ## Example
//!
//! ```ignore
//! use abrimail_transport::{ConnectionSettings, open};
//!
//! let settings = ConnectionSettings::new("imap.example.com", 993, "me", "secret");
//! let mut stream = open(&settings).await?;
//! let greeting = stream.read_text_line().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod line;
pub mod settings;
pub mod stream;

pub use error::{Error, Result};
pub use line::LineStream;
pub use settings::{
    ConnectionSettings, DEFAULT_IMAP_PORT, DEFAULT_SMTP_PORT, DEFAULT_TIMEOUT, Provider,
    SettingsError,
};
pub use stream::{MailStream, connect_plain, connect_tls, create_tls_connector, open, open_with};
