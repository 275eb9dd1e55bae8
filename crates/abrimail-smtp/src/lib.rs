//! # abrimail-smtp
//!
//! A strict-sequence SMTP submission client for implicit TLS (port 465).
//!
//! ## Features
//!
//! - **Type-state sequencing**: greeting, EHLO, AUTH LOGIN, MAIL FROM,
//!   RCPT TO, DATA and QUIT can only be issued in that order
//! - **Step-tagged failures**: a rejected reply aborts with
//!   [`Error::Submission`] naming the [`Step`] and the server's reply line
//! - **Message composition**: headers in a fixed order, CRLF normalisation
//!   and dot-stuffing of the body
//!
//! ## Quick Start
//!
//! ```ignore
//! use abrimail_smtp::{Mailer, OutgoingMessage};
//! use abrimail_transport::{ConnectionSettings, Provider};
//!
//! let settings = ConnectionSettings::smtp_preset(Provider::Fastmail, "me@fastmail.com", "app-password")
//!     .expect("Fastmail accepts implicit TLS submission");
//!
//! let message = OutgoingMessage::new("me@fastmail.com")
//!     .to("friend@example.com")
//!     .subject("Hello")
//!     .body("Sent over a bare SMTP session.");
//!
//! Mailer::new(settings).send(&message).await?;
//! ```
//!
//! ## Sequence
//!
//! ```text
//! Connected ── ehlo() ──→ Capable ── auth_login() ──→ Authenticated
//!     ── mail_from() ──→ SenderDeclared ── rcpt_to() ──→ RecipientDeclared
//!     ── data() ──→ Delivered ── quit()
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod address;
pub mod client;
mod error;
pub mod mailer;
pub mod message;
pub mod reply;

pub use address::Address;
pub use client::{
    Authenticated, Capable, Client, Connected, Delivered, RecipientDeclared, SenderDeclared,
};
pub use error::{Error, Result, Step};
pub use mailer::{DEFAULT_CLIENT_DOMAIN, Mailer};
pub use message::{DEFAULT_CONTENT_TYPE, Envelope, OutgoingMessage, encode_data};
pub use reply::{Reply, ReplyCode};
