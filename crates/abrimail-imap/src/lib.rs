//! # abrimail-imap
//!
//! A minimal IMAP4rev1 client engine: login, select, fetch, logout.
//!
//! ## Features
//!
//! - **Tag correlation**: every command gets a fresh `A001`-style tag and the
//!   reader collects untagged data until that tag completes
//! - **Literal-aware reader**: `{n}` blocks are consumed as raw bytes, so
//!   message bodies with embedded line breaks (or lines that look like tagged
//!   replies) arrive intact
//! - **Session phases**: `Unconnected → Connected → Authenticated → Selected`,
//!   with out-of-order calls rejected before anything is sent
//! - **Envelope parsing**: FETCH results become [`HeaderRecord`]s
//!
//! ## Quick Start
//!
//! ```ignore
//! use abrimail_imap::Session;
//! use abrimail_transport::{ConnectionSettings, Provider};
//!
//! let settings = ConnectionSettings::imap_preset(Provider::Gmail, "me@gmail.com", "app-password");
//!
//! let headers = Session::scoped(settings, async |session| {
//!     let inbox = session.select_inbox().await?;
//!     session.fetch_headers(1, inbox.message_count.min(10)).await
//! })
//! .await?;
//!
//! for header in headers {
//!     println!("{} {} {}", header.seq, header.from, header.subject);
//! }
//! ```
//!
//! ## Session Phases
//!
//! ```text
//! Unconnected ── connect() ──→ Connected ── login() ──→ Authenticated
//!                    │                                       │
//!                    └──── * PREAUTH greeting ───────────────┤
//!                                                            ▼
//!                                    select_mailbox() ──→ Selected
//!
//! any phase ── logout() ──→ Closed
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
mod error;
pub mod literal;
pub mod parser;
pub mod reader;
pub mod session;
pub mod tag;
pub mod types;

pub use command::{Command, FetchItems, SequenceRange};
pub use error::{Error, Result};
pub use literal::{LineKind, classify};
pub use reader::{Part, ResponseUnit, Status, TaggedResponse, read_tagged, read_unit};
pub use session::{DEFAULT_MAILBOX, Phase, Session};
pub use tag::{Tag, TagGenerator};
pub use types::{Address, Envelope, FetchData, HeaderRecord, MailboxInfo};
