//! # abrimail-mime
//!
//! Best-effort splitting of RFC 822 messages into headers and body.
//!
//! This is deliberately not a full MIME parser: folded headers are not
//! unfolded, encoded words are left as-is and multipart bodies are returned
//! as one string.
//!
//! ## Quick Start
//!
//! ```
//! use abrimail_mime::MessageRecord;
//!
//! let raw = "Subject: Hello\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nHi!\r\n";
//! let record = MessageRecord::parsed(1, raw);
//!
//! assert_eq!(record.subject(), "Hello");
//! assert_eq!(record.content_type(), "text/plain");
//! assert_eq!(record.body(), "Hi!");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod error;
pub mod header;
pub mod record;

pub use error::{Error, Result};
pub use header::{Headers, split_headers_and_body};
pub use record::{DEFAULT_CONTENT_TYPE, MessageRecord};
