//! Parsers for untagged server responses.

pub mod fetch;
pub mod lexer;

pub use fetch::parse_fetch_unit;
pub use lexer::{Lexer, Token};
