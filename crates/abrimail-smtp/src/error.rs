//! Error types for SMTP submission.

use std::fmt;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Stage of the submission sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Reading the `220` greeting.
    Greeting,
    /// `EHLO`.
    CapabilityExchange,
    /// `AUTH LOGIN` and the two credential lines.
    Authenticate,
    /// `MAIL FROM`.
    DeclareSender,
    /// `RCPT TO`, once per recipient.
    DeclareRecipients,
    /// `DATA`, the message and the lone `.` line.
    TransmitBody,
    /// `QUIT`.
    Close,
}

impl Step {
    /// Stable lowercase name, as shown in errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::CapabilityExchange => "capability-exchange",
            Self::Authenticate => "authenticate",
            Self::DeclareSender => "declare-sender",
            Self::DeclareRecipients => "declare-recipients",
            Self::TransmitBody => "transmit-body",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure (I/O, TLS, timeout, peer closed, invalid settings).
    #[error(transparent)]
    Transport(#[from] abrimail_transport::Error),

    /// The server answered a step with an unexpected reply.
    #[error("SMTP {step} failed: {response}")]
    Submission {
        /// Step that failed.
        step: Step,
        /// Reply as received.
        response: String,
    },

    /// Malformed reply line.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Message cannot be sent as composed.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

impl Error {
    /// Step at which submission stopped, for server rejections.
    #[must_use]
    pub const fn step(&self) -> Option<Step> {
        match self {
            Self::Submission { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Reply code of a server rejection, if it carries one.
    #[must_use]
    pub fn reply_code(&self) -> Option<u16> {
        match self {
            Self::Submission { response, .. } => response.get(..3)?.parse().ok(),
            _ => None,
        }
    }

    /// Returns true if the server rejected permanently (5xx).
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.reply_code().is_some_and(|code| (500..600).contains(&code))
    }

    /// Returns true if the server rejected transiently (4xx).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.reply_code().is_some_and(|code| (400..500).contains(&code))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_step_names() {
        assert_eq!(Step::Greeting.to_string(), "greeting");
        assert_eq!(Step::CapabilityExchange.to_string(), "capability-exchange");
        assert_eq!(Step::DeclareRecipients.to_string(), "declare-recipients");
        assert_eq!(Step::TransmitBody.to_string(), "transmit-body");
    }

    #[test]
    fn test_submission_error() {
        let err = Error::Submission {
            step: Step::DeclareRecipients,
            response: "550 5.1.1 No such user".to_string(),
        };
        assert_eq!(err.step(), Some(Step::DeclareRecipients));
        assert_eq!(err.reply_code(), Some(550));
        assert!(err.is_permanent());
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "SMTP declare-recipients failed: 550 5.1.1 No such user"
        );
    }

    #[test]
    fn test_transient_and_non_reply_errors() {
        let err = Error::Submission {
            step: Step::DeclareSender,
            response: "451 try later".to_string(),
        };
        assert!(err.is_transient());

        let err = Error::InvalidAddress("x".to_string());
        assert_eq!(err.step(), None);
        assert_eq!(err.reply_code(), None);
    }
}
