//! Connection settings and their validation.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default IMAP port for implicit TLS.
pub const DEFAULT_IMAP_PORT: u16 = 993;

/// Default SMTP submission port for implicit TLS.
pub const DEFAULT_SMTP_PORT: u16 = 465;

/// Default connect/read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for one mail server connection.
///
/// Validated once by the session that consumes them and never mutated
/// afterwards.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Server hostname (also used for TLS server-name validation).
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Login name.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Whether to wrap the TCP stream in TLS.
    #[serde(default = "default_tls")]
    pub tls: bool,
    /// Bound applied to connecting and to every read.
    #[serde(
        default = "default_timeout",
        rename = "timeout_ms",
        with = "duration_ms"
    )]
    pub timeout: Duration,
}

const fn default_tls() -> bool {
    true
}

const fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl ConnectionSettings {
    /// Creates settings with TLS enabled and the default timeout.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            tls: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates IMAP settings for a well-known provider.
    #[must_use]
    pub fn imap_preset(
        provider: Provider,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::new(provider.imap_host(), DEFAULT_IMAP_PORT, username, password)
    }

    /// Creates SMTP settings for a well-known provider.
    ///
    /// Returns `None` for providers that do not accept implicit TLS
    /// submission.
    #[must_use]
    pub fn smtp_preset(
        provider: Provider,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Option<Self> {
        provider
            .smtp_host()
            .map(|host| Self::new(host, DEFAULT_SMTP_PORT, username, password))
    }

    /// Enables or disables TLS.
    #[must_use]
    pub const fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Sets the connect/read timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Checks every field, stopping at the first violation.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field in declaration order.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.errors().into_iter().next().map_or(Ok(()), Err)
    }

    /// Returns every violated field, for form-style reporting.
    #[must_use]
    pub fn errors(&self) -> Vec<SettingsError> {
        let mut errors = Vec::new();

        if self.host.trim().is_empty() {
            errors.push(SettingsError::EmptyHost);
        }
        if self.port == 0 {
            errors.push(SettingsError::InvalidPort);
        }
        if self.username.trim().is_empty() {
            errors.push(SettingsError::EmptyUsername);
        }
        if self.password.trim().is_empty() {
            errors.push(SettingsError::EmptyPassword);
        }
        if self.timeout.is_zero() {
            errors.push(SettingsError::ZeroTimeout);
        }

        errors
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("tls", &self.tls)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A single invalid settings field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    /// Host is empty.
    EmptyHost,
    /// Port is outside 1-65535.
    InvalidPort,
    /// Username is empty.
    EmptyUsername,
    /// Password is empty.
    EmptyPassword,
    /// Timeout is zero.
    ZeroTimeout,
}

impl SettingsError {
    /// Human-readable message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyHost => "Host is required",
            Self::InvalidPort => "Port must be between 1 and 65535",
            Self::EmptyUsername => "Username is required",
            Self::EmptyPassword => "Password is required",
            Self::ZeroTimeout => "Timeout must be greater than zero",
        }
    }

    /// Name of the offending field.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyHost => "host",
            Self::InvalidPort => "port",
            Self::EmptyUsername => "username",
            Self::EmptyPassword => "password",
            Self::ZeroTimeout => "timeout",
        }
    }
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field(), self.message())
    }
}

impl std::error::Error for SettingsError {}

/// Mail providers with known server names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Google Mail.
    Gmail,
    /// Microsoft Outlook / Office 365.
    Outlook,
    /// Yahoo Mail.
    Yahoo,
    /// Fastmail.
    Fastmail,
}

impl Provider {
    /// IMAP server hostname.
    #[must_use]
    pub const fn imap_host(self) -> &'static str {
        match self {
            Self::Gmail => "imap.gmail.com",
            Self::Outlook => "outlook.office365.com",
            Self::Yahoo => "imap.mail.yahoo.com",
            Self::Fastmail => "imap.fastmail.com",
        }
    }

    /// SMTP server hostname accepting implicit TLS on port 465.
    #[must_use]
    pub const fn smtp_host(self) -> Option<&'static str> {
        match self {
            Self::Gmail => Some("smtp.gmail.com"),
            // Outlook only offers STARTTLS submission on 587.
            Self::Outlook => None,
            Self::Yahoo => Some("smtp.mail.yahoo.com"),
            Self::Fastmail => Some("smtp.fastmail.com"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gmail" => Ok(Self::Gmail),
            "outlook" => Ok(Self::Outlook),
            "yahoo" => Ok(Self::Yahoo),
            "fastmail" => Ok(Self::Fastmail),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Serde helpers storing a `Duration` as integer milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)] // Required by serde with= signature
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn valid() -> ConnectionSettings {
        ConnectionSettings::new("imap.example.com", 993, "user@example.com", "secret")
    }

    #[test]
    fn test_valid_settings() {
        assert!(valid().validate().is_ok());
        assert!(valid().errors().is_empty());
    }

    #[test]
    fn test_empty_host_is_first_error() {
        let mut settings = valid();
        settings.host = "   ".to_string();
        settings.password = String::new();

        assert_eq!(settings.validate(), Err(SettingsError::EmptyHost));
        assert_eq!(
            settings.errors(),
            vec![SettingsError::EmptyHost, SettingsError::EmptyPassword]
        );
    }

    #[test]
    fn test_port_zero_rejected() {
        let mut settings = valid();
        settings.port = 0;
        let err = settings.validate().unwrap_err();
        assert_eq!(err.field(), "port");
        assert_eq!(err.to_string(), "port: Port must be between 1 and 65535");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let settings = valid().with_timeout(Duration::ZERO);
        assert_eq!(settings.validate(), Err(SettingsError::ZeroTimeout));
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", valid());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_presets() {
        let imap = ConnectionSettings::imap_preset(Provider::Gmail, "a@gmail.com", "pw");
        assert_eq!(imap.host, "imap.gmail.com");
        assert_eq!(imap.port, 993);
        assert!(imap.tls);

        let smtp = ConnectionSettings::smtp_preset(Provider::Fastmail, "a@fm.com", "pw").unwrap();
        assert_eq!(smtp.address(), "smtp.fastmail.com:465");

        assert!(ConnectionSettings::smtp_preset(Provider::Outlook, "a", "b").is_none());
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("GMail".parse::<Provider>(), Ok(Provider::Gmail));
        assert!("aol".parse::<Provider>().is_err());
    }

    #[test]
    fn test_json_defaults() {
        let json = r#"{"host":"h","port":143,"username":"u","password":"p"}"#;
        let settings: ConnectionSettings = serde_json::from_str(json).unwrap();
        assert!(settings.tls);
        assert_eq!(settings.timeout, DEFAULT_TIMEOUT);

        let json = r#"{"host":"h","port":143,"username":"u","password":"p","tls":false,"timeout_ms":1500}"#;
        let settings: ConnectionSettings = serde_json::from_str(json).unwrap();
        assert!(!settings.tls);
        assert_eq!(settings.timeout, Duration::from_millis(1500));
    }
}
