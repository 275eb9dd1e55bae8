//! Settings resolution for the command line.
//!
//! Starting point, lowest priority first: protocol defaults, provider
//! preset, settings file. Flags and environment variables (merged by clap)
//! are applied on top.

use std::fs;
use std::path::Path;
use std::time::Duration;

use abrimail_transport::{ConnectionSettings, DEFAULT_IMAP_PORT, DEFAULT_SMTP_PORT};
use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::ServerArgs;

/// Contents of a `--config` file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Mailbox server.
    #[serde(default)]
    pub imap: Option<ConnectionSettings>,
    /// Submission server.
    #[serde(default)]
    pub smtp: Option<ConnectionSettings>,
}

impl FileConfig {
    /// Reads and parses a settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing settings file {}", path.display()))
    }

    fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Resolves IMAP and SMTP settings from every source.
#[derive(Debug)]
pub struct Resolver<'a> {
    args: &'a ServerArgs,
    file: FileConfig,
}

impl<'a> Resolver<'a> {
    /// Loads the settings file named by `args`, if any.
    pub fn new(args: &'a ServerArgs) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Ok(Self::with_file(args, file))
    }

    const fn with_file(args: &'a ServerArgs, file: FileConfig) -> Self {
        Self { args, file }
    }

    /// Settings for the mailbox server.
    pub fn imap(&self) -> ConnectionSettings {
        let base = self.file.imap.clone().unwrap_or_else(|| match self.args.provider {
            Some(provider) => ConnectionSettings::imap_preset(provider, "", ""),
            None => ConnectionSettings::new("", DEFAULT_IMAP_PORT, "", ""),
        });

        self.apply(base, self.args.imap_host.as_deref(), self.args.imap_port)
    }

    /// Settings for the submission server.
    ///
    /// Credentials fall back to the IMAP ones, since most providers share
    /// them.
    pub fn smtp(&self) -> ConnectionSettings {
        let base = self.file.smtp.clone().unwrap_or_else(|| {
            self.args
                .provider
                .and_then(|provider| ConnectionSettings::smtp_preset(provider, "", ""))
                .unwrap_or_else(|| ConnectionSettings::new("", DEFAULT_SMTP_PORT, "", ""))
        });

        let mut settings = self.apply(base, self.args.smtp_host.as_deref(), self.args.smtp_port);
        if settings.username.is_empty() || settings.password.is_empty() {
            let imap = self.imap();
            if settings.username.is_empty() {
                settings.username = imap.username;
            }
            if settings.password.is_empty() {
                settings.password = imap.password;
            }
        }
        settings
    }

    fn apply(
        &self,
        mut settings: ConnectionSettings,
        host: Option<&str>,
        port: Option<u16>,
    ) -> ConnectionSettings {
        if let Some(host) = host {
            settings.host = host.to_string();
        }
        if let Some(port) = port {
            settings.port = port;
        }
        if let Some(username) = &self.args.username {
            settings.username.clone_from(username);
        }
        if let Some(password) = &self.args.password {
            settings.password.clone_from(password);
        }
        if self.args.no_tls {
            settings.tls = false;
        }
        if let Some(secs) = self.args.timeout {
            settings.timeout = Duration::from_secs(secs);
        }
        settings
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
    use abrimail_transport::Provider;

    #[test]
    fn test_defaults_are_invalid_without_host() {
        let args = ServerArgs::default();
        let resolver = Resolver::with_file(&args, FileConfig::default());

        let imap = resolver.imap();
        assert_eq!(imap.port, DEFAULT_IMAP_PORT);
        assert!(imap.tls);
        assert!(imap.validate().is_err());
        assert_eq!(resolver.smtp().port, DEFAULT_SMTP_PORT);
    }

    #[test]
    fn test_provider_preset_with_overrides() {
        let args = ServerArgs {
            provider: Some(Provider::Gmail),
            username: Some("me@gmail.com".to_string()),
            password: Some("app-password".to_string()),
            imap_port: Some(1993),
            timeout: Some(5),
            ..ServerArgs::default()
        };
        let resolver = Resolver::with_file(&args, FileConfig::default());

        let imap = resolver.imap();
        assert_eq!(imap.host, "imap.gmail.com");
        assert_eq!(imap.port, 1993);
        assert_eq!(imap.username, "me@gmail.com");
        assert_eq!(imap.timeout, Duration::from_secs(5));
        assert!(imap.validate().is_ok());

        let smtp = resolver.smtp();
        assert_eq!(smtp.host, "smtp.gmail.com");
        assert_eq!(smtp.port, DEFAULT_SMTP_PORT);
        assert_eq!(smtp.password, "app-password");
    }

    #[test]
    fn test_outlook_has_no_smtp_preset() {
        let args = ServerArgs {
            provider: Some(Provider::Outlook),
            ..ServerArgs::default()
        };
        let resolver = Resolver::with_file(&args, FileConfig::default());

        assert_eq!(resolver.imap().host, "outlook.office365.com");
        assert!(resolver.smtp().host.is_empty());
    }

    #[test]
    fn test_file_config_with_flag_override() {
        let file = FileConfig::parse(
            r#"{
                "imap": {
                    "host": "mail.example.com",
                    "port": 993,
                    "username": "me",
                    "password": "file-secret",
                    "timeout_ms": 10000
                },
                "smtp": {
                    "host": "smtp.example.com",
                    "port": 465,
                    "username": "",
                    "password": "",
                    "tls": false
                }
            }"#,
        )
        .unwrap();
        let args = ServerArgs {
            imap_host: Some("localhost".to_string()),
            ..ServerArgs::default()
        };
        let resolver = Resolver::with_file(&args, file);

        let imap = resolver.imap();
        assert_eq!(imap.host, "localhost");
        assert_eq!(imap.password, "file-secret");
        assert_eq!(imap.timeout, Duration::from_secs(10));

        let smtp = resolver.smtp();
        assert_eq!(smtp.host, "smtp.example.com");
        assert!(!smtp.tls);
        assert_eq!(smtp.username, "me");
        assert_eq!(smtp.password, "file-secret");
    }

    #[test]
    fn test_file_config_rejects_unknown_sections() {
        assert!(FileConfig::parse(r#"{"pop3": {}}"#).is_err());
        assert!(FileConfig::parse("{}").unwrap().imap.is_none());
    }
}
