//! `abrimail` - command-line mail client
//!
//! Lists and reads mail over IMAP and sends it over SMTP, one short-lived
//! session per invocation.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod commands;
mod config;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command};
use commands::SendRequest;
use config::Resolver;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so that stdout stays parseable with --json.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "abrimail=info,abrimail_imap=debug,abrimail_smtp=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let resolver = Resolver::new(&cli.server)?;

    match cli.command {
        Command::Inbox { limit, mailbox } => {
            let settings = resolver.imap();
            debug!(server = %settings.address(), "resolved IMAP settings");
            commands::inbox(settings, &mailbox, limit, cli.json).await
        }
        Command::Read { id, mailbox, raw } => {
            let settings = resolver.imap();
            debug!(server = %settings.address(), "resolved IMAP settings");
            commands::read(settings, &mailbox, id, raw, cli.json).await
        }
        Command::Send {
            to,
            subject,
            body,
            from,
            client_domain,
        } => {
            let settings = resolver.smtp();
            debug!(server = %settings.address(), "resolved SMTP settings");
            let request = SendRequest {
                from,
                to,
                subject,
                body,
                client_domain,
            };
            commands::send(settings, request, cli.json).await
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_send() {
        let cli = Cli::try_parse_from([
            "abrimail",
            "--provider",
            "fastmail",
            "send",
            "--to",
            "a@example.com",
            "--to",
            "b@example.com",
            "--subject",
            "Hi",
        ])
        .unwrap();

        assert_eq!(
            cli.server.provider,
            Some(abrimail_transport::Provider::Fastmail)
        );
        match cli.command {
            Command::Send { to, subject, body, .. } => {
                assert_eq!(to, ["a@example.com", "b@example.com"]);
                assert_eq!(subject, "Hi");
                assert!(body.is_empty());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_inbox_defaults() {
        let cli = Cli::try_parse_from(["abrimail", "inbox", "--json"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Command::Inbox { limit, mailbox } => {
                assert_eq!(limit, 10);
                assert_eq!(mailbox, "INBOX");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_send_requires_recipient() {
        assert!(Cli::try_parse_from(["abrimail", "send", "--subject", "x"]).is_err());
        assert!(Cli::try_parse_from(["abrimail", "--provider", "aol", "inbox"]).is_err());
    }
}
