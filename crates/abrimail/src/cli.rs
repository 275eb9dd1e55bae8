//! Command-line arguments.

use std::path::PathBuf;

use abrimail_transport::Provider;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "abrimail", version)]
#[command(about = "Read and send mail over bare IMAP and SMTP sessions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub server: ServerArgs,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

/// Connection options. Flags override the environment, which overrides the
/// settings file and the provider preset.
#[derive(Debug, Default, Args)]
pub struct ServerArgs {
    /// JSON settings file with `imap` and/or `smtp` sections
    #[arg(long, env = "ABRIMAIL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Well-known provider (gmail, outlook, yahoo, fastmail)
    #[arg(long, env = "ABRIMAIL_PROVIDER", global = true)]
    pub provider: Option<Provider>,

    /// IMAP server hostname
    #[arg(long, env = "ABRIMAIL_IMAP_HOST", global = true)]
    pub imap_host: Option<String>,

    /// IMAP server port
    #[arg(long, env = "ABRIMAIL_IMAP_PORT", global = true)]
    pub imap_port: Option<u16>,

    /// SMTP server hostname
    #[arg(long, env = "ABRIMAIL_SMTP_HOST", global = true)]
    pub smtp_host: Option<String>,

    /// SMTP server port
    #[arg(long, env = "ABRIMAIL_SMTP_PORT", global = true)]
    pub smtp_port: Option<u16>,

    /// Login name for both servers
    #[arg(long, env = "ABRIMAIL_USERNAME", global = true)]
    pub username: Option<String>,

    /// Password for both servers
    #[arg(long, env = "ABRIMAIL_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Connect without TLS (local test servers only)
    #[arg(long, global = true)]
    pub no_tls: bool,

    /// Connect and read timeout in seconds
    #[arg(long, env = "ABRIMAIL_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the newest messages in a mailbox
    Inbox {
        /// Maximum number of messages to show
        #[arg(long, default_value = "10")]
        limit: u32,

        /// Mailbox to list
        #[arg(long, default_value = abrimail_imap::DEFAULT_MAILBOX)]
        mailbox: String,
    },

    /// Show one message by sequence number
    Read {
        /// Message sequence number
        id: u32,

        /// Mailbox containing the message
        #[arg(long, default_value = abrimail_imap::DEFAULT_MAILBOX)]
        mailbox: String,

        /// Print the raw message instead of the parsed fields
        #[arg(long)]
        raw: bool,
    },

    /// Send a plain text message
    Send {
        /// Recipient address (repeat for several)
        #[arg(long, required = true)]
        to: Vec<String>,

        /// Subject line
        #[arg(long, default_value = "")]
        subject: String,

        /// Message body
        #[arg(long, default_value = "")]
        body: String,

        /// Sender address (defaults to the SMTP username)
        #[arg(long)]
        from: Option<String>,

        /// Domain announced in EHLO
        #[arg(long, default_value = abrimail_smtp::DEFAULT_CLIENT_DOMAIN)]
        client_domain: String,
    },
}
