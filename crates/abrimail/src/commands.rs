//! Subcommand handlers.

use std::io::{self, Write};

use abrimail_imap::{HeaderRecord, MailboxInfo, Session};
use abrimail_smtp::{Mailer, OutgoingMessage};
use abrimail_transport::ConnectionSettings;
use anyhow::{Context, Result, bail};
use serde_json::json;
use tracing::debug;

/// Sequence range covering the newest `limit` of `total` messages.
///
/// Returns `None` when there is nothing to fetch.
pub const fn newest_range(total: u32, limit: u32) -> Option<(u32, u32)> {
    if total == 0 || limit == 0 {
        return None;
    }
    let count = if limit < total { limit } else { total };
    Some((total - count + 1, count))
}

/// Lists the newest messages of `mailbox`, newest first.
pub async fn inbox(
    settings: ConnectionSettings,
    mailbox: &str,
    limit: u32,
    json_output: bool,
) -> Result<()> {
    let (info, mut headers) = Session::scoped(settings, async |session: &mut Session| {
        let info = session.select_mailbox(mailbox).await?;
        let headers = match newest_range(info.message_count, limit) {
            Some((start, count)) => session.fetch_headers(start, count).await?,
            None => Vec::new(),
        };
        Ok((info, headers))
    })
    .await
    .with_context(|| format!("listing {mailbox}"))?;

    headers.sort_by(|a, b| b.seq.cmp(&a.seq));
    debug!(mailbox, shown = headers.len(), "listed mailbox");

    let mut out = io::stdout().lock();
    if json_output {
        print_json(&mut out, &inbox_json(&info, &headers))
    } else {
        print_inbox(&mut out, &info, &headers)
    }
}

/// Prints one message by sequence number.
pub async fn read(
    settings: ConnectionSettings,
    mailbox: &str,
    id: u32,
    raw: bool,
    json_output: bool,
) -> Result<()> {
    if id == 0 {
        bail!("message ids start at 1");
    }

    let message = Session::scoped(settings, async |session: &mut Session| {
        let info = session.select_mailbox(mailbox).await?;
        if id > info.message_count {
            return Ok(None);
        }
        session.fetch_message(id).await.map(Some)
    })
    .await
    .with_context(|| format!("reading message {id} in {mailbox}"))?;

    let Some(message) = message else {
        bail!("no message {id} in {mailbox}");
    };

    let mut out = io::stdout().lock();
    if raw {
        out.write_all(message.raw())?;
        return Ok(());
    }

    if json_output {
        return print_json(
            &mut out,
            &json!({
                "id": id,
                "from": message.from(),
                "to": message.to(),
                "subject": message.subject(),
                "date": message.date(),
                "content_type": message.content_type(),
                "body": message.body(),
            }),
        );
    }

    writeln!(out, "From:    {}", message.from())?;
    writeln!(out, "To:      {}", message.to())?;
    writeln!(out, "Subject: {}", message.subject())?;
    writeln!(out, "Date:    {}", message.date())?;
    writeln!(out)?;
    writeln!(out, "{}", message.body())?;
    Ok(())
}

/// Arguments of the `send` subcommand.
#[derive(Debug)]
pub struct SendRequest {
    pub from: Option<String>,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub client_domain: String,
}

impl SendRequest {
    /// Builds the message, defaulting the sender to the login name.
    pub fn message(&self, settings: &ConnectionSettings) -> OutgoingMessage {
        let from = self.from.as_deref().unwrap_or(&settings.username);
        self.to
            .iter()
            .fold(OutgoingMessage::new(from), |message, to| message.to(to))
            .subject(&self.subject)
            .body(&self.body)
    }
}

/// Submits one message.
pub async fn send(settings: ConnectionSettings, request: SendRequest, json_output: bool) -> Result<()> {
    let message = request.message(&settings);
    let mailer = Mailer::new(settings).with_client_domain(&request.client_domain);

    mailer.send(&message).await.context("sending message")?;

    let mut out = io::stdout().lock();
    if json_output {
        print_json(&mut out, &json!({ "sent": true, "recipients": request.to }))
    } else {
        writeln!(out, "Sent to {}", request.to.join(", "))?;
        Ok(())
    }
}

fn inbox_json(info: &MailboxInfo, headers: &[HeaderRecord]) -> serde_json::Value {
    let messages: Vec<_> = headers
        .iter()
        .map(|h| {
            json!({
                "id": h.seq,
                "from": h.from,
                "subject": h.subject,
                "date": h.date,
                "size": h.size,
                "read": h.is_read,
            })
        })
        .collect();

    json!({
        "mailbox": info.name,
        "total": info.message_count,
        "recent": info.recent_count,
        "read_only": info.read_only,
        "messages": messages,
    })
}

fn print_inbox(out: &mut impl Write, info: &MailboxInfo, headers: &[HeaderRecord]) -> Result<()> {
    writeln!(
        out,
        "{}: {} messages ({} recent)",
        info.name, info.message_count, info.recent_count
    )?;
    for h in headers {
        let marker = if h.is_read { ' ' } else { '*' };
        writeln!(
            out,
            "{marker}{:>6}  {:<30}  {}",
            h.seq,
            truncate(&h.from, 30),
            h.subject
        )?;
    }
    Ok(())
}

fn print_json(out: &mut impl Write, value: &serde_json::Value) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
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

    fn header(seq: u32, from: &str, subject: &str, is_read: bool) -> HeaderRecord {
        HeaderRecord {
            seq,
            from: from.to_string(),
            subject: subject.to_string(),
            is_read,
            ..HeaderRecord::default()
        }
    }

    #[test]
    fn test_newest_range() {
        assert_eq!(newest_range(0, 10), None);
        assert_eq!(newest_range(42, 0), None);
        assert_eq!(newest_range(42, 10), Some((33, 10)));
        assert_eq!(newest_range(3, 10), Some((1, 3)));
        assert_eq!(newest_range(10, 10), Some((1, 10)));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer sender name", 10), "a much ...");
    }

    #[test]
    fn test_print_inbox_marks_unread() {
        let info = MailboxInfo {
            name: "INBOX".to_string(),
            message_count: 2,
            recent_count: 1,
            read_only: false,
        };
        let headers = vec![
            header(2, "Bob <bob@example.com>", "New", false),
            header(1, "alice@example.com", "Old", true),
        ];

        let mut out = Vec::new();
        print_inbox(&mut out, &info, &headers).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines[0], "INBOX: 2 messages (1 recent)");
        assert!(lines[1].starts_with("*     2  Bob <bob@example.com>"));
        assert!(lines[1].ends_with("New"));
        assert!(lines[2].starts_with("      1  alice@example.com"));
    }

    #[test]
    fn test_inbox_json_shape() {
        let info = MailboxInfo {
            name: "Archive".to_string(),
            message_count: 1,
            recent_count: 0,
            read_only: true,
        };
        let value = inbox_json(&info, &[header(1, "a@example.com", "Hi", true)]);

        assert_eq!(value["mailbox"], "Archive");
        assert_eq!(value["read_only"], true);
        assert_eq!(value["messages"][0]["id"], 1);
        assert_eq!(value["messages"][0]["subject"], "Hi");
    }

    #[test]
    fn test_send_request_defaults_sender_to_username() {
        let settings = ConnectionSettings::new("smtp.example.com", 465, "me@example.com", "pw");
        let request = SendRequest {
            from: None,
            to: vec!["a@example.com".to_string(), "b@example.com".to_string()],
            subject: "Hi".to_string(),
            body: "Body".to_string(),
            client_domain: "localhost".to_string(),
        };

        let message = request.message(&settings);
        assert_eq!(message.sender(), "me@example.com");
        assert_eq!(message.recipients().len(), 2);

        let with_from = SendRequest {
            from: Some("alias@example.com".to_string()),
            ..request
        };
        assert_eq!(with_from.message(&settings).sender(), "alias@example.com");
    }
}
