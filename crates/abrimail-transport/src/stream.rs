//! Stream types and connectors.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info};

use crate::line::LineStream;
use crate::settings::ConnectionSettings;
use crate::{Error, Result};

/// A stream that can be either plaintext or TLS.
pub enum MailStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl MailStream {
    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl std::fmt::Debug for MailStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("MailStream::Plain"),
            Self::Tls(_) => f.write_str("MailStream::Tls"),
        }
    }
}

impl AsyncRead for MailStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for MailStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Creates a TLS connector trusting the webpki root store.
#[must_use]
pub fn create_tls_connector() -> TlsConnector {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}

/// Validates the settings and opens a line transport to the server.
///
/// Uses TLS with the webpki roots unless `settings.tls` is false. The
/// returned stream applies `settings.timeout` to every read and write.
///
/// # Errors
///
/// Fails with [`Error::Settings`] before touching the network when the
/// settings are invalid, and with [`Error::Connection`] or
/// [`Error::Timeout`] when connecting or negotiating TLS fails.
pub async fn open(settings: &ConnectionSettings) -> Result<LineStream<MailStream>> {
    settings.validate()?;

    let stream = if settings.tls {
        connect_tls(
            &settings.host,
            settings.port,
            &create_tls_connector(),
            settings.timeout,
        )
        .await?
    } else {
        connect_plain(&settings.host, settings.port, settings.timeout).await?
    };

    Ok(LineStream::new(stream).with_timeout(Some(settings.timeout)))
}

/// Opens a TLS transport using a caller-supplied connector.
///
/// # Errors
///
/// Same as [`open`], minus settings validation.
pub async fn open_with(
    host: &str,
    port: u16,
    connector: &TlsConnector,
    timeout: Duration,
) -> Result<LineStream<MailStream>> {
    let stream = connect_tls(host, port, connector, timeout).await?;
    Ok(LineStream::new(stream).with_timeout(Some(timeout)))
}

/// Connects over TCP and negotiates TLS, validating the server name.
///
/// # Errors
///
/// Returns [`Error::InvalidDnsName`] for a host that cannot be a TLS server
/// name, [`Error::Connection`] if TCP or the handshake fails, and
/// [`Error::Timeout`] if both together take longer than `timeout`.
pub async fn connect_tls(
    host: &str,
    port: u16,
    connector: &TlsConnector,
    timeout: Duration,
) -> Result<MailStream> {
    let address = format!("{host}:{port}");
    let server_name = ServerName::try_from(host.to_string())?;

    // The TCP stream is moved into the handshake future, so it is dropped
    // (and the socket closed) on every failure path below.
    let handshake = async {
        let tcp = TcpStream::connect(&address).await?;
        debug!(%address, "TCP connected, starting TLS handshake");
        connector.connect(server_name, tcp).await
    };

    match tokio::time::timeout(timeout, handshake).await {
        Ok(Ok(tls)) => {
            info!(%address, "TLS connection established");
            Ok(MailStream::Tls(Box::new(tls)))
        }
        Ok(Err(e)) => Err(Error::Connection {
            address,
            reason: e.to_string(),
        }),
        Err(_) => Err(Error::Timeout(timeout)),
    }
}

/// Connects without TLS (local test servers only).
///
/// # Errors
///
/// Returns [`Error::Connection`] or [`Error::Timeout`].
pub async fn connect_plain(host: &str, port: u16, timeout: Duration) -> Result<MailStream> {
    let address = format!("{host}:{port}");

    match tokio::time::timeout(timeout, TcpStream::connect(&address)).await {
        Ok(Ok(tcp)) => {
            info!(%address, "plaintext connection established");
            Ok(MailStream::Plain(tcp))
        }
        Ok(Err(e)) => Err(Error::Connection {
            address,
            reason: e.to_string(),
        }),
        Err(_) => Err(Error::Timeout(timeout)),
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

    #[tokio::test]
    async fn test_open_rejects_empty_host_before_connecting() {
        let settings = ConnectionSettings::new("", 993, "user", "pass");
        let err = open(&settings).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Settings(crate::SettingsError::EmptyHost)
        ));
    }

    #[tokio::test]
    async fn test_connect_plain_refused() {
        // Bind and immediately drop a listener to get a port nobody serves.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = connect_plain("127.0.0.1", port, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
    }

    #[tokio::test]
    async fn test_open_plain_reads_lines() {
        use tokio::io::AsyncWriteExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"220 hello\r\n").await.unwrap();
        });

        let settings = ConnectionSettings::new("127.0.0.1", port, "u", "p").with_tls(false);
        let mut stream = open(&settings).await.unwrap();
        assert_eq!(stream.read_line().await.unwrap(), b"220 hello\r\n");
        assert!(matches!(stream.read_line().await, Err(Error::EndOfStream)));
    }
}
