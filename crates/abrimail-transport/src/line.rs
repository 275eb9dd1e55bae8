//! Line-oriented buffered transport.
//!
//! Both IMAP and SMTP exchange LF-terminated lines (CRLF on the wire), and
//! IMAP additionally embeds raw byte runs announced by a literal marker.
//! [`LineStream`] provides both reads over any async byte stream, bounding
//! each one with an optional timeout.

use std::fmt;
use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Maximum line length to prevent memory exhaustion.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Maximum size of a single exact read.
pub const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024; // 100 MB

/// Buffered line reader and writer over a byte stream.
///
/// After [`close`](Self::close) every operation fails with
/// [`Error::Closed`].
pub struct LineStream<S> {
    reader: Option<BufReader<S>>,
    io_timeout: Option<Duration>,
}

impl<S> LineStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a stream without any I/O timeout.
    pub fn new(stream: S) -> Self {
        Self {
            reader: Some(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream)),
            io_timeout: None,
        }
    }

    /// Sets the bound applied to every read and write.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Returns true until the stream is closed.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Reads bytes up to and including the next LF.
    ///
    /// # Errors
    ///
    /// [`Error::EndOfStream`] if the peer closes before a full line arrives,
    /// [`Error::Protocol`] if the line exceeds [`MAX_LINE_LENGTH`], and
    /// [`Error::Timeout`] if the read outlasts the configured bound.
    pub async fn read_line(&mut self) -> Result<Vec<u8>> {
        let timeout = self.io_timeout;
        let reader = self.reader()?;

        bounded(timeout, read_line_from(reader)).await
    }

    /// Reads a line and decodes it as UTF-8, replacing invalid sequences.
    ///
    /// # Errors
    ///
    /// Same as [`read_line`](Self::read_line).
    pub async fn read_text_line(&mut self) -> Result<String> {
        let line = self.read_line().await?;
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Reads exactly `len` bytes, continuing from any buffered data.
    ///
    /// The timeout applies to each chunk received, so a large literal on a
    /// slow link only fails if the peer stalls.
    ///
    /// # Errors
    ///
    /// [`Error::EndOfStream`] if the peer closes early, [`Error::Protocol`]
    /// if `len` exceeds [`MAX_LITERAL_SIZE`], [`Error::Timeout`] if no data
    /// arrives within the bound.
    pub async fn read_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        if len > MAX_LITERAL_SIZE {
            return Err(Error::Protocol(format!(
                "literal too large: {len} bytes (max {MAX_LITERAL_SIZE})"
            )));
        }

        let timeout = self.io_timeout;
        let reader = self.reader()?;

        let mut data = Vec::with_capacity(len);
        while data.len() < len {
            bounded(timeout, read_chunk(reader, &mut data, len)).await?;
        }
        Ok(data)
    }

    /// Writes all bytes and flushes.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] after close, otherwise I/O and timeout errors.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let timeout = self.io_timeout;
        let Some(reader) = self.reader.as_mut() else {
            return Err(Error::Closed);
        };

        bounded(timeout, write_flush(reader.get_mut(), data)).await
    }

    /// Shuts the stream down and releases it. Calling this twice is a no-op.
    pub async fn close(&mut self) {
        let Some(mut reader) = self.reader.take() else {
            return;
        };

        let shutdown = reader.get_mut().shutdown();
        let result = match self.io_timeout {
            Some(limit) => tokio::time::timeout(limit, shutdown)
                .await
                .unwrap_or_else(|_| Err(io::Error::from(io::ErrorKind::TimedOut))),
            None => shutdown.await,
        };

        if let Err(e) = result {
            debug!(error = %e, "error while shutting down stream");
        }
    }

    fn reader(&mut self) -> Result<&mut BufReader<S>> {
        self.reader.as_mut().ok_or(Error::Closed)
    }
}

impl<S> fmt::Debug for LineStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineStream")
            .field("open", &self.reader.is_some())
            .field("io_timeout", &self.io_timeout)
            .finish_non_exhaustive()
    }
}

/// Runs `fut`, failing with [`Error::Timeout`] if it outlasts `limit`.
async fn bounded<T>(limit: Option<Duration>, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .unwrap_or(Err(Error::Timeout(limit))),
        None => fut.await,
    }
}

async fn read_line_from<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Vec<u8>> {
    let mut line = Vec::new();

    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Err(Error::EndOfStream);
        }

        if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            line.extend_from_slice(&buf[..=pos]);
            reader.consume(pos + 1);
            return Ok(line);
        }

        let len = buf.len();
        line.extend_from_slice(buf);
        reader.consume(len);

        if line.len() > MAX_LINE_LENGTH {
            return Err(Error::Protocol("line too long".to_string()));
        }
    }
}

/// Appends whatever is available, up to `len` bytes in total.
async fn read_chunk<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    data: &mut Vec<u8>,
    len: usize,
) -> Result<()> {
    let buf = reader.fill_buf().await?;
    if buf.is_empty() {
        return Err(Error::EndOfStream);
    }

    let take = buf.len().min(len - data.len());
    data.extend_from_slice(&buf[..take]);
    reader.consume(take);
    Ok(())
}

async fn write_flush<W: AsyncWrite + Unpin>(writer: &mut W, data: &[u8]) -> Result<()> {
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
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
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_read_line() {
        let mock = Builder::new().read(b"* OK IMAP4rev1 ready\r\n").build();
        let mut stream = LineStream::new(mock);

        let line = stream.read_line().await.unwrap();
        assert_eq!(line, b"* OK IMAP4rev1 ready\r\n");
    }

    #[tokio::test]
    async fn test_read_line_split_across_reads() {
        let mock = Builder::new()
            .read(b"250-smtp.example")
            .read(b".com\r\n250 OK\r\n")
            .build();
        let mut stream = LineStream::new(mock);

        assert_eq!(stream.read_line().await.unwrap(), b"250-smtp.example.com\r\n");
        assert_eq!(stream.read_text_line().await.unwrap(), "250 OK\r\n");
    }

    #[tokio::test]
    async fn test_read_line_bare_lf() {
        let mock = Builder::new().read(b"first\nsecond\n").build();
        let mut stream = LineStream::new(mock);

        assert_eq!(stream.read_line().await.unwrap(), b"first\n");
        assert_eq!(stream.read_line().await.unwrap(), b"second\n");
    }

    #[tokio::test]
    async fn test_read_line_end_of_stream() {
        let mock = Builder::new().read(b"partial").build();
        let mut stream = LineStream::new(mock);

        assert!(matches!(stream.read_line().await, Err(Error::EndOfStream)));
    }

    #[tokio::test]
    async fn test_read_exact_after_line() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (BODY[] {5}\r\nhello)\r\n")
            .build();
        let mut stream = LineStream::new(mock);

        assert_eq!(
            stream.read_line().await.unwrap(),
            b"* 1 FETCH (BODY[] {5}\r\n"
        );
        assert_eq!(stream.read_exact(5).await.unwrap(), b"hello");
        assert_eq!(stream.read_line().await.unwrap(), b")\r\n");
    }

    #[tokio::test]
    async fn test_read_exact_short() {
        let mock = Builder::new().read(b"abc").build();
        let mut stream = LineStream::new(mock);

        assert!(matches!(stream.read_exact(10).await, Err(Error::EndOfStream)));
    }

    #[tokio::test]
    async fn test_read_exact_rejects_oversized() {
        let mock = Builder::new().build();
        let mut stream = LineStream::new(mock);

        assert!(matches!(
            stream.read_exact(MAX_LITERAL_SIZE + 1).await,
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_write_all() {
        let mock = Builder::new().write(b"A001 NOOP\r\n").build();
        let mut stream = LineStream::new(mock);

        stream.write_all(b"A001 NOOP\r\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_stream_rejects_operations() {
        let mock = Builder::new().build();
        let mut stream = LineStream::new(mock);
        assert!(stream.is_open());

        stream.close().await;
        stream.close().await;
        assert!(!stream.is_open());

        assert!(matches!(stream.read_line().await, Err(Error::Closed)));
        assert!(matches!(stream.read_exact(1).await, Err(Error::Closed)));
        assert!(matches!(stream.write_all(b"x").await, Err(Error::Closed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_literal_within_per_chunk_bound() {
        let (client, mut server) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            for chunk in [b"abc", b"def", b"ghi", b"jkl"] {
                tokio::time::sleep(Duration::from_secs(3)).await;
                server.write_all(chunk).await.unwrap();
            }
            server
        });
        let mut stream = LineStream::new(client).with_timeout(Some(Duration::from_secs(5)));

        // 12 s in total, never more than 3 s between chunks.
        assert_eq!(stream.read_exact(12).await.unwrap(), b"abcdefghijkl");
        drop(writer.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_literal_times_out() {
        let (client, mut server) = tokio::io::duplex(64);
        server.write_all(b"abc").await.unwrap();
        let mut stream = LineStream::new(client).with_timeout(Some(Duration::from_secs(5)));

        assert!(matches!(
            stream.read_exact(6).await,
            Err(Error::Timeout(d)) if d == Duration::from_secs(5)
        ));
    }

    #[tokio::test]
    async fn test_write_all_sends_payload_unchanged() {
        let payload = "x".repeat(3 * DEFAULT_BUFFER_SIZE);
        let mock = Builder::new().write(payload.as_bytes()).build();
        let mut stream = LineStream::new(mock);

        stream.write_all(payload.as_bytes()).await.unwrap();
        stream.write_all(b"").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_times_out() {
        // The server half stays open but never writes.
        let (client, _server) = tokio::io::duplex(64);
        let mut stream = LineStream::new(client).with_timeout(Some(Duration::from_secs(5)));

        assert!(matches!(
            stream.read_line().await,
            Err(Error::Timeout(d)) if d == Duration::from_secs(5)
        ));
    }
}
