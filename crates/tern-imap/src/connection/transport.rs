//! Event-yielding transport over a plaintext or TLS stream.
//!
//! The transport owns no callbacks; the client core drives it by
//! awaiting [`Transport::next_event`] and reacting to the returned
//! [`TransportEvent`]. Inbound bytes accumulate in an internal buffer
//! drained by [`Transport::read_available`].

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{Security, ServerStream};
use crate::{Error, Result};

/// Initial capacity of the inbound buffer.
const READ_BUFFER_SIZE: usize = 8192;

/// I/O object usable as the client's byte stream.
///
/// Implemented for every `AsyncRead + AsyncWrite` type, so tests can
/// attach in-memory duplex streams where production code attaches a
/// [`ServerStream`].
pub trait StreamLike: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> StreamLike for T {}

/// Event surfaced by the transport to the client core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One or more bytes arrived and are buffered.
    Readable,
    /// The peer closed the connection.
    Disconnected,
    /// A socket-level failure; the connection is no longer usable.
    Error(String),
}

/// Byte transport for the client core.
pub struct Transport {
    stream: Option<Box<dyn StreamLike>>,
    inbound: BytesMut,
}

impl Transport {
    /// Creates a transport with no active connection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stream: None,
            inbound: BytesMut::with_capacity(READ_BUFFER_SIZE),
        }
    }

    /// Returns true while a stream is attached.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    /// Connects to a server and attaches the resulting stream.
    pub async fn connect(&mut self, host: &str, port: u16, security: Security) -> Result<()> {
        let stream = ServerStream::connect(host, port, security).await?;
        self.attach(Box::new(stream));
        Ok(())
    }

    /// Attaches an already-established stream.
    pub fn attach(&mut self, stream: Box<dyn StreamLike>) {
        self.inbound.clear();
        self.stream = Some(stream);
    }

    /// Shuts the stream down and detaches it.
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            // A failed shutdown still leaves us detached.
            stream.shutdown().await?;
        }
        Ok(())
    }

    /// Drops the stream without a graceful shutdown.
    pub fn abort(&mut self) {
        self.stream = None;
    }

    /// Writes and flushes the given bytes.
    ///
    /// A failure means the connection is no longer usable; the caller
    /// must fail the head in-flight entry with a transport error.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::Transport("no active connection".to_string()));
        };
        stream.write_all(bytes).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Drains and returns all bytes currently buffered.
    ///
    /// May be empty, may span a partial response, may span multiple
    /// responses.
    #[must_use]
    pub fn read_available(&mut self) -> Vec<u8> {
        let bytes = self.inbound.copy_to_bytes(self.inbound.len());
        bytes.to_vec()
    }

    /// Waits for the next transport event.
    ///
    /// Resolves to [`TransportEvent::Readable`] once bytes have been
    /// buffered, [`TransportEvent::Disconnected`] on EOF, and
    /// [`TransportEvent::Error`] on a read failure. After an EOF or an
    /// error the stream is detached.
    pub async fn next_event(&mut self) -> TransportEvent {
        let Some(stream) = self.stream.as_mut() else {
            return TransportEvent::Disconnected;
        };

        match stream.read_buf(&mut self.inbound).await {
            Ok(0) => {
                self.stream = None;
                TransportEvent::Disconnected
            }
            Ok(_) => TransportEvent::Readable,
            Err(err) => {
                self.stream = None;
                TransportEvent::Error(err.to_string())
            }
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::unreadable_literal
)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_available_drains_buffer() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut transport = Transport::new();
        transport.attach(Box::new(client));

        server.write_all(b"* OK ready\r\n").await.unwrap();

        assert_eq!(transport.next_event().await, TransportEvent::Readable);
        assert_eq!(transport.read_available(), b"* OK ready\r\n");
        assert!(transport.read_available().is_empty());
    }

    #[tokio::test]
    async fn test_eof_yields_disconnected() {
        let (client, server) = tokio::io::duplex(1024);
        let mut transport = Transport::new();
        transport.attach(Box::new(client));

        drop(server);

        assert_eq!(transport.next_event().await, TransportEvent::Disconnected);
        assert!(!transport.is_active());
    }

    #[tokio::test]
    async fn test_write_without_connection_fails() {
        let mut transport = Transport::new();
        let err = transport.write(b"A000 NOOP\r\n").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_write_round_trip() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut transport = Transport::new();
        transport.attach(Box::new(client));

        transport.write(b"A000 NOOP\r\n").await.unwrap();

        let mut buf = vec![0u8; 32];
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"A000 NOOP\r\n");
    }

    #[tokio::test]
    async fn test_scripted_read_error() {
        let mock = tokio_test::io::Builder::new()
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset by peer",
            ))
            .build();
        let mut transport = Transport::new();
        transport.attach(Box::new(mock));

        match transport.next_event().await {
            TransportEvent::Error(msg) => assert!(msg.contains("reset by peer")),
            other => panic!("expected error event, got {other:?}"),
        }
        assert!(!transport.is_active());
    }
}
