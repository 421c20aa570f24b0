//! TCP transport implementation
//!
//! The bulk stream carries frames laid out as described in
//! [`yfp_core::framing`]: a 4-byte big-endian header length, the encoded
//! FRAME envelope, then the raw payload bytes. The payload is not
//! length-prefixed; readers find its end from the header's format.

use bytes::{Buf, Bytes, BytesMut};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use yfp_core::framing::{self, LENGTH_PREFIX_SIZE, MAX_PAYLOAD_SIZE};
use yfp_core::{codec, FrameHeader, Message, Timestamp, DEFAULT_FRAME_FORMAT};

use crate::error::{Result, TransportError};

/// Default bounded connect timeout
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read chunk size while searching for a payload boundary
const READ_CHUNK_SIZE: usize = 32 * 1024;

/// TCP configuration
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Upper bound on connection establishment
    pub connect_timeout: Duration,
    /// Disable Nagle's algorithm on the stream
    pub nodelay: bool,
    /// Keep-alive interval in seconds (0 = disabled)
    pub keepalive_secs: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            nodelay: true,
            keepalive_secs: 30,
        }
    }
}

/// TCP transport
pub struct TcpTransport {
    config: TcpConfig,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self {
            config: TcpConfig::default(),
        }
    }

    pub fn with_config(config: TcpConfig) -> Self {
        Self { config }
    }

    /// Connect to a TCP server within the configured timeout
    pub async fn connect(&self, addr: SocketAddr) -> Result<TcpStream> {
        info!("Connecting to TCP: {}", addr);

        let stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        if self.config.nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                warn!("Failed to set TCP_NODELAY: {}", e);
            }
        }

        // Enable TCP keepalive if configured
        if self.config.keepalive_secs > 0 {
            let socket = socket2::SockRef::from(&stream);
            let keepalive = socket2::TcpKeepalive::new()
                .with_time(Duration::from_secs(self.config.keepalive_secs));
            let _ = socket.set_tcp_keepalive(&keepalive);
        }

        info!("TCP connected to {}", addr);
        Ok(stream)
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes frames onto a bulk stream
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Write `len32be(H) || H || payload`, then flush
    pub async fn write_frame(&mut self, header: &[u8], payload: &[u8]) -> Result<()> {
        let prefix = framing::length_prefix(header.len())?;

        self.inner.write_all(&prefix).await.map_err(send_failed)?;
        self.inner.write_all(header).await.map_err(send_failed)?;
        self.inner.write_all(payload).await.map_err(send_failed)?;
        self.inner.flush().await.map_err(send_failed)?;

        debug!(
            "Frame written: header={} bytes, payload={} bytes",
            header.len(),
            payload.len()
        );
        Ok(())
    }

    /// Shut down the write side of the stream
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await.map_err(TransportError::Io)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

fn send_failed(e: std::io::Error) -> TransportError {
    match e.kind() {
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
            TransportError::ConnectionClosed
        }
        _ => TransportError::SendFailed(e.to_string()),
    }
}

/// A frame read back off a bulk stream
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedFrame {
    /// Timestamp of the FRAME envelope
    pub timestamp: Timestamp,
    pub header: FrameHeader,
    pub payload: Bytes,
}

/// Reads frames from a bulk stream (the server side of the protocol).
///
/// JPEG payloads end at their end-of-image marker. Payloads in any other
/// format run to the end of the stream.
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    eof: bool,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            eof: false,
        }
    }

    /// Read the next frame. Returns `None` on a clean end of stream.
    pub async fn read_frame(&mut self) -> Result<Option<ReceivedFrame>> {
        while self.buf.len() < LENGTH_PREFIX_SIZE {
            if !self.fill().await? {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(TransportError::Protocol("incomplete length prefix".into()));
            }
        }

        let header_len = framing::validate_header_len(self.buf.get_u32())?;

        while self.buf.len() < header_len {
            if !self.fill().await? {
                return Err(TransportError::Protocol("incomplete header".into()));
            }
        }

        let header_bytes = self.buf.split_to(header_len).freeze();
        let envelope = codec::decode(&header_bytes)?;
        let header = match envelope.message {
            Message::Frame(header) => header,
            other => {
                return Err(TransportError::Protocol(format!(
                    "expected FRAME header, got {}",
                    other.type_name()
                )))
            }
        };

        let payload = if header.format.eq_ignore_ascii_case(DEFAULT_FRAME_FORMAT) {
            self.read_jpeg_payload().await?
        } else {
            self.read_to_end().await?
        };

        debug!(
            "Frame {} read: {} payload bytes",
            header.frame_id,
            payload.len()
        );

        Ok(Some(ReceivedFrame {
            timestamp: envelope.timestamp,
            header,
            payload,
        }))
    }

    async fn read_jpeg_payload(&mut self) -> Result<Bytes> {
        loop {
            if let Some(end) = framing::jpeg_end(&self.buf) {
                return Ok(self.buf.split_to(end).freeze());
            }
            if self.buf.len() > MAX_PAYLOAD_SIZE {
                return Err(TransportError::Protocol(format!(
                    "payload exceeds {} bytes without end-of-image marker",
                    MAX_PAYLOAD_SIZE
                )));
            }
            if !self.fill().await? {
                return Ok(self.buf.split().freeze());
            }
        }
    }

    async fn read_to_end(&mut self) -> Result<Bytes> {
        while self.fill().await? {
            if self.buf.len() > MAX_PAYLOAD_SIZE {
                return Err(TransportError::Protocol(format!(
                    "payload exceeds {} bytes",
                    MAX_PAYLOAD_SIZE
                )));
            }
        }
        Ok(self.buf.split().freeze())
    }

    /// Read more bytes into the buffer. Returns `false` at end of stream.
    async fn fill(&mut self) -> Result<bool> {
        if self.eof {
            return Ok(false);
        }
        self.buf.reserve(READ_CHUNK_SIZE);
        let n = self
            .inner
            .read_buf(&mut self.buf)
            .await
            .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;
        if n == 0 {
            self.eof = true;
        }
        Ok(n > 0)
    }
}
