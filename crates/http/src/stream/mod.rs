//! Byte transport with per-operation deadlines.
//!
//! [`Stream`] wraps any `AsyncRead + AsyncWrite` transport (a TCP socket, or an
//! in-memory duplex pipe in tests). Writes are buffered up to the configured
//! buffer size and go out on [`Stream::flush`] or when the buffer fills up.
//! Once [`Stream::close`] has been called every read and write fails with
//! [`StreamError::Closed`].

mod deadline;

use std::fmt;
use std::fmt::{Debug, Formatter};
use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

pub use deadline::Deadline;

use crate::protocol::StreamError;

pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Anything a [`Stream`] can run over
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

pub struct Stream {
    inner: Box<dyn Transport>,
    write_buf: BytesMut,
    buffer_size: usize,
    peer_addr: Option<SocketAddr>,
    closed: bool,
}

impl Stream {
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        Self::with_capacity(transport, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity<T: Transport + 'static>(transport: T, buffer_size: usize) -> Self {
        let buffer_size = buffer_size.max(1);
        Self {
            inner: Box::new(transport),
            write_buf: BytesMut::with_capacity(buffer_size),
            buffer_size,
            peer_addr: None,
            closed: false,
        }
    }

    pub fn with_peer_addr(mut self, peer_addr: SocketAddr) -> Self {
        self.peer_addr = Some(peer_addr);
        self
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Reads into `buf`, returning the number of bytes read; `0` means end of input
    pub async fn read(&mut self, buf: &mut [u8], deadline: Deadline) -> Result<usize, StreamError> {
        if self.closed {
            return Err(StreamError::closed(Bytes::new()));
        }

        match deadline.run(self.inner.read(buf)).await {
            Ok(Ok(n)) => {
                trace!(read_bytes = n, "read from stream");
                Ok(n)
            }
            Ok(Err(e)) => Err(StreamError::io(e)),
            Err(_) => Err(StreamError::timeout(Bytes::new())),
        }
    }

    /// Buffers `bytes`, pushing the buffer out whenever it reaches the buffer size
    pub async fn write(&mut self, bytes: &[u8], deadline: Deadline) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::closed(Bytes::copy_from_slice(bytes)));
        }

        self.write_buf.extend_from_slice(bytes);
        if self.write_buf.len() >= self.buffer_size {
            self.drain(deadline).await?;
        }
        Ok(())
    }

    /// Writes out everything buffered and flushes the transport
    pub async fn flush(&mut self, deadline: Deadline) -> Result<(), StreamError> {
        if self.closed {
            return Err(StreamError::closed(self.write_buf.split().freeze()));
        }

        self.drain(deadline).await?;
        match deadline.run(self.inner.flush()).await {
            Ok(result) => result.map_err(StreamError::io),
            Err(_) => Err(StreamError::timeout(Bytes::new())),
        }
    }

    /// Marks the stream closed and shuts the transport down.
    ///
    /// Bytes still sitting in the write buffer are dropped; callers flush first.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.write_buf.clear();
        if let Err(e) = self.inner.shutdown().await {
            trace!(cause = %e, "shutdown transport failed");
        }
    }

    async fn drain(&mut self, deadline: Deadline) -> Result<(), StreamError> {
        while !self.write_buf.is_empty() {
            let written = match deadline.run(self.inner.write_buf(&mut self.write_buf)).await {
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return Err(StreamError::io(e)),
                Err(_) => return Err(StreamError::timeout(self.write_buf.split().freeze())),
            };

            if written == 0 {
                return Err(StreamError::io(std::io::Error::from(std::io::ErrorKind::WriteZero)));
            }
        }
        Ok(())
    }
}

impl Debug for Stream {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("peer_addr", &self.peer_addr)
            .field("buffer_size", &self.buffer_size)
            .field("buffered", &self.write_buf.len())
            .field("closed", &self.closed)
            .finish()
    }
}
