use bytes::Bytes;

use crate::protocol::StreamError;
use crate::stream::{Deadline, Stream};

pub(crate) const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

/// Write-only sink handed to [`BodyWriter`](crate::protocol::body::BodyWriter)s.
///
/// Every non-empty [`write`](BodyStream::write) goes out as one chunk
/// (`hex(len)` CRLF payload CRLF) on the borrowed transport. The stream lives
/// for one body serialization only; the serializer writes the terminating
/// zero-sized chunk once the writer returns.
#[derive(Debug)]
pub struct BodyStream<'a> {
    transport: &'a mut Stream,
    deadline: Deadline,
    closed: bool,
}

impl<'a> BodyStream<'a> {
    pub fn new(transport: &'a mut Stream, deadline: Deadline) -> Self {
        Self { transport, deadline, closed: false }
    }

    /// Sends `payload` as one chunk.
    ///
    /// Fails with [`StreamError::Closed`] carrying `payload` once the body
    /// stream (or the transport below it) is closed. Empty payloads are a no-op,
    /// an empty chunk would end the body.
    pub async fn write(&mut self, payload: &[u8]) -> Result<(), StreamError> {
        if self.closed || self.transport.is_closed() {
            return Err(StreamError::closed(Bytes::copy_from_slice(payload)));
        }

        if payload.is_empty() {
            return Ok(());
        }

        write_chunk(self.transport, payload, self.deadline).await
    }

    /// Body streams are write-only
    pub async fn read(&mut self, _buf: &mut [u8]) -> Result<usize, StreamError> {
        Err(StreamError::Unsupported)
    }

    pub async fn flush(&mut self) -> Result<(), StreamError> {
        self.transport.flush(self.deadline).await
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

pub(crate) async fn write_chunk(transport: &mut Stream, payload: &[u8], deadline: Deadline) -> Result<(), StreamError> {
    let size_line = format!("{:x}\r\n", payload.len());
    transport.write(size_line.as_bytes(), deadline).await?;
    transport.write(payload, deadline).await?;
    transport.write(b"\r\n", deadline).await
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, duplex};

    use super::*;

    #[tokio::test]
    async fn chunk_framing_on_the_wire() {
        let (mut client, server) = duplex(1024);
        let mut stream = Stream::new(server);

        let mut body = BodyStream::new(&mut stream, Deadline::Never);
        body.write(b"abc").await.unwrap();
        body.write(b"de").await.unwrap();
        stream.write(LAST_CHUNK, Deadline::Never).await.unwrap();
        stream.flush(Deadline::Never).await.unwrap();
        drop(stream);

        let mut wire = Vec::new();
        client.read_to_end(&mut wire).await.unwrap();
        assert_eq!(wire, b"3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n");
    }

    #[tokio::test]
    async fn write_after_close_keeps_payload() {
        let (_client, server) = duplex(64);
        let mut stream = Stream::new(server);
        let mut body = BodyStream::new(&mut stream, Deadline::Never);

        body.close();
        let e = body.write(b"unsent bytes").await.unwrap_err();

        assert!(matches!(e, StreamError::Closed { .. }));
        assert_eq!(e.unsent(), Some(&Bytes::from_static(b"unsent bytes")));
    }

    #[tokio::test]
    async fn read_is_unsupported() {
        let (_client, server) = duplex(64);
        let mut stream = Stream::new(server);
        let mut body = BodyStream::new(&mut stream, Deadline::Never);

        let mut buf = [0u8; 8];
        assert!(matches!(body.read(&mut buf).await, Err(StreamError::Unsupported)));
    }
}
