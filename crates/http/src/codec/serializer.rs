//! Request and response serialization onto a [`Stream`].
//!
//! The head goes out through [`HeaderEncoder`], then the body:
//!
//! - buffered bodies are written verbatim
//! - reader bodies are drained `buffer_size` bytes at a time, one chunk per read
//! - writer bodies get a [`BodyStream`] and produce their own chunks
//!
//! Streamed bodies end with the zero-sized chunk. The transport is flushed once
//! the whole message is written. Bodies of 1xx, 204 and 304 responses are
//! dropped unsent.

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncReadExt;
use tokio_util::codec::Encoder;
use tracing::trace;

use crate::codec::body_stream::{LAST_CHUNK, write_chunk};
use crate::codec::header::{HeaderEncoder, allows_body};
use crate::codec::BodyStream;
use crate::protocol::body::{Body, BodyReader, BodyWriter};
use crate::protocol::{Request, Response, SerializeError, StreamError};
use crate::stream::{Deadline, Stream};

#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseSerializer;

impl ResponseSerializer {
    /// Writes `response` and flushes. Any upgrade it carries is left untouched.
    pub async fn serialize(
        &self,
        mut response: Response,
        stream: &mut Stream,
        deadline: Deadline,
    ) -> Result<(), SerializeError> {
        let mut head = BytesMut::new();
        HeaderEncoder.encode(&response, &mut head)?;
        trace!(status = %response.status(), head_len = head.len(), "serialize response");

        stream.write(&head, deadline).await?;
        let body = response.take_body();
        if allows_body(response.status()) {
            write_body(body, stream, deadline).await?;
        } else {
            trace!(status = %response.status(), body = ?body, "status carries no body, drop it");
        }
        stream.flush(deadline).await?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RequestSerializer;

impl RequestSerializer {
    pub async fn serialize(
        &self,
        mut request: Request,
        stream: &mut Stream,
        deadline: Deadline,
    ) -> Result<(), SerializeError> {
        let mut head = BytesMut::new();
        HeaderEncoder.encode(&request, &mut head)?;
        trace!(method = %request.method(), head_len = head.len(), "serialize request");

        stream.write(&head, deadline).await?;
        write_body(request.take_body(), stream, deadline).await?;
        stream.flush(deadline).await?;
        Ok(())
    }
}

async fn write_body(body: Body, stream: &mut Stream, deadline: Deadline) -> Result<(), SerializeError> {
    match body {
        Body::Buffer(bytes) => {
            if !bytes.is_empty() {
                stream.write(&bytes, deadline).await?;
            }
        }
        Body::Reader(reader) => {
            write_reader(reader, stream, deadline).await?;
            stream.write(LAST_CHUNK, deadline).await?;
        }
        Body::Writer(writer) => {
            write_writer(writer, stream, deadline).await?;
            stream.write(LAST_CHUNK, deadline).await?;
        }
    }
    Ok(())
}

async fn write_reader(mut reader: BodyReader, stream: &mut Stream, deadline: Deadline) -> Result<(), SerializeError> {
    let mut buf = vec![0u8; stream.buffer_size()];
    loop {
        let n = match deadline.run(reader.read(&mut buf)).await {
            Ok(result) => result.map_err(SerializeError::body)?,
            Err(_) => return Err(StreamError::timeout(Bytes::new()).into()),
        };
        if n == 0 {
            return Ok(());
        }
        write_chunk(stream, &buf[..n], deadline).await?;
    }
}

async fn write_writer(
    writer: Box<dyn BodyWriter>,
    stream: &mut Stream,
    deadline: Deadline,
) -> Result<(), SerializeError> {
    let mut body_stream = BodyStream::new(stream, deadline);
    writer.write_body(&mut body_stream).await?;
    Ok(())
}
