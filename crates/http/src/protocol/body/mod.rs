//! Message bodies.
//!
//! A body is exactly one of three shapes:
//!
//! - [`Body::Buffer`]: bytes already in memory, written verbatim
//! - [`Body::Reader`]: an `AsyncRead` source, drained and sent as chunks
//! - [`Body::Writer`]: a producer handed a [`BodyStream`] to push chunks into
//!
//! Streamed bodies (reader and writer) are framed with chunked transfer encoding
//! by the serializers.

use std::fmt;
use std::fmt::{Debug, Formatter};
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::io::AsyncRead;

use crate::codec::BodyStream;
use crate::protocol::StreamError;

pub type BodyReader = Pin<Box<dyn AsyncRead + Send>>;

/// Produces a streamed body by writing into a [`BodyStream`].
///
/// Every non-empty write becomes one chunk on the wire; the terminating chunk is
/// written by the serializer after `write_body` returns.
#[async_trait]
pub trait BodyWriter: Send {
    async fn write_body(self: Box<Self>, body: &mut BodyStream<'_>) -> Result<(), StreamError>;
}

pub enum Body {
    Buffer(Bytes),
    Reader(BodyReader),
    Writer(Box<dyn BodyWriter>),
}

impl Body {
    pub fn empty() -> Self {
        Body::Buffer(Bytes::new())
    }

    pub fn reader<R: AsyncRead + Send + 'static>(reader: R) -> Self {
        Body::Reader(Box::pin(reader))
    }

    pub fn writer<W: BodyWriter + 'static>(writer: W) -> Self {
        Body::Writer(Box::new(writer))
    }

    /// Whether the body goes out with chunked framing
    pub fn is_streamed(&self) -> bool {
        !matches!(self, Body::Buffer(_))
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Body::Buffer(bytes) => Some(bytes),
            Body::Reader(_) | Body::Writer(_) => None,
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl Debug for Body {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Body::Buffer(bytes) => f.debug_tuple("Buffer").field(bytes).finish(),
            Body::Reader(_) => f.write_str("Reader(..)"),
            Body::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Buffer(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Buffer(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Body::Buffer(Bytes::from(value))
    }
}

impl From<&'static str> for Body {
    fn from(value: &'static str) -> Self {
        Body::Buffer(Bytes::from_static(value.as_bytes()))
    }
}

/// A [`BodyWriter`] built from a closure, see [`body_writer`]
pub struct WriterFn<F> {
    f: F,
}

#[async_trait]
impl<F> BodyWriter for WriterFn<F>
where
    F: for<'a, 'b> FnOnce(&'a mut BodyStream<'b>) -> BoxFuture<'a, Result<(), StreamError>> + Send,
{
    async fn write_body(self: Box<Self>, body: &mut BodyStream<'_>) -> Result<(), StreamError> {
        (self.f)(body).await
    }
}

/// Wraps a closure into a writer body.
///
/// ```no_run
/// use keel_http::protocol::body::{body_writer, Body};
///
/// let body = Body::Writer(Box::new(body_writer(|stream| {
///     Box::pin(async move {
///         stream.write(b"hello ").await?;
///         stream.write(b"world").await
///     })
/// })));
/// ```
pub fn body_writer<F>(f: F) -> WriterFn<F>
where
    F: for<'a, 'b> FnOnce(&'a mut BodyStream<'b>) -> BoxFuture<'a, Result<(), StreamError>> + Send,
{
    WriterFn { f }
}
