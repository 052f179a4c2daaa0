use std::error::Error;
use std::io;

use bytes::Bytes;
use http::Version;
use thiserror::Error;

use crate::protocol::Response;

/// A type-erased application error, as returned by responders
pub type BoxError = Box<dyn Error + Send + Sync>;

/// An error that knows how to render itself as an HTTP response.
///
/// When a request fails with an error carrying this capability, the connection
/// writes the rendered response and keeps serving the client. Every other error
/// is answered with a generic `500` and closes the connection.
pub trait ResponseRepresentable: Error + Send + Sync {
    fn response(&self) -> Response;
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("stream error: {source}")]
    StreamError {
        #[from]
        source: StreamError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SerializeError,
    },

    #[error("responder error: {source}")]
    ResponderError { source: BoxError },

    #[error("{0}")]
    Representable(Box<dyn ResponseRepresentable>),

    #[error("accept error: {source}")]
    AcceptError { source: io::Error },
}

impl HttpError {
    pub fn responder<E: Into<BoxError>>(e: E) -> Self {
        Self::ResponderError { source: e.into() }
    }

    pub fn representable<E: ResponseRepresentable + 'static>(e: E) -> Self {
        Self::Representable(Box::new(e))
    }

    pub fn accept<E: Into<io::Error>>(e: E) -> Self {
        Self::AcceptError { source: e.into() }
    }

    /// Returns the response rendering capability, if this error has one
    pub fn as_representable(&self) -> Option<&dyn ResponseRepresentable> {
        match self {
            HttpError::Representable(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    /// Whether the error means the peer is gone: a broken pipe, a reset or an
    /// early end of input.
    ///
    /// Such errors end a connection silently: there is nobody left to answer.
    /// Writing to a stream closed on our side ([`StreamError::Closed`]) is not
    /// one of them, it loses data and is reported like any other failure.
    pub fn is_peer_gone(&self) -> bool {
        match self {
            HttpError::StreamError { source } => source.is_peer_gone(),
            HttpError::ResponseError { source: SerializeError::Stream { source } } => source.is_peer_gone(),
            HttpError::RequestError { source: ParseError::Io { source } } => is_peer_gone_kind(source.kind()),
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            HttpError::StreamError { source } => source.is_timeout(),
            HttpError::ResponseError { source: SerializeError::Stream { source } } => source.is_timeout(),
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

/// Errors raised by [`Stream`](crate::stream::Stream) and
/// [`BodyStream`](crate::codec::BodyStream) operations.
///
/// `Closed` and `Timeout` carry the bytes that did not make it onto the wire.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("stream is closed, {} bytes not sent", .unsent.len())]
    Closed { unsent: Bytes },

    #[error("stream deadline exceeded, {} bytes not sent", .unsent.len())]
    Timeout { unsent: Bytes },

    #[error("unsupported stream operation")]
    Unsupported,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl StreamError {
    pub fn closed<B: Into<Bytes>>(unsent: B) -> Self {
        Self::Closed { unsent: unsent.into() }
    }

    pub fn timeout<B: Into<Bytes>>(unsent: B) -> Self {
        Self::Timeout { unsent: unsent.into() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// The bytes a failed write did not send, if the error kept them
    pub fn unsent(&self) -> Option<&Bytes> {
        match self {
            StreamError::Closed { unsent } | StreamError::Timeout { unsent } => Some(unsent),
            StreamError::Unsupported | StreamError::Io { .. } => None,
        }
    }

    pub fn is_peer_gone(&self) -> bool {
        match self {
            StreamError::Io { source } => is_peer_gone_kind(source.kind()),
            StreamError::Closed { .. } | StreamError::Timeout { .. } | StreamError::Unsupported => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, StreamError::Timeout { .. })
    }
}

#[derive(Error, Debug)]
pub enum SerializeError {
    #[error("unsupported http version: {0:?}")]
    UnsupportedVersion(Version),

    #[error("reading body failed: {source}")]
    Body { source: io::Error },

    #[error("stream error: {source}")]
    Stream {
        #[from]
        source: StreamError,
    },
}

impl SerializeError {
    pub fn body<E: Into<io::Error>>(e: E) -> Self {
        Self::Body { source: e.into() }
    }
}

impl From<io::Error> for SerializeError {
    fn from(e: io::Error) -> Self {
        Self::Stream { source: StreamError::io(e) }
    }
}

fn is_peer_gone_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}
