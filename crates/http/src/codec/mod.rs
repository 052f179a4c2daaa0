//! Wire codecs for HTTP/1.x messages.
//!
//! - Parsing: [`RequestParser`] buffers received bytes and yields complete
//!   requests through [`RequestDecoder`], a `tokio_util` [`Decoder`] built from
//!   the head decoder in [`header`] and the payload decoders in `body`
//! - Serializing: [`ResponseSerializer`] and [`RequestSerializer`] write a
//!   message onto a [`Stream`](crate::stream::Stream), framing streamed bodies
//!   with chunked transfer encoding through [`BodyStream`]
//!
//! # Example
//!
//! ```
//! use keel_http::codec::RequestParser;
//!
//! let mut parser = RequestParser::new();
//! let requests = parser.parse(b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
//! assert_eq!(requests[0].uri().path(), "/index.html");
//! ```
//!
//! [`Decoder`]: tokio_util::codec::Decoder

mod body;
mod body_stream;
pub mod header;
mod request_decoder;
mod serializer;

pub use body_stream::BodyStream;
pub use request_decoder::{RequestDecoder, RequestParser};
pub use serializer::{RequestSerializer, ResponseSerializer};
