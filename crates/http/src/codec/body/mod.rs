//! Request payload decoding.
//!
//! - [`LengthDecoder`](length_decoder::LengthDecoder): `Content-Length` framing
//! - [`ChunkedDecoder`](chunked_decoder::ChunkedDecoder): chunked transfer encoding
//! - [`PayloadDecoder`]: picks one of the above from a [`PayloadSize`](crate::protocol::PayloadSize)

mod chunked_decoder;
mod length_decoder;
mod payload_decoder;

pub use payload_decoder::PayloadDecoder;
