//! Message head codecs.
//!
//! - [`HeaderDecoder`]: request start line and header section, with size limits
//! - [`HeaderEncoder`]: start line, headers and `Set-Cookie` lines of outgoing
//!   requests and responses

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
pub(crate) use header_encoder::allows_body;
