//! Per-connection request processing.
//!
//! [`HttpConnection`] owns one [`Stream`](crate::stream::Stream) and runs the
//! read, parse, respond, serialize loop on it, including keep-alive, protocol
//! upgrades and recovery from request level errors.

mod http_connection;

pub use http_connection::HttpConnection;
