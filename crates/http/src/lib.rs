//! An asynchronous HTTP/1.x connection pipeline
//!
//! This crate turns a byte stream into a sequence of served requests: it parses
//! incoming HTTP/1.0 and HTTP/1.1 requests, hands each one to a [`Responder`],
//! and writes the responses back in arrival order. It is built on tokio and is
//! transport agnostic: anything `AsyncRead + AsyncWrite` can back a [`Stream`].
//!
//! # Features
//!
//! - Keep-alive and pipelined requests, answered strictly in order
//! - `Content-Length` and chunked request bodies
//! - Buffered, reader backed and writer backed response bodies; streamed bodies
//!   use chunked transfer encoding
//! - Protocol upgrades: a response can take over the raw stream once sent
//! - Per-operation deadlines on every read and every serialized response
//! - Errors that render themselves as responses keep the connection alive
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use http::StatusCode;
//! use keel_http::connection::HttpConnection;
//! use keel_http::handler::responder_fn;
//! use keel_http::protocol::{HttpError, Request, Response};
//! use keel_http::stream::Stream;
//! use tokio::net::TcpListener;
//! use tracing::{error, info, warn};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = match TcpListener::bind("127.0.0.1:8080").await {
//!         Ok(listener) => listener,
//!         Err(e) => {
//!             error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!
//!     loop {
//!         let (tcp_stream, remote_addr) = match listener.accept().await {
//!             Ok(accepted) => accepted,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         tokio::spawn(async move {
//!             let stream = Stream::new(tcp_stream).with_peer_addr(remote_addr);
//!             let responder = responder_fn(hello_world);
//!             let timeout = Duration::from_secs(30);
//!             match HttpConnection::new(stream).process(&responder, timeout, timeout).await {
//!                 Ok(()) => info!("finished process, connection shutdown"),
//!                 Err(e) => error!(cause = %e, "connection failed"),
//!             }
//!         });
//!     }
//! }
//!
//! async fn hello_world(request: Request) -> Result<Response, HttpError> {
//!     info!(path = request.uri().path(), "receive request");
//!     Ok(Response::text(StatusCode::OK, "Hello World!\r\n"))
//! }
//! ```
//!
//! # Architecture
//!
//! - [`connection`]: the per-connection loop, keep-alive, upgrades and error recovery
//! - [`protocol`]: requests, responses, bodies, cookies and errors
//! - [`codec`]: request parsing and message serialization
//! - [`handler`]: the [`Responder`] trait
//! - [`stream`]: the transport abstraction with deadlines
//!
//! # Limitations
//!
//! - HTTP/1.x only (HTTP/2 or HTTP/3 is not supported)
//! - No TLS support (use a reverse proxy for HTTPS)
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64
//!
//! [`Responder`]: handler::Responder
//! [`Stream`]: stream::Stream

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod stream;

mod utils;
pub(crate) use utils::ensure;
