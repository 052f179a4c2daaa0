//! The keel server: an accept loop with retry, a middleware chain and sessions,
//! on top of the [`keel_http`] connection pipeline.
//!
//! ```no_run
//! use http::StatusCode;
//! use keel_http::handler::responder_fn;
//! use keel_http::protocol::{HttpError, Request, Response};
//! use keel_web::session::{RequestSessionExt, SessionMiddleware};
//! use keel_web::{Server, init_logging};
//! use tracing::Level;
//!
//! async fn hello(request: Request) -> Result<Response, HttpError> {
//!     let visits = request.session().map_or(0, |s| s.get_as::<u64>("visits").unwrap_or(0));
//!     Ok(Response::text(StatusCode::OK, format!("hello, visit #{visits}")))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging(Level::INFO)?;
//!
//!     Server::builder()
//!         .host("127.0.0.1")
//!         .port(3000)
//!         .middleware(SessionMiddleware::in_memory())
//!         .responder(responder_fn(hello))
//!         .build()?
//!         .start()
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod middleware;
pub mod server;
pub mod session;

pub use server::{Server, ServerBuildError, ServerBuilder};

use tracing::Level;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::FmtSubscriber;

/// Installs a global fmt subscriber logging at `level` and above.
///
/// The library itself never installs one; binaries call this once at startup.
pub fn init_logging(level: Level) -> Result<(), SetGlobalDefaultError> {
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
}
