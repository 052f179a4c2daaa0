//! The accept loop.
//!
//! A [`Server`] accepts connections from a [`Listener`] and runs every one of
//! them on its own tokio task through
//! [`HttpConnection`](keel_http::connection::HttpConnection). Accept errors are
//! retried by a [`RetryPolicy`]; errors inside a connection reach only the
//! failure sink, never the accept loop or other connections.

mod listener;
mod retry;

pub use listener::{Listener, TcpHost};
pub use retry::RetryPolicy;

use std::fmt;
use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use keel_http::connection::HttpConnection;
use keel_http::handler::Responder;
use keel_http::protocol::HttpError;
use keel_http::stream::{DEFAULT_BUFFER_SIZE, Deadline, Stream};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::middleware::{Middleware, Middlewares, MiddlewaresBuilder};

/// Receives every error a connection could not recover from, once per connection
pub type FailureSink = Arc<dyn Fn(HttpError) + Send + Sync>;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BACKLOG: u32 = 128;
pub const DEFAULT_RETRIES: u32 = 10;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SERIALIZE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("responder must be set")]
    MissingResponder,

    #[error("invalid host {host:?}: {source}")]
    InvalidHost { host: String, source: AddrParseError },

    #[error("buffer size must be greater than zero")]
    ZeroBufferSize,
}

pub struct ServerBuilder {
    host: String,
    port: u16,
    backlog: u32,
    reuse_port: bool,
    buffer_size: usize,
    listener: Option<Box<dyn Listener>>,
    middlewares: MiddlewaresBuilder,
    responder: Option<Box<dyn Responder>>,
    failure: FailureSink,
    retry: RetryPolicy,
    read_timeout: Duration,
    serialize_timeout: Duration,
}

impl ServerBuilder {
    fn new() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            backlog: DEFAULT_BACKLOG,
            reuse_port: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
            listener: None,
            middlewares: Middlewares::builder(),
            responder: None,
            failure: Arc::new(log_failure),
            retry: RetryPolicy::new(DEFAULT_RETRIES, DEFAULT_BACKOFF),
            read_timeout: DEFAULT_READ_TIMEOUT,
            serialize_timeout: DEFAULT_SERIALIZE_TIMEOUT,
        }
    }

    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn reuse_port(mut self, reuse_port: bool) -> Self {
        self.reuse_port = reuse_port;
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Accepts from `listener` instead of binding a [`TcpHost`]; host, port,
    /// backlog, reuse-port and buffer size are then the listener's business
    pub fn listener<L: Listener + 'static>(mut self, listener: L) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    /// Adds `middleware` inside the ones added before it
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares = self.middlewares.add_last(middleware);
        self
    }

    /// Adds a whole list, inside the middleware added before it
    pub fn middlewares(mut self, middlewares: Middlewares) -> Self {
        self.middlewares = self.middlewares.add_last(middlewares);
        self
    }

    pub fn responder<R: Responder + 'static>(mut self, responder: R) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    pub fn failure<F: Fn(HttpError) + Send + Sync + 'static>(mut self, failure: F) -> Self {
        self.failure = Arc::new(failure);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retry = RetryPolicy::new(retries, self.retry.backoff());
        self
    }

    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.retry = RetryPolicy::new(self.retry.retries(), backoff);
        self
    }

    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn serialize_timeout(mut self, serialize_timeout: Duration) -> Self {
        self.serialize_timeout = serialize_timeout;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let responder = self.responder.ok_or(ServerBuildError::MissingResponder)?;
        let ip = self
            .host
            .parse::<IpAddr>()
            .map_err(|source| ServerBuildError::InvalidHost { host: self.host.clone(), source })?;
        if self.buffer_size == 0 {
            return Err(ServerBuildError::ZeroBufferSize);
        }

        Ok(Server {
            address: SocketAddr::new(ip, self.port),
            backlog: self.backlog,
            reuse_port: self.reuse_port,
            buffer_size: self.buffer_size,
            listener: self.listener,
            responder: self.middlewares.build().chain(responder),
            failure: self.failure,
            retry: self.retry,
            read_timeout: self.read_timeout,
            serialize_timeout: self.serialize_timeout,
        })
    }
}

pub struct Server {
    address: SocketAddr,
    backlog: u32,
    reuse_port: bool,
    buffer_size: usize,
    listener: Option<Box<dyn Listener>>,
    responder: Arc<dyn Responder>,
    failure: FailureSink,
    retry: RetryPolicy,
    read_timeout: Duration,
    serialize_timeout: Duration,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Runs the accept loop.
    ///
    /// Only returns when binding fails or accepting failed `retries` times in a
    /// row; the error is the last accept error.
    pub async fn start(self) -> Result<(), HttpError> {
        let listener: Box<dyn Listener> = match self.listener {
            Some(listener) => listener,
            None => {
                let host = TcpHost::bind(self.address, self.backlog, self.reuse_port)
                    .map_err(HttpError::accept)?
                    .with_buffer_size(self.buffer_size);
                Box::new(host)
            }
        };

        match listener.local_addr() {
            Ok(addr) => info!(host = %addr.ip(), port = addr.port(), "keel server listening"),
            Err(_) => info!(host = %self.address.ip(), port = self.address.port(), "keel server listening"),
        }

        let connection = Arc::new(ConnectionConfig {
            responder: self.responder,
            failure: self.failure,
            read_timeout: self.read_timeout,
            serialize_timeout: self.serialize_timeout,
        });

        loop {
            let stream = self.retry.run(|| listener.accept(Deadline::Never)).await.map_err(HttpError::accept)?;
            tokio::spawn(Arc::clone(&connection).serve(stream));
        }
    }

    /// Runs [`start`](Server::start) on its own task.
    ///
    /// An error ending the accept loop goes to the failure sink.
    pub fn start_in_background(self) -> JoinHandle<()> {
        let failure = Arc::clone(&self.failure);
        tokio::spawn(async move {
            if let Err(e) = self.start().await {
                failure(e);
            }
        })
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("address", &self.address)
            .field("backlog", &self.backlog)
            .field("reuse_port", &self.reuse_port)
            .field("buffer_size", &self.buffer_size)
            .field("retry", &self.retry)
            .field("read_timeout", &self.read_timeout)
            .field("serialize_timeout", &self.serialize_timeout)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("middlewares", &self.middlewares)
            .field("has_responder", &self.responder.is_some())
            .finish_non_exhaustive()
    }
}

/// What every connection task shares
struct ConnectionConfig {
    responder: Arc<dyn Responder>,
    failure: FailureSink,
    read_timeout: Duration,
    serialize_timeout: Duration,
}

impl ConnectionConfig {
    async fn serve(self: Arc<Self>, stream: Stream) {
        let peer_addr = stream.peer_addr();
        debug!(?peer_addr, "start serving connection");

        match HttpConnection::new(stream)
            .process(self.responder.as_ref(), self.read_timeout, self.serialize_timeout)
            .await
        {
            Ok(()) => debug!(?peer_addr, "finished process, connection shutdown"),
            Err(e) => (self.failure)(e),
        }
    }
}

fn log_failure(e: HttpError) {
    error!(cause = %e, "connection failed");
}
