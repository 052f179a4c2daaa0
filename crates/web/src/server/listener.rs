use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use keel_http::stream::{DEFAULT_BUFFER_SIZE, Deadline, Stream};
use tokio::net::{TcpListener, TcpSocket};
use tracing::{trace, warn};

/// A source of accepted connections.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Waits for the next connection, failing with [`io::ErrorKind::TimedOut`]
    /// once `deadline` passes
    async fn accept(&self, deadline: Deadline) -> io::Result<Stream>;

    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// A bound, listening TCP socket
#[derive(Debug)]
pub struct TcpHost {
    listener: TcpListener,
    buffer_size: usize,
}

impl TcpHost {
    /// Binds `addr` and starts listening with the given `backlog`.
    ///
    /// `SO_REUSEADDR` is always set; `reuse_port` sets `SO_REUSEPORT` where the
    /// platform has it, letting several processes share one port.
    pub fn bind(addr: SocketAddr, backlog: u32, reuse_port: bool) -> io::Result<Self> {
        let socket = if addr.is_ipv4() { TcpSocket::new_v4()? } else { TcpSocket::new_v6()? };
        socket.set_reuseaddr(true)?;
        set_reuse_port(&socket, reuse_port)?;
        socket.bind(addr)?;

        let listener = socket.listen(backlog)?;
        Ok(Self { listener, buffer_size: DEFAULT_BUFFER_SIZE })
    }

    /// Sets the buffer size of every accepted [`Stream`]
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }
}

#[async_trait]
impl Listener for TcpHost {
    async fn accept(&self, deadline: Deadline) -> io::Result<Stream> {
        let (tcp_stream, remote_addr) = deadline.run(self.listener.accept()).await??;
        trace!(%remote_addr, "accepted tcp connection");

        if let Err(e) = tcp_stream.set_nodelay(true) {
            warn!(cause = %e, "can't set TCP_NODELAY");
        }

        Ok(Stream::with_capacity(tcp_stream, self.buffer_size).with_peer_addr(remote_addr))
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

#[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
fn set_reuse_port(socket: &TcpSocket, reuse_port: bool) -> io::Result<()> {
    if reuse_port { socket.set_reuseport(true) } else { Ok(()) }
}

#[cfg(not(all(unix, not(target_os = "solaris"), not(target_os = "illumos"))))]
fn set_reuse_port(_socket: &TcpSocket, reuse_port: bool) -> io::Result<()> {
    if reuse_port {
        warn!("SO_REUSEPORT is not available on this platform, ignored");
    }
    Ok(())
}
