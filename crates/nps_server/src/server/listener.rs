//! Listener construction.

use std::io;
use std::net::{SocketAddr, TcpListener as StdTcpListener};

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpStream};

use crate::error::ServerError;

/// Source of accepted sockets for an accept loop.
#[async_trait]
pub(crate) trait Acceptor: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
}

#[async_trait]
impl Acceptor for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

const LISTEN_BACKLOG: i32 = 1024;

/// Binds a non-blocking listener with `SO_REUSEADDR` so restarts do not trip
/// over sockets left in `TIME_WAIT`.
pub(crate) fn bind_listener(address: SocketAddr) -> Result<TcpListener, ServerError> {
    let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| ServerError::Network(format!("Socket creation failed: {e}")))?;
    socket.set_reuse_address(true).ok();

    socket
        .bind(&address.into())
        .map_err(|e| ServerError::Network(format!("Bind to {address} failed: {e}")))?;
    socket
        .listen(LISTEN_BACKLOG)
        .map_err(|e| ServerError::Network(format!("Listen on {address} failed: {e}")))?;

    let std_listener: StdTcpListener = socket.into();
    std_listener
        .set_nonblocking(true)
        .map_err(|e| ServerError::Network(format!("Failed to make {address} non-blocking: {e}")))?;

    TcpListener::from_std(std_listener)
        .map_err(|e| ServerError::Network(format!("Tokio listener creation failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ephemeral_port_is_resolved() {
        let listener = bind_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }
}
