//! The task that owns one client socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use nps_protocol::NpsFrameCodec;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{info, warn};

use crate::connection::Connection;
use crate::dispatch::PacketDispatcher;
use crate::error::ServerError;

/// Reads frames off `stream` and answers them one at a time until the peer
/// leaves, the idle window passes, a fatal error occurs or the server stops.
///
/// Frames are dispatched strictly in arrival order; the next frame is not read
/// until the previous response has been written.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    local_port: u16,
    dispatcher: Arc<PacketDispatcher>,
    idle_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    stream.set_nodelay(true).ok();

    if *shutdown.borrow() {
        return Ok(());
    }

    let mut connection = Connection::accepted(remote_addr, local_port);
    connection.activate()?;
    info!(connection = connection.id(), "🔗 Client connected");

    let mut framed = Framed::new(stream, NpsFrameCodec::new());

    let result = loop {
        let next = tokio::select! {
            _ = shutdown.changed() => break Ok(()),
            next = timeout(idle_timeout, framed.next()) => next,
        };

        let frame = match next {
            Err(_) => {
                info!(connection = connection.id(), idle = ?idle_timeout, "⏱️ Closing idle connection");
                break Ok(());
            }
            Ok(None) => break Ok(()),
            Ok(Some(Err(e))) => break Err(ServerError::Network(e.to_string())),
            Ok(Some(Ok(frame))) => frame,
        };

        match dispatcher.dispatch(local_port, &frame, &mut connection).await {
            Ok(Some(response)) => {
                if let Err(e) = framed.send(response).await {
                    break Err(ServerError::Network(e.to_string()));
                }
            }
            Ok(None) => {}
            Err(e) if e.keeps_connection_open() => {
                warn!(connection = connection.id(), error = %e, "Frame rejected");
            }
            Err(e) => break Err(e),
        }
    };

    connection.close();
    info!(
        connection = connection.id(),
        duration = ?connection.connected_for(),
        "👋 Client disconnected"
    );
    result
}
