//! TCP server
//!
//! Accepts connections and hands each one to its own task running the
//! protocol dispatcher in [`connection`]. Connections share nothing directly:
//! requests go through the [`PlayerHandle`], events through the [`EventBus`].

pub mod connection;

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::events::EventBus;
use crate::playback::PlayerHandle;

/// What every connection task needs
#[derive(Clone, Debug)]
pub struct ServerContext {
    pub player: PlayerHandle,
    pub bus: EventBus,
    /// Longest wait for the next request before the connection is dropped
    pub idle_timeout: Duration,
}

/// Bind the listener
pub async fn bind(address: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(address).await?;
    info!("Listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Accept connections until `shutdown` fires
///
/// Returns once every connection task has finished, so responses already
/// in flight (including the one to `Shutdown`) are written out first.
pub async fn serve(listener: TcpListener, context: ServerContext, shutdown: CancellationToken) {
    let connections = TaskTracker::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    spawn_connection(&connections, stream, peer, &context, &shutdown)
                }
                Err(e) => warn!("Failed to accept connection: {}", e),
            },
        }
    }

    info!("Server stopped accepting connections");
    connections.close();
    connections.wait().await;
    debug!("All connections closed");
}

fn spawn_connection(
    connections: &TaskTracker,
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    context: &ServerContext,
    shutdown: &CancellationToken,
) {
    debug!("Connection from {}", peer);
    let context = context.clone();
    let shutdown = shutdown.child_token();
    connections.spawn(async move {
        connection::handle_connection(stream, context, shutdown).await;
        debug!("Connection from {} closed", peer);
    });
}
