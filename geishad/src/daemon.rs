//! Daemon assembly
//!
//! Wires the event bus, the player actor and the TCP server together around
//! one shutdown token. Any of a client `Shutdown`, a signal, or the actor
//! stopping cancels the token and brings the rest down.

use std::net::SocketAddr;
use std::sync::Arc;

use geisha_common::config::TomlConfig;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::audio::AudioOutput;
use crate::error::Result;
use crate::events::EventBus;
use crate::playback::{self, PlayerHandle};
use crate::server::{self, ServerContext};

/// A running daemon
pub struct Daemon {
    local_addr: SocketAddr,
    player: PlayerHandle,
    bus: EventBus,
    shutdown: CancellationToken,
    server_task: JoinHandle<()>,
    player_task: JoinHandle<()>,
}

impl Daemon {
    /// Bind the listener and start every task
    pub async fn start(config: &TomlConfig, output: Arc<dyn AudioOutput>) -> Result<Self> {
        let shutdown = CancellationToken::new();
        let bus = EventBus::new(config.subscriber_buffer);
        let (player, player_task) =
            playback::spawn(output, bus.clone(), config.request_queue, shutdown.clone());

        let listener = match server::bind(&config.listen_address()).await {
            Ok(listener) => listener,
            Err(e) => {
                shutdown.cancel();
                return Err(e);
            }
        };
        let local_addr = listener.local_addr()?;

        let context = ServerContext {
            player: player.clone(),
            bus: bus.clone(),
            idle_timeout: config.idle_timeout(),
        };
        let server_task = tokio::spawn(server::serve(listener, context, shutdown.clone()));

        info!("Daemon started on {}", local_addr);
        Ok(Self {
            local_addr,
            player,
            bus,
            shutdown,
            server_task,
            player_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn player(&self) -> &PlayerHandle {
        &self.player
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Token that stops the daemon when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Wait until the daemon has stopped and every connection has closed
    pub async fn wait(self) {
        if let Err(e) = self.server_task.await {
            warn!("Server task failed: {}", e);
        }
        if let Err(e) = self.player_task.await {
            warn!("Player task failed: {}", e);
        }
        info!("Daemon stopped");
    }
}
