//! `ArenaServer` builder and accept loop.
//!
//! This is the entry point for running an arena server. It ties together
//! the layers: transport → handler → lobby → rooms.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use arena_protocol::{Codec, JsonCodec};
use arena_transport::{Transport, WebSocketTransport};
use tokio::task::JoinHandle;

use crate::handler::handle_connection;
use crate::lobby::{Lobby, LobbyHandle};
use crate::{ArenaError, ServerConfig};

/// Builder for configuring and starting an arena server.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use arena::prelude::*;
///
/// # async fn demo() -> Result<(), ArenaError> {
/// let server = ArenaServer::builder()
///     .bind("0.0.0.0:8082")
///     .round_timeout(Duration::from_secs(10))
///     .best_of(5)
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ArenaServerBuilder {
    config: ServerConfig,
}

impl ArenaServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// How long a round may stay open before missing choices are drawn.
    pub fn round_timeout(mut self, timeout: Duration) -> Self {
        self.config.round_timeout = timeout;
        self
    }

    /// Series length for every room.
    pub fn best_of(mut self, best_of: u32) -> Self {
        self.config.best_of = best_of;
        self
    }

    /// Inbound silence after which a connection is closed. Zero disables.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the listener and starts the lobby.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<ArenaServer<JsonCodec>, ArenaError> {
        let config = self.config.validated();
        let transport = WebSocketTransport::bind(&config.bind_addr).await?;
        let (lobby, lobby_task) = Lobby::spawn(&config);

        tracing::info!(
            addr = %transport.local_addr()?,
            best_of = config.best_of,
            round_timeout = ?config.round_timeout,
            "arena server bound"
        );

        Ok(ArenaServer {
            transport,
            lobby,
            lobby_task,
            codec: JsonCodec,
            config,
        })
    }
}

/// A bound arena server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ArenaServer<C: Codec> {
    transport: WebSocketTransport,
    lobby: LobbyHandle,
    lobby_task: JoinHandle<()>,
    codec: C,
    config: ServerConfig,
}

impl ArenaServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> ArenaServerBuilder {
        ArenaServerBuilder::new()
    }
}

impl<C> ArenaServer<C>
where
    C: Codec + Clone,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ArenaError> {
        Ok(self.transport.local_addr()?)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), ArenaError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Each accepted peer gets its own handler task, which also runs the
    /// WebSocket upgrade, so a stalled peer never holds up the loop. An
    /// accept failure is logged and does not stop the loop.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ArenaError> {
        tracing::info!("arena server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let lobby = self.lobby.clone();
                        let codec = self.codec.clone();
                        let idle = self.config.idle_cutoff();
                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(pending, lobby, codec, idle).await
                            {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
                () = &mut shutdown => {
                    tracing::info!("shutting down");
                    break;
                }
            }
        }

        self.lobby_task.abort();
        Ok(())
    }
}
