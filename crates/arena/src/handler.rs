//! Per-connection handler: registration, reader loop, and writer task.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Finish the WebSocket upgrade (bounded by a timeout)
//!   2. Register with the lobby → get PlayerId, `player_id` frame queued
//!   3. Spawn the writer: drains the player's outbound queue into frames
//!   4. Loop: receive frames → decode → forward to the lobby
//!
//! The handler holds no game state. Everything it learns goes to the lobby,
//! and everything the player is told comes back through the outbound queue.

use std::sync::Arc;
use std::time::Duration;

use arena_protocol::{ClientMessage, Codec, PlayerId, ServerMessage};
use arena_transport::{
    Connection, PendingConnection, PendingWebSocket, WebSocketConnection,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{ArenaError, LobbyHandle};

/// How long a peer gets to complete the WebSocket upgrade.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long the writer may keep flushing after the player is gone.
const WRITER_GRACE: Duration = Duration::from_secs(2);

/// Drop guard that tells the lobby a player is gone when the handler exits.
///
/// Fires on every exit path, panics included. `Drop` is synchronous, so it
/// tries a non-blocking send first and falls back to a spawned task when
/// the lobby queue is momentarily full.
struct DisconnectGuard {
    player_id: PlayerId,
    lobby: LobbyHandle,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if self.lobby.try_disconnect(self.player_id) {
            return;
        }
        let player_id = self.player_id;
        let lobby = self.lobby.clone();
        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            rt.spawn(async move {
                let _ = lobby.disconnect(player_id).await;
            });
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C>(
    pending: PendingWebSocket,
    lobby: LobbyHandle,
    codec: C,
    idle_cutoff: Option<Duration>,
) -> Result<(), ArenaError>
where
    C: Codec + Clone,
{
    let peer = pending.peer_addr();
    let conn = tokio::time::timeout(HANDSHAKE_TIMEOUT, pending.establish())
        .await
        .map_err(|_| ArenaError::HandshakeTimeout(peer))??;

    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = ?conn.peer_addr(), "handling new connection");

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let player_id = lobby.connect(outbound_tx).await?;
    let guard = DisconnectGuard {
        player_id,
        lobby: lobby.clone(),
    };
    tracing::info!(%conn_id, %player_id, "player connected");

    let writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        outbound_rx,
        codec.clone(),
        player_id,
    ));

    loop {
        let received = match idle_cutoff {
            Some(limit) => {
                match tokio::time::timeout(limit, conn.recv()).await {
                    Ok(received) => received,
                    Err(_) => {
                        tracing::info!(%player_id, "connection idle, closing");
                        break;
                    }
                }
            }
            None => conn.recv().await,
        };

        let data = match received {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
        };

        let msg: ClientMessage = match codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(
                    %player_id, error = %e, "failed to decode message"
                );
                continue;
            }
        };

        lobby.send(player_id, msg).await?;
    }

    // Once the lobby drops the session, the outbound queue closes and the
    // writer finishes flushing whatever was already queued.
    drop(guard);
    if !drain_writer(writer, WRITER_GRACE).await {
        tracing::debug!(%player_id, "writer stalled, aborted");
    }
    if let Err(e) = conn.close().await {
        tracing::debug!(%player_id, error = %e, "close failed");
    }
    Ok(())
}

/// Waits up to `grace` for the writer to finish, then aborts it.
///
/// Returns `false` if the writer had to be aborted.
async fn drain_writer(mut writer: JoinHandle<()>, grace: Duration) -> bool {
    match tokio::time::timeout(grace, &mut writer).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "writer task failed");
            true
        }
        Err(_) => {
            writer.abort();
            false
        }
    }
}

/// Encodes and sends queued messages until the queue closes or the socket
/// fails.
async fn write_loop<C: Codec>(
    conn: Arc<WebSocketConnection>,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
    codec: C,
    player_id: PlayerId,
) {
    while let Some(msg) = outbound.recv().await {
        let bytes = match codec.encode(&msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%player_id, error = %e, "failed to encode message");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%player_id, error = %e, "send failed, writer stopping");
            break;
        }
    }
}
