//! Transport layer for the arena server.
//!
//! The game core never touches sockets. It sees a [`Transport`] that hands
//! out [`PendingConnection`]s, each of which finishes its protocol
//! handshake into a [`Connection`] that moves whole UTF-8 frames in both
//! directions. Accepting and handshaking are separate steps so a peer that
//! stalls mid-handshake only ever holds up its own task. Swapping WebSocket
//! for another framing only means another implementation of these traits.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    PendingWebSocket, WebSocketConnection, WebSocketTransport,
};

use std::fmt;
use std::net::SocketAddr;

/// Opaque identifier for a transport connection.
///
/// Only meaningful at the transport boundary. Everything above the
/// handler keys players by the `PlayerId` issued at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// An accepted peer that has not finished its handshake.
    type Pending: PendingConnection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next incoming peer.
    ///
    /// Returns as soon as the peer is accepted at the socket level. The
    /// handshake is left to [`PendingConnection::establish`], which the
    /// caller should run off the accept loop.
    async fn accept(&mut self) -> Result<Self::Pending, Self::Error>;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// An accepted peer whose handshake is still outstanding.
pub trait PendingConnection: Send + 'static {
    /// The connection produced once the handshake succeeds.
    type Connection: Connection;
    /// The error type for a failed handshake.
    type Error: std::error::Error + Send + Sync;

    /// Runs the handshake. May wait on the peer indefinitely; bound it
    /// with a timeout.
    async fn establish(self) -> Result<Self::Connection, Self::Error>;

    /// Returns the remote peer's address.
    fn peer_addr(&self) -> SocketAddr;
}

/// A single connection that carries whole frames.
///
/// `send` and `recv` take `&self` and must be callable concurrently: the
/// server reads on one task while a writer task drains the player's
/// outbound queue.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame to the remote peer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Closes the connection.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Returns the remote peer's address, if known.
    fn peer_addr(&self) -> Option<SocketAddr>;
}
