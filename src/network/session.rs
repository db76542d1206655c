//! Session Gateway
//!
//! Per-connection bookkeeping between the WebSocket handlers and the game
//! loop. The gateway never touches the world: it validates client messages,
//! pushes requests onto the [`RequestQueue`] and routes outbound messages
//! to per-connection channels without blocking.

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, RwLock};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, trace, warn};

use crate::core::grid::{Direction, InvalidDirection};
use crate::game::input::RequestQueue;
use crate::game::state::PlayerId;
use crate::network::protocol::{ClientMessage, ErrorCode, MoveIntent, ServerMessage};
use crate::network::sync::{Audience, Outbound};

/// Gateway errors. Each is answered with an `error` message to the client
/// where a reply makes sense.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Server is full.
    #[error("Connection limit reached")]
    ConnectionLimitReached,

    /// Address already has a session.
    #[error("Connection {0} already registered")]
    AlreadyConnected(SocketAddr),

    /// Address has no session.
    #[error("Unknown connection {0}")]
    UnknownConnection(SocketAddr),

    /// Text frame was not a valid client message.
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Input claimed a player the connection does not own.
    #[error("Connection owns {owner}, not {claimed}")]
    NotOwner {
        /// Id the client sent.
        claimed: String,
        /// Id the connection owns.
        owner: PlayerId,
    },

    /// Direction was not one of the four allowed values.
    #[error(transparent)]
    InvalidDirection(#[from] InvalidDirection),
}

/// Connected client state.
struct ConnectedClient {
    /// Remote address.
    addr: SocketAddr,
    /// Outbound queue drained by the connection's writer task.
    sender: mpsc::Sender<ServerMessage>,
    /// Set when the outbound queue overflowed; cleared by a full snapshot.
    lagging: AtomicBool,
    /// Set once the join-ack is queued. Tick output waits for it.
    acked: AtomicBool,
    /// Connection time.
    connected_at: Instant,
}

/// Tracks connections and their players.
pub struct SessionGateway {
    /// Requests for the game loop.
    queue: Arc<RequestQueue>,
    /// Maximum concurrent connections.
    max_connections: usize,
    /// Address to player mapping.
    by_addr: RwLock<BTreeMap<SocketAddr, PlayerId>>,
    /// Connected clients.
    clients: RwLock<BTreeMap<PlayerId, ConnectedClient>>,
}

impl SessionGateway {
    /// Create a gateway feeding `queue`.
    pub fn new(queue: Arc<RequestQueue>, max_connections: usize) -> Self {
        Self {
            queue,
            max_connections,
            by_addr: RwLock::new(BTreeMap::new()),
            clients: RwLock::new(BTreeMap::new()),
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Register a connection and queue its player for creation.
    ///
    /// The join-ack and `player-joined` notices go out after the next tick.
    /// Until its join-ack is queued the connection gets no other tick output,
    /// even if it registers between a tick and its dispatch.
    pub async fn connect(
        &self,
        addr: SocketAddr,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Result<PlayerId, GatewayError> {
        let mut by_addr = self.by_addr.write().await;
        let mut clients = self.clients.write().await;

        if by_addr.contains_key(&addr) {
            return Err(GatewayError::AlreadyConnected(addr));
        }
        if clients.len() >= self.max_connections {
            warn!("Connection limit reached, rejecting {}", addr);
            return Err(GatewayError::ConnectionLimitReached);
        }

        let player_id = PlayerId::new_v4();
        by_addr.insert(addr, player_id);
        clients.insert(player_id, ConnectedClient {
            addr,
            sender,
            lagging: AtomicBool::new(false),
            acked: AtomicBool::new(false),
            connected_at: Instant::now(),
        });
        self.queue.push_join(player_id);

        info!("Player {} connected from {}", player_id, addr);
        Ok(player_id)
    }

    /// Drop a connection and queue its player for removal.
    ///
    /// Safe to call more than once; only the first call queues a removal.
    pub async fn disconnect(&self, addr: SocketAddr) -> Option<PlayerId> {
        let mut by_addr = self.by_addr.write().await;
        let mut clients = self.clients.write().await;

        let player_id = by_addr.remove(&addr)?;
        if let Some(client) = clients.remove(&player_id) {
            info!(
                "Player {} disconnected from {} after {:?}",
                player_id,
                client.addr,
                client.connected_at.elapsed()
            );
        }
        self.queue.push_leave(player_id);
        Some(player_id)
    }

    /// Send `shutdown` to every connection and forget them all.
    ///
    /// Dropping the senders ends each writer task once it has flushed.
    pub async fn close_all(&self, reason: &str) -> usize {
        let mut by_addr = self.by_addr.write().await;
        let mut clients = self.clients.write().await;

        for client in clients.values() {
            let _ = client.sender.try_send(ServerMessage::Shutdown {
                reason: reason.to_string(),
            });
        }

        let count = clients.len();
        clients.clear();
        by_addr.clear();
        info!("Closed {} connections: {}", count, reason);
        count
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Parse and handle a text frame.
    pub async fn handle_text(&self, addr: SocketAddr, text: &str) -> Result<(), GatewayError> {
        match ClientMessage::from_json(text) {
            Ok(message) => self.handle_message(addr, message).await,
            Err(e) => {
                debug!("Invalid message from {}: {}", addr, e);
                let reply =
                    ServerMessage::error(ErrorCode::InvalidMessage, "Invalid message format");
                self.reply(addr, reply).await;
                Err(GatewayError::Malformed(e.to_string()))
            }
        }
    }

    /// Validate a client message and queue it for the next tick.
    pub async fn handle_message(
        &self,
        addr: SocketAddr,
        message: ClientMessage,
    ) -> Result<(), GatewayError> {
        let owner = self
            .player_for(addr)
            .await
            .ok_or(GatewayError::UnknownConnection(addr))?;

        match message {
            ClientMessage::Move(intent) => self.handle_move(addr, owner, intent).await,
            ClientMessage::SyncRequest => {
                debug!("Player {} requested a snapshot", owner);
                self.queue.push_resync(owner);
                Ok(())
            }
            ClientMessage::Ping { timestamp } => {
                let server_time = chrono::Utc::now().timestamp_millis().max(0) as u64;
                self.reply(addr, ServerMessage::Pong { timestamp, server_time }).await;
                Ok(())
            }
        }
    }

    async fn handle_move(
        &self,
        addr: SocketAddr,
        owner: PlayerId,
        intent: MoveIntent,
    ) -> Result<(), GatewayError> {
        if PlayerId::from_uuid_str(&intent.player_id) != Some(owner) {
            warn!(
                "Rejected input from {}: claims {} but owns {}",
                addr, intent.player_id, owner
            );
            let reply = ServerMessage::error(ErrorCode::NotOwner, "You do not control that player");
            self.reply(addr, reply).await;
            return Err(GatewayError::NotOwner {
                claimed: intent.player_id,
                owner,
            });
        }

        match intent.direction.parse::<Direction>() {
            Ok(direction) => {
                trace!("Player {} -> {}", owner, direction);
                self.queue.push_input(owner, direction);
                Ok(())
            }
            Err(e) => {
                debug!("Dropping input from {}: {}", owner, e);
                self.reply(addr, ServerMessage::error(ErrorCode::InvalidDirection, e.to_string()))
                    .await;
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // OUTBOUND
    // =========================================================================

    /// Send a message straight to one connection, bypassing the tick.
    pub async fn reply(&self, addr: SocketAddr, message: ServerMessage) {
        let Some(player_id) = self.player_for(addr).await else {
            return;
        };
        let clients = self.clients.read().await;
        if let Some(client) = clients.get(&player_id) {
            // Keep a slot free for the join-ack
            if !client.acked.load(Ordering::Relaxed) && client.sender.capacity() <= 1 {
                debug!("Reply to {} dropped before join-ack", addr);
                return;
            }
            if client.sender.try_send(message).is_err() {
                debug!("Reply to {} dropped", addr);
            }
        }
    }

    /// Route tick output to connections without waiting on any of them.
    ///
    /// A connection sees nothing but its own join-ack until that is queued.
    /// A connection whose queue is full is marked lagging: it receives no
    /// further incremental messages until a full snapshot gets through.
    /// Returns the players that need a resync.
    pub async fn dispatch(&self, outbound: &[Outbound]) -> Vec<PlayerId> {
        let clients = self.clients.read().await;
        let mut overflowed = BTreeSet::new();

        for out in outbound {
            let full_sync = out.message.is_full_sync();
            let join_ack = matches!(out.message, ServerMessage::JoinAck(_));
            let targets: Vec<(&PlayerId, &ConnectedClient)> = match &out.audience {
                Audience::One(id) => clients.get_key_value(id).into_iter().collect(),
                audience => clients.iter().filter(|(id, _)| audience.includes(id)).collect(),
            };

            for (player_id, client) in targets {
                if !join_ack && !client.acked.load(Ordering::Relaxed) {
                    trace!("Skipping tick output for {} before its join-ack", player_id);
                    continue;
                }
                if !full_sync && client.lagging.load(Ordering::Relaxed) {
                    continue;
                }

                match client.sender.try_send(out.message.clone()) {
                    Ok(()) => {
                        if join_ack {
                            client.acked.store(true, Ordering::Relaxed);
                        }
                        if full_sync && client.lagging.swap(false, Ordering::Relaxed) {
                            info!("Player {} caught up", player_id);
                        }
                    }
                    Err(TrySendError::Full(_)) => {
                        if !client.lagging.swap(true, Ordering::Relaxed) {
                            warn!("Player {} is lagging, pausing deltas", player_id);
                        }
                        overflowed.insert(*player_id);
                    }
                    Err(TrySendError::Closed(_)) => {
                        trace!("Outbound channel for {} closed", player_id);
                    }
                }
            }
        }

        overflowed.into_iter().collect()
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Player owned by a connection.
    pub async fn player_for(&self, addr: SocketAddr) -> Option<PlayerId> {
        self.by_addr.read().await.get(&addr).copied()
    }

    /// Active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Whether a player's deltas are paused.
    pub async fn is_lagging(&self, player_id: &PlayerId) -> bool {
        self.clients
            .read()
            .await
            .get(player_id)
            .map(|c| c.lagging.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}
