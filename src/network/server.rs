//! WebSocket Game Server
//!
//! Accepts WebSocket connections, feeds client frames to the
//! [`SessionGateway`] and drives the [`GameLoop`] on a fixed interval.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::game::input::RequestQueue;
use crate::game::scheduler::GameLoop;
use crate::network::protocol::{ErrorCode, ServerMessage};
use crate::network::session::{GatewayError, SessionGateway};
use crate::network::sync::SyncProtocol;

/// How long a closing connection may spend flushing queued messages.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Gateway error.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Game loop error.
    #[error("Game loop error: {0}")]
    Loop(#[from] crate::game::scheduler::LoopError),
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Requests for the game loop.
    queue: Arc<RequestQueue>,
    /// Connected sessions.
    gateway: Arc<SessionGateway>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let queue = Arc::new(RequestQueue::new());
        let gateway = Arc::new(SessionGateway::new(queue.clone(), config.max_connections));

        Self {
            config,
            queue,
            gateway,
            shutdown_tx,
        }
    }

    /// Bind the configured address and run until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.run_with_listener(listener).await
    }

    /// Run on an already bound listener until shutdown.
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Game server listening on {}", listener.local_addr()?);

        // Subscribe before anything can call shutdown()
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let loop_shutdown_rx = self.shutdown_tx.subscribe();

        let mut game_loop = GameLoop::new(self.config.game.clone(), self.queue.clone());
        game_loop.start()?;

        let gateway = self.gateway.clone();
        let loop_handle = tokio::spawn(async move {
            Self::run_game_loop(game_loop, gateway, loop_shutdown_rx).await;
        });

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        if let Err(e) = loop_handle.await {
            error!("Game loop task failed: {}", e);
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let gateway = self.gateway.clone();
        let outbound_buffer = self.config.outbound_buffer;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(outbound_buffer);

            if let Err(e) = gateway.connect(addr, msg_tx).await {
                warn!("Refusing {}: {}", addr, e);
                let code = match e {
                    GatewayError::ConnectionLimitReached => ErrorCode::ConnectionLimitReached,
                    _ => ErrorCode::InternalError,
                };
                let reply = ServerMessage::error(code, e.to_string());
                if let Ok(text) = reply.to_json() {
                    let _ = ws_sender.send(Message::Text(text)).await;
                }
                let _ = ws_sender.close().await;
                return;
            }

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
                let _ = ws_sender.close().await;
            });

            // Handle incoming messages
            let mut server_closing = false;
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                // Rejections are answered and logged by the gateway
                                let _ = gateway.handle_text(addr, &text).await;
                            }
                            Some(Ok(Message::Binary(_))) => {
                                gateway.reply(addr, ServerMessage::error(
                                    ErrorCode::InvalidMessage,
                                    "Binary frames are not supported",
                                )).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} closed the connection", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                warn!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        server_closing = true;
                        break;
                    }
                }
            }

            // Dropping the session's sender lets the writer flush and close.
            // On shutdown the game loop does that after queueing `shutdown`.
            if !server_closing {
                gateway.disconnect(addr).await;
            }

            let abort = sender_task.abort_handle();
            if tokio::time::timeout(FLUSH_TIMEOUT, sender_task).await.is_err() {
                abort.abort();
            }

            if server_closing {
                gateway.disconnect(addr).await;
            }
        });
    }

    /// Step the game loop on a fixed interval until shutdown.
    async fn run_game_loop(
        mut game_loop: GameLoop,
        gateway: Arc<SessionGateway>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let sync = SyncProtocol::new(game_loop.config());
        let mut tick_interval = interval(game_loop.config().tick_interval());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {}
                _ = shutdown_rx.recv() => break,
            }

            let result = match game_loop.step() {
                Ok(result) => result,
                Err(e) => {
                    error!("Game loop halted: {}", e);
                    break;
                }
            };

            let outbound = sync.messages(&result, game_loop.world());
            let lagging = gateway.dispatch(&outbound).await;
            for player_id in lagging {
                game_loop.queue().push_resync(player_id);
            }
        }

        game_loop.stop();
        gateway.close_all("Server shutting down").await;
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Connected sessions.
    pub fn gateway(&self) -> &Arc<SessionGateway> {
        &self.gateway
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.gateway.connection_count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = GameServer::new(test_config());
        assert_eq!(server.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_server_shutdown() {
        let server = Arc::new(GameServer::new(test_config()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let runner = server.clone();
        let handle = tokio::spawn(async move { runner.run_with_listener(listener).await });

        // Let the accept loop start
        tokio::time::sleep(Duration::from_millis(50)).await;
        server.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
