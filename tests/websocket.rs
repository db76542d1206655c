//! End-to-end tests over a real WebSocket connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use gridgrab::config::{GameConfig, ServerConfig};
use gridgrab::game::state::PlayerId;
use gridgrab::network::protocol::{JoinAck, ServerMessage};
use gridgrab::network::server::{GameServer, GameServerError};

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> (Arc<GameServer>, SocketAddr, JoinHandle<Result<(), GameServerError>>) {
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        game: GameConfig {
            tick_interval_ms: 10,
            snapshot_interval_ticks: 0,
            rng_seed: Some(11),
            ..Default::default()
        },
        ..Default::default()
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(GameServer::new(config));

    let runner = server.clone();
    let handle = tokio::spawn(async move { runner.run_with_listener(listener).await });
    (server, addr, handle)
}

/// Read frames until one matches, skipping everything else.
async fn recv_until<S, F>(ws: &mut S, mut pred: F) -> ServerMessage
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    F: FnMut(&ServerMessage) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let msg = ServerMessage::from_json(&text).unwrap();
                    if pred(&msg) {
                        return msg;
                    }
                }
                Some(Ok(_)) => {}
                other => panic!("Connection ended early: {:?}", other),
            }
        }
    })
    .await
    .expect("timed out waiting for message")
}

fn join_ack(msg: ServerMessage) -> JoinAck {
    match msg {
        ServerMessage::JoinAck(ack) => ack,
        other => panic!("Expected join-ack, got {:?}", other),
    }
}

#[tokio::test]
async fn join_then_move_produces_delta() {
    let (server, addr, handle) = start_server().await;
    let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

    let ack = join_ack(recv_until(&mut ws, |m| matches!(m, ServerMessage::JoinAck(_))).await);
    assert_eq!(ack.world.world_width, 640);
    assert!(!ack.snapshot.collectibles.is_empty());
    let me = ack.snapshot.players.iter().find(|p| p.id == ack.player_id).unwrap().clone();

    let intent = format!(
        r#"{{"type":"move","playerId":"{}","direction":"right"}}"#,
        ack.player_id
    );
    ws.send(Message::Text(intent)).await.unwrap();

    let id = ack.player_id;
    let delta = recv_until(&mut ws, |m| {
        matches!(m, ServerMessage::StateDelta(d) if d.players.iter().any(|p| p.id == id))
    })
    .await;
    match delta {
        ServerMessage::StateDelta(d) => {
            let moved = d.players.iter().find(|p| p.id == id).unwrap();
            assert_eq!(moved.x, me.x + 5);
            assert_eq!(moved.y, me.y);
        }
        other => panic!("Expected state-delta, got {:?}", other),
    }

    server.shutdown();
    let _ = recv_until(&mut ws, |m| matches!(m, ServerMessage::Shutdown { .. })).await;
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn peers_see_join_and_leave() {
    let (server, addr, handle) = start_server().await;

    let (mut ws_a, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    let ack_a = join_ack(recv_until(&mut ws_a, |m| matches!(m, ServerMessage::JoinAck(_))).await);

    let (mut ws_b, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    let ack_b = join_ack(recv_until(&mut ws_b, |m| matches!(m, ServerMessage::JoinAck(_))).await);
    assert_ne!(ack_a.player_id, ack_b.player_id);
    assert_eq!(ack_b.snapshot.players.len(), 2);

    let b: PlayerId = ack_b.player_id;
    let joined = recv_until(&mut ws_a, |m| matches!(m, ServerMessage::PlayerJoined(_))).await;
    assert!(matches!(joined, ServerMessage::PlayerJoined(ref p) if p.id == b));

    ws_b.close(None).await.unwrap();
    let left = recv_until(&mut ws_a, |m| matches!(m, ServerMessage::PlayerLeft { .. })).await;
    assert_eq!(left, ServerMessage::PlayerLeft { id: b });

    server.shutdown();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn foreign_move_gets_error() {
    let (server, addr, handle) = start_server().await;
    let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    let _ = recv_until(&mut ws, |m| matches!(m, ServerMessage::JoinAck(_))).await;

    let intent = format!(
        r#"{{"type":"move","playerId":"{}","direction":"up"}}"#,
        PlayerId::new_v4()
    );
    ws.send(Message::Text(intent)).await.unwrap();

    let reply = recv_until(&mut ws, |m| matches!(m, ServerMessage::Error(_))).await;
    let json = reply.to_json().unwrap();
    assert!(json.contains("\"code\":\"not-owner\""));

    server.shutdown();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn ping_and_sync_request() {
    let (server, addr, handle) = start_server().await;
    let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    let ack = join_ack(recv_until(&mut ws, |m| matches!(m, ServerMessage::JoinAck(_))).await);

    ws.send(Message::Text(r#"{"type":"ping","timestamp":77}"#.to_string()))
        .await
        .unwrap();
    let pong = recv_until(&mut ws, |m| matches!(m, ServerMessage::Pong { .. })).await;
    assert!(matches!(pong, ServerMessage::Pong { timestamp: 77, .. }));

    ws.send(Message::Text(r#"{"type":"sync-request"}"#.to_string()))
        .await
        .unwrap();
    let snapshot = recv_until(&mut ws, |m| matches!(m, ServerMessage::Snapshot(_))).await;
    match snapshot {
        ServerMessage::Snapshot(s) => {
            assert!(s.tick > ack.snapshot.tick);
            assert!(s.players.iter().any(|p| p.id == ack.player_id));
        }
        other => panic!("Expected snapshot, got {:?}", other),
    }

    server.shutdown();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap().unwrap();
}
