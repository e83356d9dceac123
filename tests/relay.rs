//! End-to-end scenarios from spec §8, driven over real WebSocket
//! connections against a server bound to an ephemeral port.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rendez_relay::config::RelayConfig;
use rendez_relay::server::Server;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server() -> std::net::SocketAddr {
    let config = RelayConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        log_json: false,
    };
    let server = Server::new(config);
    let (addr, _handle) = server.spawn().await.expect("server failed to bind");
    addr
}

async fn connect_introduction(addr: std::net::SocketAddr, id: &str) -> Ws {
    let url = format!("ws://{addr}/introduction/{id}");
    let (ws, _) = tokio_tungstenite::connect_async(url).await.expect("connect failed");
    ws
}

async fn connect_connection(addr: std::net::SocketAddr, from: &str, to: &str, key: &str) -> Ws {
    let url = format!("ws://{addr}/connection/{from}/{to}/{key}");
    let (ws, _) = tokio_tungstenite::connect_async(url).await.expect("connect failed");
    ws
}

async fn send_json(ws: &mut Ws, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

async fn recv_json(ws: &mut Ws) -> Value {
    let msg = timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timed out waiting for message")
        .expect("stream ended")
        .expect("ws error");
    match msg {
        Message::Text(t) => serde_json::from_str(&t).expect("not JSON"),
        other => panic!("expected text message, got {other:?}"),
    }
}

/// Scenario 1: single-peer join produces no introductions.
#[tokio::test]
async fn single_peer_join_emits_nothing() {
    let addr = start_server().await;
    let mut alice = connect_introduction(addr, "alice").await;
    send_json(&mut alice, json!({"type": "Join", "join": ["doc1"]})).await;

    let result = timeout(Duration::from_millis(300), alice.next()).await;
    assert!(result.is_err(), "alice should not receive anything");
}

/// Scenario 2: pair discovery — both peers are introduced to each other.
#[tokio::test]
async fn pair_discovery_introduces_both_peers() {
    let addr = start_server().await;
    let mut alice = connect_introduction(addr, "alice").await;
    send_json(&mut alice, json!({"type": "Join", "join": ["doc1"]})).await;

    let mut bob = connect_introduction(addr, "bob").await;
    send_json(&mut bob, json!({"type": "Join", "join": ["doc1", "doc2"]})).await;

    let alice_saw = recv_json(&mut alice).await;
    assert_eq!(alice_saw["type"], "Introduction");
    assert_eq!(alice_saw["id"], "bob");
    assert_eq!(alice_saw["keys"], json!(["doc1"]));

    let bob_saw = recv_json(&mut bob).await;
    assert_eq!(bob_saw["type"], "Introduction");
    assert_eq!(bob_saw["id"], "alice");
    assert_eq!(bob_saw["keys"], json!(["doc1"]));
}

/// Scenario 3: Alice opens her connection first and sends two binary
/// frames before Bob arrives; Bob must see them, in order, before any
/// frame sent after bridging.
#[tokio::test]
async fn bridge_delivers_early_frames_in_order() {
    let addr = start_server().await;
    let mut alice = connect_connection(addr, "alice", "bob", "doc1").await;
    alice.send(Message::Binary(vec![0x01].into())).await.unwrap();
    alice.send(Message::Binary(vec![0x02].into())).await.unwrap();

    // Give the server a moment to actually read and buffer both frames
    // before Bob arrives, so this isn't accidentally testing live splice.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut bob = connect_connection(addr, "bob", "alice", "doc1").await;

    let first = timeout(Duration::from_secs(2), bob.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(first, Message::Binary(vec![0x01].into()));
    let second = timeout(Duration::from_secs(2), bob.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(second, Message::Binary(vec![0x02].into()));

    alice.send(Message::Binary(vec![0x03].into())).await.unwrap();
    let third = timeout(Duration::from_secs(2), bob.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(third, Message::Binary(vec![0x03].into()));

    bob.send(Message::Binary(vec![0xAA].into())).await.unwrap();
    let reply = timeout(Duration::from_secs(2), alice.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(reply, Message::Binary(vec![0xAA].into()));
}

/// Scenario 4: symmetric to 3 — Bob arrives first this time.
#[tokio::test]
async fn bridge_works_regardless_of_arrival_order() {
    let addr = start_server().await;
    let mut bob = connect_connection(addr, "bob", "alice", "doc1").await;
    bob.send(Message::Binary(vec![0x09].into())).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut alice = connect_connection(addr, "alice", "bob", "doc1").await;
    let first = timeout(Duration::from_secs(2), alice.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(first, Message::Binary(vec![0x09].into()));
}

/// Scenario 5: the waiter disconnects before its reciprocal arrives; the
/// reciprocal becomes a fresh half-open waiter instead of bridging to a
/// gone transport.
#[tokio::test]
async fn waiter_disconnect_drops_buffered_frames() {
    let addr = start_server().await;
    let mut alice = connect_connection(addr, "alice", "bob", "doc1").await;
    alice.send(Message::Binary(vec![0xAA].into())).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    alice.close(None).await.unwrap();
    drop(alice);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut bob = connect_connection(addr, "bob", "alice", "doc1").await;
    let result = timeout(Duration::from_millis(300), bob.next()).await;
    assert!(result.is_err(), "bob should not receive alice's buffered frame");
}

/// Scenario 6: a second introduction connection for the same id supersedes
/// the first.
#[tokio::test]
async fn reconnection_supersedes_prior_registration() {
    let addr = start_server().await;
    let mut alice1 = connect_introduction(addr, "alice").await;
    let mut alice2 = connect_introduction(addr, "alice").await;

    let closed = timeout(Duration::from_secs(2), alice1.next()).await.unwrap();
    assert!(matches!(closed, Some(Ok(Message::Close(_))) | None));

    // Subsequent introductions route to the second connection.
    let mut bob = connect_introduction(addr, "bob").await;
    send_json(&mut alice2, json!({"type": "Join", "join": ["doc1"]})).await;
    send_json(&mut bob, json!({"type": "Join", "join": ["doc1"]})).await;

    let alice_saw = recv_json(&mut alice2).await;
    assert_eq!(alice_saw["id"], "bob");
}
