//! Transport front-end (spec §4.6/§6, C6): accepts the two long-lived
//! WebSocket endpoints and the one static landing page, and feeds
//! everything else it reads into the registry, matcher, and rendezvous
//! table.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use crate::bridge::run_connection_session;
use crate::error::RelayError;
use crate::ids::{Frame, Key, PeerId};
use crate::introduction;
use crate::registry::Outbound;
use crate::server::AppState;

const INDEX_HTML: &str = "<!doctype html>\n<html><head><title>rendez-relay</title></head>\
<body><p>rendez-relay is running.</p></body></html>\n";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/introduction/{id}", get(introduction_ws))
        .route("/connection/{from}/{to}/{key}", get(connection_ws))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}

async fn introduction_ws(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_introduction_session(socket, state, PeerId::from(id)))
}

async fn connection_ws(
    Path((from, to, key)): Path<(String, String, String)>,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        run_connection_session(
            socket,
            Arc::clone(&state.rendezvous),
            Arc::clone(&state.connections),
            PeerId::from(from),
            PeerId::from(to),
            Key::from(key),
        )
    })
}

/// Inbound shape on `/introduction/...` (spec §6). `type` is informational
/// and not consumed; missing `join`/`leave` arrays are treated as empty.
#[derive(Debug, Deserialize, Default)]
struct ClientMessage {
    #[serde(default)]
    join: Vec<Key>,
    #[serde(default)]
    leave: Vec<Key>,
}

async fn run_introduction_session(mut socket: WebSocket, state: Arc<AppState>, id: PeerId) {
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Outbound>();
    let token = state.registry.register(id.clone(), outbound_tx.clone());
    tracing::debug!(peer = %id, "introduction connection registered");

    loop {
        tokio::select! {
            out = outbound_rx.recv() => {
                match out {
                    Some(Outbound::Frame(Frame::Text(text))) => {
                        if socket.send(WsMessage::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Frame(Frame::Binary(bytes))) => {
                        if socket.send(WsMessage::Binary(bytes.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close) | None => break,
                }
            }
            frame = socket.recv() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => introduction::update_and_match(
                                &state.registry,
                                &id,
                                &outbound_tx,
                                msg.join,
                                msg.leave,
                            ),
                            Err(e) => {
                                // ProtocolError (spec §7): malformed message
                                // closes this introduction connection.
                                let err = RelayError::from(e);
                                tracing::debug!(peer = %id, error = %err, "closing introduction connection");
                                break;
                            }
                        }
                    }
                    Some(Ok(WsMessage::Binary(_))) => {
                        // Introduction messages are JSON text; a binary
                        // frame here is an unknown shape (spec §7).
                        tracing::debug!(peer = %id, "binary frame on introduction connection, closing");
                        break;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping / pong
                    Some(Err(_)) => break,
                }
            }
        }
    }

    state.registry.unregister(&token);
    let _ = socket.send(WsMessage::Close(None)).await;
    tracing::debug!(peer = %id, "introduction connection closed");
}
