//! Socket bridge (spec §4.5, C5) and the rendezvous arrival logic that
//! feeds it (spec §4.4).
//!
//! Neither side's `WebSocket` ever moves to another task. Pairing hands
//! over a `FrameTx` — a channel whose other end is this very function's
//! own write loop — so "deliver a frame to my partner" is always just a
//! `send` on a cloneable channel, never a socket handoff.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use tokio::sync::{mpsc, oneshot};

use crate::connections::ConnectionTracker;
use crate::ids::{Fingerprint, Frame, Key, PeerId};
use crate::rendezvous::{ArriveOutcome, FrameTx, RendezvousSignal, RendezvousTable};

enum Incoming {
    Frame(Frame),
    Ignore,
    Closed,
}

fn classify(msg: WsMessage) -> Incoming {
    match msg {
        WsMessage::Text(t) => Incoming::Frame(Frame::Text(t.to_string())),
        WsMessage::Binary(b) => Incoming::Frame(Frame::Binary(b.to_vec())),
        WsMessage::Close(_) => Incoming::Closed,
        WsMessage::Ping(_) | WsMessage::Pong(_) => Incoming::Ignore,
    }
}

async fn write_frame(socket: &mut WebSocket, frame: Frame) -> Result<(), axum::Error> {
    let msg = match frame {
        Frame::Text(t) => WsMessage::Text(t.into()),
        Frame::Binary(b) => WsMessage::Binary(b.into()),
    };
    socket.send(msg).await
}

/// Drive a newly-arrived connection request end to end: rendezvous,
/// optional flush, then full-duplex splice until either side closes.
pub async fn run_connection_session(
    mut socket: WebSocket,
    table: Arc<RendezvousTable>,
    tracker: Arc<ConnectionTracker>,
    from: PeerId,
    to: PeerId,
    key: Key,
) {
    let fp_self: Fingerprint = (from.clone(), to.clone(), key.clone());
    let fp_mate: Fingerprint = (to, from, key);
    let (write_tx, mut write_rx) = mpsc::unbounded_channel::<Frame>();

    let partner_tx = match table.arrive(fp_self.clone(), fp_mate, write_tx) {
        ArriveOutcome::Paired {
            partner_tx,
            buffered,
        } => {
            // Flush phase: every buffered frame reaches our own socket
            // before anything the splice phase forwards (spec §4.5 step 1).
            let mut flush_failed = false;
            for frame in buffered {
                if write_frame(&mut socket, frame).await.is_err() {
                    flush_failed = true;
                    break;
                }
            }
            if flush_failed {
                tracing::debug!(
                    from = %fp_self.0, to = %fp_self.1, key = %fp_self.2,
                    "flush to just-arrived socket failed, tearing down bridge"
                );
                // `write_rx` (dropped when this function returns) is the
                // receiving half of the `partner_tx` we just handed our
                // partner — dropping it makes `partner_tx.closed()`
                // resolve on the partner's side, so its own splice loop
                // notices this side died instead of running forever
                // (spec §4.5 step 3: "close the other").
                return;
            }
            Some(partner_tx)
        }
        ArriveOutcome::Waiting { control_rx, token } => {
            wait_for_pairing(&mut socket, &table, &fp_self, token, control_rx, &mut write_rx).await
        }
    };

    match partner_tx {
        Some(partner_tx) => {
            tracing::debug!(
                from = %fp_self.0, to = %fp_self.1, key = %fp_self.2,
                "entering splice"
            );
            // Neither the registry nor the rendezvous table tracks a
            // session once it reaches the splice phase; register it here
            // so server shutdown can still force it closed (spec §5).
            let (token, shutdown_rx) = tracker.register();
            splice(&fp_self, socket, partner_tx, write_rx, shutdown_rx).await;
            tracker.unregister(token);
        }
        None => {
            let _ = socket.send(WsMessage::Close(None)).await;
        }
    }
}

/// Waiting-side loop: buffer our own inbound frames into the shared slot,
/// write anything handed to us (there is nothing to hand us yet — no
/// partner exists while waiting — so this only matters once paired), and
/// watch for the signal that tells us our fate.
async fn wait_for_pairing(
    socket: &mut WebSocket,
    table: &RendezvousTable,
    fp_self: &Fingerprint,
    token: u64,
    mut control_rx: mpsc::UnboundedReceiver<RendezvousSignal>,
    write_rx: &mut mpsc::UnboundedReceiver<Frame>,
) -> Option<FrameTx> {
    loop {
        tokio::select! {
            signal = control_rx.recv() => {
                return match signal {
                    Some(RendezvousSignal::Paired { partner_tx }) => Some(partner_tx),
                    Some(RendezvousSignal::Close) | None => {
                        tracing::debug!(
                            from = %fp_self.0, to = %fp_self.1, key = %fp_self.2,
                            "rendezvous slot evicted while waiting"
                        );
                        None
                    }
                };
            }
            maybe = write_rx.recv() => {
                match maybe {
                    Some(frame) => {
                        if write_frame(socket, frame).await.is_err() {
                            return None;
                        }
                    }
                    None => return None,
                }
            }
            frame = socket.recv() => {
                match frame {
                    Some(Ok(msg)) => match classify(msg) {
                        Incoming::Frame(f) => {
                            if !table.push_if_waiting(fp_self, token, f.clone()) {
                                // The slot is gone: pairing raced ahead of
                                // this frame. Because the removal and the
                                // `Paired` send happen under the same lock
                                // (see rendezvous.rs), the signal is
                                // already enqueued — receiving it here
                                // cannot race further.
                                return match control_rx.recv().await {
                                    Some(RendezvousSignal::Paired { partner_tx }) => {
                                        let _ = partner_tx.send(f);
                                        Some(partner_tx)
                                    }
                                    _ => None,
                                };
                            }
                        }
                        Incoming::Ignore => {}
                        Incoming::Closed => {
                            table.remove_waiting(fp_self, token);
                            tracing::debug!(
                                from = %fp_self.0, to = %fp_self.1, key = %fp_self.2,
                                "waiting socket closed before pairing"
                            );
                            return None;
                        }
                    },
                    _ => {
                        table.remove_waiting(fp_self, token);
                        tracing::debug!(
                            from = %fp_self.0, to = %fp_self.1, key = %fp_self.2,
                            "waiting socket errored before pairing"
                        );
                        return None;
                    }
                }
            }
        }
    }
}

/// Splice phase (spec §4.5 step 2): every subsequent frame on our socket
/// goes to the partner, and every frame the partner hands us goes to our
/// socket, until either side closes or the server asks this session to
/// shut down.
async fn splice(
    fp_self: &Fingerprint,
    mut socket: WebSocket,
    partner_tx: FrameTx,
    mut write_rx: mpsc::UnboundedReceiver<Frame>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let reason = loop {
        tokio::select! {
            _ = &mut shutdown_rx => break "server shutdown",
            // Resolves once the partner's own receiving half is dropped —
            // i.e. the partner's connection task has ended, for any
            // reason (spec §4.5 step 3: "close the other").
            _ = partner_tx.closed() => break "partner closed",
            maybe = write_rx.recv() => {
                match maybe {
                    Some(frame) => {
                        if write_frame(&mut socket, frame).await.is_err() {
                            break "write to own socket failed";
                        }
                    }
                    None => break "partner closed",
                }
            }
            frame = socket.recv() => {
                match frame {
                    Some(Ok(msg)) => match classify(msg) {
                        Incoming::Frame(f) => {
                            if partner_tx.send(f).is_err() {
                                break "partner closed";
                            }
                        }
                        Incoming::Ignore => {}
                        Incoming::Closed => break "own socket closed",
                    },
                    _ => break "own socket errored",
                }
            }
        }
    };
    tracing::debug!(
        from = %fp_self.0, to = %fp_self.1, key = %fp_self.2,
        reason, "tearing down bridge"
    );
    let _ = socket.send(WsMessage::Close(None)).await;
}
