//! Rendezvous table (spec §4.4, C4): the half-open table of pending
//! connection requests, keyed by the ordered triple `(from, to, key)`.
//!
//! Per spec §9's design note, this is one table whose value owns both the
//! transport handle and its buffer — not the "two dictionaries" shape of
//! the original source — so I2/I3 are locally enforceable.
//!
//! Neither side's WebSocket ever changes owning task. Pairing is expressed
//! purely as an exchange of cloneable channel handles: each connection
//! task keeps its own socket for its entire life and is handed its
//! partner's `FrameTx` (a sender that writes a frame to the partner's
//! socket) once paired. See `bridge.rs` for the per-connection loop that
//! drives this.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::ids::{Fingerprint, Frame};

pub type FrameTx = mpsc::UnboundedSender<Frame>;

/// Delivered to a waiting connection task when its fate is decided by
/// someone else: either it has been paired, or it has been evicted by a
/// duplicate request for the same fingerprint (spec §4.4 point 3).
#[derive(Debug)]
pub enum RendezvousSignal {
    Paired { partner_tx: FrameTx },
    Close,
}

struct Slot {
    token: u64,
    write_tx: FrameTx,
    buffer: Vec<Frame>,
    control_tx: mpsc::UnboundedSender<RendezvousSignal>,
}

/// What happened when a new request arrived.
pub enum ArriveOutcome {
    /// No reciprocal request yet. The caller now owns `fp_self`'s slot and
    /// must drive its `control_rx` until it is either paired or its own
    /// socket closes (in which case it must call `remove_waiting`).
    Waiting {
        control_rx: mpsc::UnboundedReceiver<RendezvousSignal>,
        token: u64,
    },
    /// The reciprocal request was already waiting. The caller is the
    /// just-arrived side ("T" in spec §4.5) and must flush `buffered` to
    /// its own socket before starting the splice.
    Paired {
        partner_tx: FrameTx,
        buffered: Vec<Frame>,
    },
}

#[derive(Default)]
pub struct RendezvousTable {
    inner: Mutex<HashMap<Fingerprint, Slot>>,
    next_token: AtomicU64,
}

impl RendezvousTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new request arrives from transport owning `write_tx`, claiming
    /// `fp_self = (from, to, key)` and seeking the reciprocal
    /// `fp_mate = (to, from, key)`. Single critical section per spec §4.4
    /// step 2.
    pub fn arrive(&self, fp_self: Fingerprint, fp_mate: Fingerprint, write_tx: FrameTx) -> ArriveOutcome {
        let mut inner = self.inner.lock();
        if let Some(mate) = inner.remove(&fp_mate) {
            tracing::debug!(
                from = %fp_self.0, to = %fp_self.1, key = %fp_self.2,
                "rendezvous slot paired"
            );
            // Wake the waiting side with our write_tx so it can forward
            // frames it reads from its own socket to us from now on.
            let _ = mate
                .control_tx
                .send(RendezvousSignal::Paired { partner_tx: write_tx });
            return ArriveOutcome::Paired {
                partner_tx: mate.write_tx,
                buffered: mate.buffer,
            };
        }

        // Duplicate request for fp_self: evict the older slot (spec §4.4
        // point 3). The evicted task's own socket-read loop is what
        // actually closes the socket once it observes `Close`.
        if let Some(old) = inner.remove(&fp_self) {
            tracing::warn!(
                from = %fp_self.0, to = %fp_self.1, key = %fp_self.2,
                "duplicate rendezvous request, evicting prior slot"
            );
            let _ = old.control_tx.send(RendezvousSignal::Close);
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        tracing::debug!(
            from = %fp_self.0, to = %fp_self.1, key = %fp_self.2,
            "rendezvous slot opened, waiting for reciprocal"
        );
        inner.insert(
            fp_self,
            Slot {
                token,
                write_tx,
                buffer: Vec::new(),
                control_tx,
            },
        );
        ArriveOutcome::Waiting { control_rx, token }
    }

    /// Append a frame to `fp`'s buffer iff the slot still exists (spec
    /// §4.4 step 2 "On message"). Returns `false` if the slot is gone —
    /// meaning pairing (or eviction) raced ahead of this frame, and the
    /// caller must instead drain its `control_rx` to learn what happened
    /// (see `bridge.rs` — by the time this returns `false`, the
    /// corresponding control signal is already enqueued, because both
    /// operations happen under the same lock).
    pub fn push_if_waiting(&self, fp: &Fingerprint, token: u64, frame: Frame) -> bool {
        let mut inner = self.inner.lock();
        match inner.get_mut(fp) {
            Some(slot) if slot.token == token => {
                slot.buffer.push(frame);
                true
            }
            _ => false,
        }
    }

    /// Compare-and-remove: only removes the slot if it still belongs to
    /// `token` (spec §4.4 step 2 "On close"). Used when a still-waiting
    /// transport closes before any reciprocal request arrives.
    pub fn remove_waiting(&self, fp: &Fingerprint, token: u64) {
        let mut inner = self.inner.lock();
        if let Some(slot) = inner.get(fp) {
            if slot.token == token {
                inner.remove(fp);
                tracing::debug!(
                    from = %fp.0, to = %fp.1, key = %fp.2,
                    "rendezvous waiter disconnected, slot removed"
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn close_all(&self) {
        let inner = self.inner.lock();
        if !inner.is_empty() {
            tracing::debug!(slots = inner.len(), "closing all half-open rendezvous slots");
        }
        for slot in inner.values() {
            let _ = slot.control_tx.send(RendezvousSignal::Close);
        }
    }
}
