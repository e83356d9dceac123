//! Peer registry (spec §4.2, C2): peer-id → live introduction transport +
//! current key set.
//!
//! Modeled on the teacher's `SharedState` — a `parking_lot::Mutex` guarding
//! a plain `HashMap`, with registration identity tracked by a generation
//! token rather than comparing the transport handle itself (spec's
//! compare-and-remove discipline, §4.2/§5).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::ids::{Frame, Key, PeerId};
use crate::keys;

/// Sent to a registered peer's connection task.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A frame to write to the peer's socket (an `Introduction` message).
    Frame(Frame),
    /// Force-close this peer's transport — it has been superseded by a
    /// newer registration for the same id (spec §4.2).
    Close,
}

pub type OutboundTx = mpsc::UnboundedSender<Outbound>;

struct Entry {
    token: u64,
    outbound: OutboundTx,
    keys: std::collections::HashSet<Key>,
}

/// Identifies one specific registration, so a late close event from an
/// evicted transport can never remove a fresher registration for the same
/// id (spec §4.2 `unregister`).
#[derive(Debug, Clone)]
pub struct RegistrationToken {
    pub id: PeerId,
    token: u64,
}

#[derive(Default)]
pub struct PeerRegistry {
    inner: Mutex<HashMap<PeerId, Entry>>,
    next_token: AtomicU64,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the peer record for `id`. If a prior registration
    /// exists, its transport is told to close — "as if it had closed
    /// normally" (spec §4.2) — but its entry is only actually removed when
    /// that transport's own close handler calls `unregister` with its own
    /// (now-stale) token, which this function's fresh token ensures fails.
    pub fn register(&self, id: PeerId, outbound: OutboundTx) -> RegistrationToken {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        let previous = inner.insert(
            id.clone(),
            Entry {
                token,
                outbound,
                keys: std::collections::HashSet::new(),
            },
        );
        drop(inner);
        if let Some(old) = previous {
            let _ = old.outbound.send(Outbound::Close);
        }
        RegistrationToken { id, token }
    }

    /// Compare-and-remove: only removes the entry if it still belongs to
    /// `token`'s registration.
    pub fn unregister(&self, token: &RegistrationToken) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.get(&token.id) {
            if entry.token == token.token {
                inner.remove(&token.id);
            }
        }
    }

    /// Apply a join/leave update and return the peer's resulting key set.
    /// Returns `None` if the peer is no longer registered (it raced with
    /// its own close).
    pub fn update_keys(
        &self,
        id: &PeerId,
        join: &[Key],
        leave: &[Key],
    ) -> Option<std::collections::HashSet<Key>> {
        let mut inner = self.inner.lock();
        let entry = inner.get_mut(id)?;
        entry.keys = keys::apply_join_leave(&entry.keys, join, leave);
        Some(entry.keys.clone())
    }

    /// Snapshot every other currently-registered peer, for the matcher to
    /// iterate over without holding the lock during sends (spec §5:
    /// "acceptable to drop the lock before sending").
    pub fn snapshot_others(
        &self,
        id: &PeerId,
    ) -> Vec<(PeerId, std::collections::HashSet<Key>, OutboundTx)> {
        let inner = self.inner.lock();
        inner
            .iter()
            .filter(|(peer_id, _)| *peer_id != id)
            .map(|(peer_id, entry)| (peer_id.clone(), entry.keys.clone(), entry.outbound.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Force-close every currently registered transport (server shutdown,
    /// spec §5).
    pub fn close_all(&self) {
        for entry in self.inner.lock().values() {
            let _ = entry.outbound.send(Outbound::Close);
        }
    }
}
