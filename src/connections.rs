//! Tracks live post-pairing bridge sessions so server shutdown can force
//! them closed directly (spec §5: "forcibly close every currently-open
//! client transport... No graceful in-flight drain is required").
//!
//! Introduction peers and half-open rendezvous slots already have their
//! own close paths (`PeerRegistry::close_all`, `RendezvousTable::close_all`).
//! Once a connection request is paired and enters the splice phase it
//! leaves both of those structures behind — this tracker covers that gap.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;

#[derive(Default)]
pub struct ConnectionTracker {
    inner: Mutex<HashMap<u64, oneshot::Sender<()>>>,
    next_token: AtomicU64,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly-spliced session. Returns a token to unregister
    /// with later and a receiver that resolves once shutdown asks this
    /// session to close.
    pub fn register(&self) -> (u64, oneshot::Receiver<()>) {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.inner.lock().insert(token, tx);
        (token, rx)
    }

    pub fn unregister(&self, token: u64) {
        self.inner.lock().remove(&token);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Force-close every currently-spliced session (server shutdown).
    pub fn close_all(&self) {
        let mut inner = self.inner.lock();
        if !inner.is_empty() {
            tracing::debug!(sessions = inner.len(), "closing all spliced bridge sessions");
        }
        for (_, tx) in inner.drain() {
            let _ = tx.send(());
        }
    }
}
