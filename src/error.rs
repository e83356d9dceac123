//! Error taxonomy (spec §7). These are kinds, not a single catch-all: each
//! variant maps to one of the actions spec §7 prescribes, and the relay
//! never lets a single peer's error escalate into a process-wide failure.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed inbound introduction message (bad JSON, missing fields).
    /// Action: close that introduction connection and unregister the peer.
    #[error("malformed introduction message: {0}")]
    Protocol(#[from] serde_json::Error),

    /// Lower-level I/O failure on a peer transport. Treated as a close.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Send to a peer that is no longer registered — a race between a
    /// match and a close. Never escalated; logged and dropped at the call
    /// site.
    #[error("peer {0} is gone")]
    PeerGone(String),

    /// The listener could not acquire its port. Surfaced to the caller of
    /// `Server::run`, not retried.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
