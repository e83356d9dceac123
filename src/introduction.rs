//! Introduction matcher (spec §4.3, C3). On any key-set change, emits
//! reciprocal introductions to every other peer sharing at least one key.

use serde::Serialize;

use crate::error::RelayError;
use crate::ids::{Frame, Key, PeerId};
use crate::keys;
use crate::registry::{Outbound, PeerRegistry};

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ServerMessage<'a> {
    Introduction { id: &'a str, keys: Vec<&'a str> },
}

/// Update `from`'s keys and emit reciprocal `Introduction` messages to
/// every other currently-registered peer with which a shared key now
/// exists: one message to `from` naming the other peer, and a symmetric
/// message to the other peer naming `from` (spec §4.3 step 2).
///
/// Matching is not suppressed by prior notifications (spec §4.3.3): a
/// later key change that re-establishes a shared key re-emits
/// introductions, and clients are expected to be idempotent.
pub fn update_and_match(
    registry: &PeerRegistry,
    from: &PeerId,
    from_outbound: &crate::registry::OutboundTx,
    join: Vec<Key>,
    leave: Vec<Key>,
) {
    let Some(from_keys) = registry.update_keys(from, &join, &leave) else {
        // Peer raced with its own close; nothing to match.
        return;
    };

    // Snapshot so the lock is not held while sending (spec §5).
    for (other_id, other_keys, other_outbound) in registry.snapshot_others(from) {
        let common = keys::intersect(&from_keys, &other_keys);
        if common.is_empty() {
            continue;
        }
        send_introduction(from_outbound, &other_id, &common);
        send_introduction(&other_outbound, from, &common);
    }
}

fn send_introduction(outbound: &crate::registry::OutboundTx, id: &PeerId, common: &[Key]) {
    let msg = ServerMessage::Introduction {
        id: id.as_str(),
        keys: common.iter().map(Key::as_str).collect(),
    };
    let Ok(text) = serde_json::to_string(&msg) else {
        return;
    };
    // A dead peer's send is discarded — logged, never escalated (spec §4.3
    // "Failure").
    if outbound.send(Outbound::Frame(Frame::Text(text))).is_err() {
        let err = RelayError::PeerGone(id.to_string());
        tracing::debug!(error = %err, "introduction send failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PeerRegistry;
    use tokio::sync::mpsc;

    fn recv_texts(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(Outbound::Frame(Frame::Text(t))) = rx.try_recv() {
            out.push(t);
        }
        out
    }

    #[test]
    fn single_peer_join_emits_nothing() {
        let registry = PeerRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register(PeerId::from("alice"), tx.clone());

        update_and_match(&registry, &PeerId::from("alice"), &tx, vec![Key::from("doc1")], vec![]);

        assert!(recv_texts(&mut rx).is_empty());
    }

    #[test]
    fn shared_key_introduces_both_ways() {
        let registry = PeerRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        registry.register(PeerId::from("alice"), tx_a.clone());
        registry.register(PeerId::from("bob"), tx_b.clone());

        update_and_match(&registry, &PeerId::from("alice"), &tx_a, vec![Key::from("doc1")], vec![]);
        assert!(recv_texts(&mut rx_a).is_empty());
        assert!(recv_texts(&mut rx_b).is_empty());

        update_and_match(
            &registry,
            &PeerId::from("bob"),
            &tx_b,
            vec![Key::from("doc1"), Key::from("doc2")],
            vec![],
        );

        let alice_saw = recv_texts(&mut rx_a);
        assert_eq!(alice_saw.len(), 1);
        assert!(alice_saw[0].contains("\"id\":\"bob\""));
        assert!(alice_saw[0].contains("doc1"));

        let bob_saw = recv_texts(&mut rx_b);
        assert_eq!(bob_saw.len(), 1);
        assert!(bob_saw[0].contains("\"id\":\"alice\""));
    }

    #[test]
    fn never_matched_against_self() {
        let registry = PeerRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        registry.register(PeerId::from("alice"), tx_a.clone());

        update_and_match(&registry, &PeerId::from("alice"), &tx_a, vec![Key::from("doc1")], vec![]);
        assert!(recv_texts(&mut rx_a).is_empty());
    }
}
