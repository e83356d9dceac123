//! Rendezvous relay for local-first, peer-discovery workloads.
//!
//! The crate is organized around the two coupled state machines the spec
//! centers on: peer discovery (`registry` + `introduction`) and connection
//! bridging (`rendezvous` + `bridge`). `transport` is the only module that
//! knows about HTTP/WebSocket at all; everything else operates on plain
//! channels and owned values, which is what keeps the two state machines
//! unit-testable without a network.

pub mod bridge;
pub mod config;
pub mod connections;
pub mod error;
pub mod ids;
pub mod introduction;
pub mod keys;
pub mod registry;
pub mod rendezvous;
pub mod server;
pub mod transport;
