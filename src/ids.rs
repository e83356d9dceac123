//! Opaque identifiers shared across the registry, matcher, and rendezvous
//! table.
//!
//! `PeerId` and `Key` are newtypes over `Arc<str>` rather than bare
//! `String`: both are cloned constantly (every rendezvous fingerprint,
//! every snapshot taken for matching) and an `Arc<str>` clone is a refcount
//! bump instead of a heap allocation.

use std::fmt;
use std::sync::Arc;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(Arc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(Arc::from(s.as_str()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Ok(Self::from(s))
            }
        }
    };
}

opaque_id!(PeerId);
opaque_id!(Key);

/// A fingerprint uniquely identifies a rendezvous slot: the ordered triple
/// `(from, to, key)` from spec §3/§4.4. Ordering distinguishes `A→B` from
/// `B→A` so each party's transport routes to the right place.
pub type Fingerprint = (PeerId, PeerId, Key);

/// A single message as it crosses a connection transport. WebSocket framing
/// (text vs. binary) is preserved end to end — the relay never recombines
/// or splits frames (spec §4.5).
#[derive(Debug, Clone)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}
