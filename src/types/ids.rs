//! Identifier newtypes.
//!
//! All identities are opaque `u64` values supplied by the transport layer
//! (guilds, participants) or minted by the engine (matches). Wrapping them
//! keeps a participant id from ever being passed where a match id belongs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a guild: the isolation boundary for one matching problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuildId(pub u64);

/// Identifier of a participant.
///
/// Used both as the identity of a queue entry (solo player or group leader)
/// and as the sub-identity of every member inside an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

/// Identifier of one match generation.
///
/// Minted per guild from a monotonic counter and never reused, so an id that
/// is not active is always a stale reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub u64);

impl fmt::Display for GuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "guild#{}", self.0)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "match#{}", self.0)
    }
}
