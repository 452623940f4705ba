//! Core data types for the party matcher
//!
//! ## Types
//!
//! - [`QueueEntry`]: A solo player or pre-formed group waiting in a guild
//! - [`Member`]: One participant inside an entry, with role preferences
//! - [`EntryLock`]: Exclusive association of an entry with a match
//! - [`Role`] / [`RoleCounts`]: Party roles and per-role counters
//! - [`KeyRange`]: Inclusive key level interval
//! - [`MatchReceipt`]: SSZ record of a confirmed match
//!
//! Timestamps are `u64` milliseconds supplied by the caller, so every
//! operation is deterministic for a given input sequence.

mod entry;
mod ids;
mod receipt;
pub mod range;
pub mod role;

// Re-export all types at module level
pub use entry::{EntryLock, Member, QueueEntry};
pub use ids::{GuildId, MatchId, ParticipantId};
pub use range::{KeyBracket, KeyLevelBounds, KeyRange};
pub use receipt::MatchReceipt;
pub use role::{Role, RoleCounts};
