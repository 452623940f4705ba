//! # Party Matcher
//!
//! Per-guild party matchmaking: solo players and pre-formed groups queue with
//! a role and an acceptable key level range, and are combined into complete
//! parties without any participant ever being counted in two matches.
//!
//! ## Architecture
//!
//! - **Types**: Core data structures (QueueEntry, KeyRange, RoleCounts, MatchReceipt)
//! - **Rules**: Pure range and composition checks
//! - **Queue**: Slab-backed per-guild queue store, the authority on locks
//! - **Engine**: Match finder, lifecycle controller, guild serializer
//!
//! ## Design Principles
//!
//! 1. **Determinism**: All operations produce identical results for identical inputs
//! 2. **Supersession**: A match that grows or shrinks gets a new id; old ids become stale
//! 3. **Explicit Locks**: An entry is locked to at most one active match
//! 4. **Guild Isolation**: Guilds never share state and run in parallel

// ============================================================================
// Module declarations
// ============================================================================

/// Core data types: QueueEntry, KeyRange, RoleCounts, MatchReceipt
pub mod types;

/// Range and composition rules
pub mod rules;

/// Queue store: slab-based entry storage
pub mod queue;

/// Matchmaking engine: finder, lifecycle, guild serializer
pub mod engine;

/// Configuration loaded from TOML
pub mod config;

/// Error types
pub mod error;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use config::MatchConfig;
pub use engine::{ArrivalOutcome, GuildQueue, MatchEvent, Matchmaker};
pub use error::{EngineError, EngineResult, EntryError};
pub use queue::QueueStore;
pub use types::{GuildId, KeyRange, MatchId, MatchReceipt, Member, ParticipantId, QueueEntry, Role, RoleCounts};
