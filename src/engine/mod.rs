//! Matchmaking engine.
//!
//! ## Design Principles
//!
//! 1. **Determinism**: the same events in the same order always produce the
//!    same matches, ids and state roots
//! 2. **First Fit**: the oldest eligible match wins; no global optimization
//! 3. **Synchronous Execution**: no I/O and no async; waiting on humans
//!    happens outside, as events fed back in
//! 4. **Per-Guild Serialization**: one [`GuildQueue`] per guild, guarded by
//!    its own mutex in the [`Matchmaker`]
//!
//! ## Layers
//!
//! - [`finder`]: decides (read-only) where an entry goes
//! - [`lifecycle`]: commits decisions, owns match records and locks
//! - [`guild`]: sequences both for one guild
//! - [`matchmaker`]: routes calls to guilds
//!
//! ## Example
//!
//! ```
//! use party_matcher::config::MatchConfig;
//! use party_matcher::engine::{ArrivalOutcome, Matchmaker};
//! use party_matcher::types::{GuildId, KeyRange, ParticipantId, QueueEntry, Role};
//!
//! let engine = Matchmaker::new(MatchConfig::default()).unwrap();
//! let guild = GuildId(1);
//! let range = KeyRange::new(10, 15);
//!
//! engine.arrive(guild, QueueEntry::solo(ParticipantId(1), "Thrall", Role::Tank, range), 0).unwrap();
//! let formed = engine.arrive(guild, QueueEntry::solo(ParticipantId(2), "Jaina", Role::Healer, range), 1).unwrap();
//! let ArrivalOutcome::FormedNewMatch(first) = formed.outcome else { panic!() };
//!
//! let grown = engine.arrive(guild, QueueEntry::solo(ParticipantId(3), "Sylvanas", Role::Dps, range), 2).unwrap();
//! assert_eq!(grown.outcome, ArrivalOutcome::JoinedExistingMatch(grown.events[0].match_id()));
//! assert_ne!(grown.events[0].match_id(), first);
//! ```

pub mod events;
pub mod finder;
pub mod guild;
pub mod lifecycle;
pub mod matchmaker;

pub use events::{EntryView, MatchEvent, MatchView, RemovalReason, RosterSlot};
pub use finder::{resolve, Candidate};
pub use guild::{Applied, ArrivalOutcome, DepartureOutcome, GuildQueue, QueueSnapshot};
pub use lifecycle::{ConfirmOutcome, Match, MatchLifecycle, MatchState, RemovalOutcome, Retirement, StaleMatch};
pub use matchmaker::Matchmaker;
