//! Error types.
//!
//! Failing to find a match is never an error: incompatible ranges or a full
//! role are ordinary `Waiting` outcomes, and stale match ids come back as
//! [`StaleMatch`](crate::engine::StaleMatch) outcomes. Errors here cover
//! malformed input at the boundary, bad configuration, and broken internal
//! invariants.

use thiserror::Error;

use crate::types::{MatchId, ParticipantId};

/// Rejected arrival: the entry cannot be queued as given.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("entry {0} has no members")]
    NoMembers(ParticipantId),

    #[error("member {0} has no role")]
    NoRole(ParticipantId),

    #[error("group leader {0} is not one of the group's members")]
    LeaderNotMember(ParticipantId),

    #[error("group of {size} cannot queue for a party of {target}")]
    GroupTooLarge { size: usize, target: usize },

    #[error("entry {0} does not fit the party composition on its own")]
    CompositionExceedsQuota(ParticipantId),

    #[error("key range is inverted: min {min} > max {max}")]
    InvertedRange { min: u32, max: u32 },

    #[error("key level {0} is not supported")]
    UnsupportedKeyLevel(u32),

    #[error("participant {member} is already queued in entry {entry}")]
    DuplicateMember {
        member: ParticipantId,
        entry: ParticipantId,
    },
}

/// Invalid [`MatchConfig`](crate::config::MatchConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("party composition must hold at least 2 players, got {0}")]
    CompositionTooSmall(u32),

    #[error("party composition must hold at most {max} players")]
    CompositionTooLarge { max: u32 },

    #[error("key level bounds are inverted: min {min} > max {max}")]
    InvertedBounds { min: u32, max: u32 },

    #[error("lowest timed key level must be at least 1, got 0")]
    ZeroMinLevel,
}

/// A broken engine invariant. Always a defect in the engine itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("entry {entry} is locked to {match_id}, which is not active")]
    LockToInactiveMatch { entry: ParticipantId, match_id: MatchId },

    #[error("entry {entry} is locked to {locked_to} but listed in {listed_in}")]
    LockMismatch {
        entry: ParticipantId,
        locked_to: MatchId,
        listed_in: MatchId,
    },

    #[error("entry {entry} is listed in {match_id} but unlocked")]
    NotLocked { entry: ParticipantId, match_id: MatchId },

    #[error("entry {entry} is locked to {match_id}, which does not list it")]
    NotListed { entry: ParticipantId, match_id: MatchId },

    #[error("entry {entry} is listed in {match_id} but not queued")]
    MissingEntry { entry: ParticipantId, match_id: MatchId },

    #[error("{match_id} records {recorded} members but its entries hold {actual}")]
    MemberCountMismatch {
        match_id: MatchId,
        recorded: usize,
        actual: usize,
    },

    #[error("entry {entry} appears in more than one active match")]
    SharedEntry { entry: ParticipantId },

    #[error("{match_id} holds {members} members, above the target of {target}")]
    Oversized {
        match_id: MatchId,
        members: usize,
        target: usize,
    },

    #[error("{match_id} exceeds the quota for a role")]
    QuotaExceeded { match_id: MatchId },

    #[error("{match_id} is active with only {entries} entries")]
    Undersized { match_id: MatchId, entries: usize },

    #[error("{match_id} is in state {state} while holding {members} of {target} members")]
    StateMismatch {
        match_id: MatchId,
        state: &'static str,
        members: usize,
        target: usize,
    },
}

/// Umbrella error for engine entry points.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Entry(#[from] EntryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}

/// Convenience alias
pub type EngineResult<T> = Result<T, EngineError>;
