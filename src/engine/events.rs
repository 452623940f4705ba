//! Events handed to the transport layer.
//!
//! Every event carries the full roster it refers to, so the transport can
//! render or replace its notification without querying the engine again.
//! Events serialize with serde; the variant name is emitted as `"type"`.

use serde::Serialize;

use crate::engine::lifecycle::{Match, MatchState};
use crate::queue::QueueStore;
use crate::types::{GuildId, KeyRange, MatchId, MatchReceipt, ParticipantId, Role, RoleCounts};

/// One member with the role assigned to it in the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RosterSlot {
    pub member: ParticipantId,
    pub role: Role,
}

/// One entry of a match as the transport renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryView {
    pub id: ParticipantId,
    pub display_name: String,
    pub has_keystone: bool,
    pub confirmed: bool,
    pub members: Vec<RosterSlot>,
}

/// Snapshot of a match generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchView {
    pub guild: GuildId,
    pub match_id: MatchId,
    pub state: MatchState,
    pub range: KeyRange,
    pub composition: RoleCounts,
    pub total_members: usize,
    pub notification: Option<u64>,
    pub entries: Vec<EntryView>,
}

impl MatchView {
    /// Build the view of `record`, reading names and members from `store`.
    ///
    /// Must run before any of the match's entries leave the store.
    pub fn of(guild: GuildId, record: &Match, store: &QueueStore) -> Self {
        let entries = record
            .entries
            .iter()
            .filter_map(|id| store.get(*id))
            .map(|entry| EntryView {
                id: entry.id,
                display_name: entry.display_name.clone(),
                has_keystone: entry.has_keystone,
                confirmed: record.confirmed.contains(&entry.id),
                members: entry
                    .members
                    .iter()
                    .filter_map(|m| {
                        let role = record.assignment.role_of(m.id).or_else(|| m.primary_role())?;
                        Some(RosterSlot { member: m.id, role })
                    })
                    .collect(),
            })
            .collect();

        Self {
            guild,
            match_id: record.id,
            state: record.state,
            range: record.range,
            composition: record.composition(),
            total_members: record.total_members,
            notification: record.notification,
            entries,
        }
    }

    /// Every member id in roster order
    pub fn members(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.entries
            .iter()
            .flat_map(|e| e.members.iter().map(|slot| slot.member))
    }

    /// Entry ids in roster order
    pub fn entry_ids(&self) -> Vec<ParticipantId> {
        self.entries.iter().map(|e| e.id).collect()
    }
}

/// Why a match was dissolved or shrunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// An entry declined the match
    Rejected,
    /// An entry left the queue
    Departed,
    /// The match was timed out; non-confirmed entries were removed
    TimedOut,
}

/// Engine output consumed by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum MatchEvent {
    /// A new match was assembled from waiting entries
    MatchFormed(MatchView),

    /// An entry joined an incomplete match; `previous` is retired
    MatchGrown {
        previous: MatchId,
        previous_notification: Option<u64>,
        joined: ParticipantId,
        current: MatchView,
    },

    /// Entries were removed and the rest carried into a new record
    MatchShrunk {
        previous: MatchId,
        previous_notification: Option<u64>,
        removed: Vec<ParticipantId>,
        reason: RemovalReason,
        current: MatchView,
    },

    /// The match fell below two entries; every remaining entry is unlocked.
    ///
    /// `view` is the roster as it stood when the match broke up, in state
    /// `Dissolved`.
    MatchDissolved {
        view: MatchView,
        removed: Vec<ParticipantId>,
        released: Vec<ParticipantId>,
        reason: RemovalReason,
    },

    /// Every entry confirmed; the party leaves the queue
    MatchConfirmed { view: MatchView, receipt: MatchReceipt },
}

impl MatchEvent {
    /// Guild the event belongs to
    pub fn guild(&self) -> GuildId {
        match self {
            MatchEvent::MatchFormed(view) => view.guild,
            MatchEvent::MatchGrown { current, .. } | MatchEvent::MatchShrunk { current, .. } => current.guild,
            MatchEvent::MatchDissolved { view, .. } | MatchEvent::MatchConfirmed { view, .. } => view.guild,
        }
    }

    /// Id of the match generation the event describes
    pub fn match_id(&self) -> MatchId {
        match self {
            MatchEvent::MatchFormed(view) => view.match_id,
            MatchEvent::MatchGrown { current, .. } | MatchEvent::MatchShrunk { current, .. } => current.match_id,
            MatchEvent::MatchDissolved { view, .. } | MatchEvent::MatchConfirmed { view, .. } => view.match_id,
        }
    }

    /// Roster the event describes
    pub fn view(&self) -> &MatchView {
        match self {
            MatchEvent::MatchFormed(view)
            | MatchEvent::MatchConfirmed { view, .. }
            | MatchEvent::MatchDissolved { view, .. } => view,
            MatchEvent::MatchGrown { current, .. } | MatchEvent::MatchShrunk { current, .. } => current,
        }
    }

    /// Event name as serialized
    pub fn kind(&self) -> &'static str {
        match self {
            MatchEvent::MatchFormed(_) => "MatchFormed",
            MatchEvent::MatchGrown { .. } => "MatchGrown",
            MatchEvent::MatchShrunk { .. } => "MatchShrunk",
            MatchEvent::MatchDissolved { .. } => "MatchDissolved",
            MatchEvent::MatchConfirmed { .. } => "MatchConfirmed",
        }
    }
}
