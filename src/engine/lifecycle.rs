//! Match lifecycle controller.
//!
//! ## State Machine
//!
//! ```text
//! Forming ──(reaches target size)──► AwaitingConfirmation ──(all confirm)──► Confirmed
//!    │                                        │
//!    └────────(below 2 entries)───────────────┴──────────────────────────────► Dissolved
//! ```
//!
//! Records are never mutated across generations. Growth and shrink both
//! retire the current record and mint a new id for the result, so an action
//! aimed at an old id is detected as stale instead of acting on the wrong
//! roster. A record never moves back from `AwaitingConfirmation` to
//! `Forming`; a shrunk match is a new `Forming` record.
//!
//! The controller owns every match record and is the only caller of the
//! queue store's lock operations.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::MatchConfig;
use crate::engine::events::{MatchEvent, MatchView, RemovalReason};
use crate::engine::finder::Candidate;
use crate::error::InvariantViolation;
use crate::queue::QueueStore;
use crate::rules::Assignment;
use crate::types::{EntryLock, GuildId, KeyRange, MatchId, MatchReceipt, ParticipantId, RoleCounts};

// ============================================================================
// Match record
// ============================================================================

/// Lifecycle state of a match record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    Forming,
    AwaitingConfirmation,
    Confirmed,
    Dissolved,
}

impl MatchState {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchState::Forming => "forming",
            MatchState::AwaitingConfirmation => "awaiting_confirmation",
            MatchState::Confirmed => "confirmed",
            MatchState::Dissolved => "dissolved",
        }
    }

    /// True for `Forming` and `AwaitingConfirmation`
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, MatchState::Forming | MatchState::AwaitingConfirmation)
    }
}

/// One generation of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Id of this generation
    pub id: MatchId,

    /// Id of the first generation; orders matches oldest first
    pub lineage: MatchId,

    /// Entry ids in the order they joined
    pub entries: Vec<ParticipantId>,

    /// Sum of member counts across `entries`
    pub total_members: usize,

    /// Intersection of the entries' ranges
    pub range: KeyRange,

    /// Role of every member
    pub assignment: Assignment,

    pub state: MatchState,

    /// Entries whose leader confirmed this generation
    pub confirmed: BTreeSet<ParticipantId>,

    /// Opaque transport handle; not part of the lock mechanism
    pub notification: Option<u64>,

    /// Time the first generation formed
    pub formed_at: u64,
}

impl Match {
    /// Filled count per role
    #[inline]
    pub fn composition(&self) -> RoleCounts {
        self.assignment.counts
    }

    /// Check if `entry` belongs to this match
    #[inline]
    pub fn contains(&self, entry: ParticipantId) -> bool {
        self.entries.contains(&entry)
    }

    /// Entries that have not confirmed yet
    pub fn unconfirmed(&self) -> Vec<ParticipantId> {
        self.entries
            .iter()
            .copied()
            .filter(|id| !self.confirmed.contains(id))
            .collect()
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// How a retired match id ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Retirement {
    /// Replaced by a newer generation
    Superseded(MatchId),
    Confirmed,
    Dissolved,
}

/// An operation named a match id that is not active.
///
/// Recovered locally: the transport uses it to tell the user their view is
/// outdated. `retired_as` is None when the id is unknown or has aged out of
/// the retirement history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StaleMatch {
    pub id: MatchId,
    pub retired_as: Option<Retirement>,
}

/// Result of a confirmation intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Acknowledgement stored; `remaining` entries still have to confirm
    Recorded {
        match_id: MatchId,
        entry: ParticipantId,
        remaining: usize,
    },
    /// The entry had already confirmed this generation
    AlreadyConfirmed { match_id: MatchId, entry: ParticipantId },
    /// Last acknowledgement; the party left the queue
    Completed(MatchReceipt),
    /// The match is still `Forming`
    NotAwaitingConfirmation(MatchId),
    /// The participant is in the match but does not lead its entry
    LeaderOnly { match_id: MatchId, member: ParticipantId },
    /// The participant is not in the match
    NotInMatch { match_id: MatchId, participant: ParticipantId },
    Stale(StaleMatch),
}

/// Result of removing entries from a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// The remaining entries moved to a new `Forming` record
    Shrunk { previous: MatchId, current: MatchId },
    /// The match fell below two entries; `released` were unlocked
    Dissolved {
        match_id: MatchId,
        released: Vec<ParticipantId>,
    },
    /// None of the named entries are in the match
    NotInMatch { match_id: MatchId, entry: ParticipantId },
    Stale(StaleMatch),
}

// ============================================================================
// Controller
// ============================================================================

/// Owner of every match record in one guild.
#[derive(Debug, Clone)]
pub struct MatchLifecycle {
    guild: GuildId,

    /// Active records by id
    active: BTreeMap<MatchId, Match>,

    /// Tombstones for stale reporting
    retired: HashMap<MatchId, Retirement>,

    /// Tombstone ids, oldest first
    retired_order: VecDeque<MatchId>,

    /// Maximum number of tombstones kept
    history: usize,

    next_match_id: u64,
}

impl MatchLifecycle {
    /// Create an empty controller for `guild`
    pub fn new(guild: GuildId, history: usize) -> Self {
        Self {
            guild,
            active: BTreeMap::new(),
            retired: HashMap::new(),
            retired_order: VecDeque::new(),
            history,
            next_match_id: 0,
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Get an active match
    #[inline]
    pub fn get(&self, id: MatchId) -> Option<&Match> {
        self.active.get(&id)
    }

    /// Iterate over active matches in id order
    pub fn active(&self) -> impl Iterator<Item = &Match> {
        self.active.values()
    }

    /// Number of active matches
    #[inline]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// `Forming` matches, oldest lineage first
    pub fn forming_oldest_first(&self) -> Vec<&Match> {
        let mut forming: Vec<&Match> = self
            .active
            .values()
            .filter(|m| m.state == MatchState::Forming)
            .collect();
        forming.sort_by_key(|m| (m.lineage, m.id));
        forming
    }

    /// How a retired id ended, if still remembered
    pub fn retired_as(&self, id: MatchId) -> Option<Retirement> {
        self.retired.get(&id).copied()
    }

    /// Build the transport view of an active match
    pub fn view(&self, id: MatchId, store: &QueueStore) -> Option<MatchView> {
        self.active.get(&id).map(|m| MatchView::of(self.guild, m, store))
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Commit a candidate from the match finder.
    ///
    /// Mints a new id, retires the superseded record (if any) and locks
    /// every entry to the new id.
    pub fn on_formed_or_grown(
        &mut self,
        store: &mut QueueStore,
        candidate: Candidate,
        joined: ParticipantId,
        config: &MatchConfig,
        now: u64,
    ) -> (MatchId, MatchEvent) {
        let id = self.mint();
        let previous = candidate.supersedes.and_then(|old| self.active.remove(&old));

        let state = if candidate.total_members >= config.target_size() {
            MatchState::AwaitingConfirmation
        } else {
            MatchState::Forming
        };

        let record = Match {
            id,
            lineage: previous.as_ref().map_or(id, |p| p.lineage),
            entries: candidate.entries,
            total_members: candidate.total_members,
            range: candidate.range,
            assignment: candidate.assignment,
            state,
            confirmed: BTreeSet::new(),
            notification: None,
            formed_at: previous.as_ref().map_or(now, |p| p.formed_at),
        };

        for entry in &record.entries {
            store.lock_to(*entry, id);
        }

        let view = MatchView::of(self.guild, &record, store);
        self.active.insert(id, record);

        let event = match previous {
            Some(old) => {
                self.retire(old.id, Retirement::Superseded(id));
                debug!(
                    guild = %self.guild,
                    previous = %old.id,
                    match_id = %id,
                    entry = %joined,
                    members = view.total_members,
                    state = state.as_str(),
                    "match grew"
                );
                MatchEvent::MatchGrown {
                    previous: old.id,
                    previous_notification: old.notification,
                    joined,
                    current: view,
                }
            }
            None => {
                info!(
                    guild = %self.guild,
                    match_id = %id,
                    entries = view.entries.len(),
                    members = view.total_members,
                    range = %view.range,
                    state = state.as_str(),
                    "match formed"
                );
                MatchEvent::MatchFormed(view)
            }
        };

        if state == MatchState::AwaitingConfirmation {
            info!(guild = %self.guild, match_id = %id, "match ready for confirmation");
        }

        (id, event)
    }

    /// Record an acknowledgement from `participant`.
    ///
    /// Only an entry's leader (the entry identity) confirms for it. The
    /// last acknowledgement completes the match: its entries leave the queue
    /// and a [`MatchReceipt`] is produced.
    pub fn on_member_confirmed(
        &mut self,
        store: &mut QueueStore,
        match_id: MatchId,
        participant: ParticipantId,
        now: u64,
        events: &mut Vec<MatchEvent>,
    ) -> ConfirmOutcome {
        let Some(record) = self.active.get_mut(&match_id) else {
            return ConfirmOutcome::Stale(self.stale(match_id, "confirm"));
        };

        if !record.contains(participant) {
            let member_of = record
                .entries
                .iter()
                .any(|id| store.get(*id).is_some_and(|e| e.has_member(participant)));
            return if member_of {
                ConfirmOutcome::LeaderOnly {
                    match_id,
                    member: participant,
                }
            } else {
                ConfirmOutcome::NotInMatch {
                    match_id,
                    participant,
                }
            };
        }

        if record.state != MatchState::AwaitingConfirmation {
            return ConfirmOutcome::NotAwaitingConfirmation(match_id);
        }

        if !record.confirmed.insert(participant) {
            return ConfirmOutcome::AlreadyConfirmed {
                match_id,
                entry: participant,
            };
        }

        let remaining = record.entries.len() - record.confirmed.len();
        if remaining > 0 {
            debug!(guild = %self.guild, %match_id, entry = %participant, remaining, "confirmation recorded");
            return ConfirmOutcome::Recorded {
                match_id,
                entry: participant,
                remaining,
            };
        }

        let Some(mut record) = self.active.remove(&match_id) else {
            return ConfirmOutcome::Stale(self.stale(match_id, "confirm"));
        };
        record.state = MatchState::Confirmed;

        let receipt = MatchReceipt::new(
            match_id.0,
            self.guild.0,
            u64::from(record.range.min),
            record.entries.len() as u64,
            record.composition(),
            MatchReceipt::roster_root(&record.assignment.roles),
            now,
        );
        let view = MatchView::of(self.guild, &record, store);

        for entry in &record.entries {
            store.remove(*entry);
        }
        self.retire(match_id, Retirement::Confirmed);

        info!(
            guild = %self.guild,
            %match_id,
            key_level = receipt.key_level,
            members = record.total_members,
            roster_root = %receipt.roster_root_hex(),
            "match confirmed"
        );

        events.push(MatchEvent::MatchConfirmed {
            view,
            receipt: receipt.clone(),
        });
        ConfirmOutcome::Completed(receipt)
    }

    /// Remove one entry that rejected the match or left the queue.
    pub fn on_member_rejected_or_left(
        &mut self,
        store: &mut QueueStore,
        match_id: MatchId,
        entry: ParticipantId,
        reason: RemovalReason,
        leave_queue: bool,
        events: &mut Vec<MatchEvent>,
    ) -> RemovalOutcome {
        self.remove_entries(store, match_id, &[entry], reason, leave_queue, events)
    }

    /// Time out a match: every entry that has not confirmed is removed in
    /// one step and stays queued, unlocked.
    pub fn time_out(
        &mut self,
        store: &mut QueueStore,
        match_id: MatchId,
        events: &mut Vec<MatchEvent>,
    ) -> RemovalOutcome {
        let Some(record) = self.active.get(&match_id) else {
            return RemovalOutcome::Stale(self.stale(match_id, "time out"));
        };
        let unconfirmed = record.unconfirmed();
        self.remove_entries(store, match_id, &unconfirmed, RemovalReason::TimedOut, false, events)
    }

    /// Remove `entries` from a match in one logical step.
    ///
    /// Removed entries are unlocked, and leave the store when `leave_queue`
    /// is set. Fewer than two remaining entries dissolve the match and
    /// unlock the rest; otherwise the rest move to a new `Forming` record.
    pub fn remove_entries(
        &mut self,
        store: &mut QueueStore,
        match_id: MatchId,
        entries: &[ParticipantId],
        reason: RemovalReason,
        leave_queue: bool,
        events: &mut Vec<MatchEvent>,
    ) -> RemovalOutcome {
        let Some(record) = self.active.get(&match_id) else {
            return RemovalOutcome::Stale(self.stale(match_id, "remove"));
        };

        let removed: Vec<ParticipantId> = entries.iter().copied().filter(|e| record.contains(*e)).collect();
        if removed.is_empty() {
            let entry = entries.first().copied().unwrap_or(ParticipantId(0));
            return RemovalOutcome::NotInMatch { match_id, entry };
        }

        let Some(old) = self.active.remove(&match_id) else {
            return RemovalOutcome::Stale(self.stale(match_id, "remove"));
        };
        let remaining: Vec<ParticipantId> = old.entries.iter().copied().filter(|e| !removed.contains(e)).collect();

        // Departed entries leave the store below, so capture the last roster first
        let last_roster = (remaining.len() < 2).then(|| {
            let mut view = MatchView::of(self.guild, &old, store);
            view.state = MatchState::Dissolved;
            view
        });

        for entry in &removed {
            store.unlock(*entry);
            if leave_queue {
                store.remove(*entry);
            }
        }

        if let Some(view) = last_roster {
            for entry in &remaining {
                store.unlock(*entry);
            }
            self.retire(match_id, Retirement::Dissolved);

            info!(
                guild = %self.guild,
                %match_id,
                reason = ?reason,
                removed = removed.len(),
                released = remaining.len(),
                "match dissolved"
            );

            events.push(MatchEvent::MatchDissolved {
                view,
                removed,
                released: remaining.clone(),
                reason,
            });
            return RemovalOutcome::Dissolved {
                match_id,
                released: remaining,
            };
        }

        let id = self.mint();
        let mut total_members = 0;
        let mut range = None;
        let mut kept_members = HashSet::new();
        for entry in remaining.iter().filter_map(|e| store.get(*e)) {
            total_members += entry.size();
            range = match range {
                None => Some(entry.range),
                Some(r) => Some(r.intersect(&entry.range).unwrap_or(r)),
            };
            kept_members.extend(entry.members.iter().map(|m| m.id));
        }

        let roles: Vec<_> = old
            .assignment
            .roles
            .iter()
            .copied()
            .filter(|(member, _)| kept_members.contains(member))
            .collect();
        let counts = roles.iter().map(|(_, role)| *role).collect();

        let record = Match {
            id,
            lineage: old.lineage,
            entries: remaining,
            total_members,
            range: range.unwrap_or(old.range),
            assignment: Assignment { roles, counts },
            state: MatchState::Forming,
            confirmed: BTreeSet::new(),
            notification: None,
            formed_at: old.formed_at,
        };

        for entry in &record.entries {
            store.lock_to(*entry, id);
        }
        let view = MatchView::of(self.guild, &record, store);
        self.active.insert(id, record);
        self.retire(match_id, Retirement::Superseded(id));

        debug!(
            guild = %self.guild,
            previous = %match_id,
            match_id = %id,
            reason = ?reason,
            removed = removed.len(),
            members = total_members,
            "match shrunk"
        );

        events.push(MatchEvent::MatchShrunk {
            previous: match_id,
            previous_notification: old.notification,
            removed,
            reason,
            current: view,
        });
        RemovalOutcome::Shrunk {
            previous: match_id,
            current: id,
        }
    }

    /// Attach the transport's notification handle to an active match.
    ///
    /// Returns the handle it replaces.
    pub fn attach_notification(&mut self, match_id: MatchId, handle: u64) -> Result<Option<u64>, StaleMatch> {
        match self.active.get_mut(&match_id) {
            Some(record) => Ok(record.notification.replace(handle)),
            None => Err(self.stale(match_id, "attach notification")),
        }
    }

    /// Drop every record and tombstone
    pub fn clear(&mut self) {
        self.active.clear();
        self.retired.clear();
        self.retired_order.clear();
    }

    fn mint(&mut self) -> MatchId {
        let id = MatchId(self.next_match_id);
        self.next_match_id += 1;
        id
    }

    fn retire(&mut self, id: MatchId, how: Retirement) {
        if self.history == 0 {
            return;
        }
        if self.retired_order.len() == self.history {
            if let Some(oldest) = self.retired_order.pop_front() {
                self.retired.remove(&oldest);
            }
        }
        self.retired.insert(id, how);
        self.retired_order.push_back(id);
    }

    fn stale(&self, id: MatchId, action: &'static str) -> StaleMatch {
        let stale = StaleMatch {
            id,
            retired_as: self.retired_as(id),
        };
        warn!(guild = %self.guild, match_id = %id, retired_as = ?stale.retired_as, action, "stale match reference");
        stale
    }

    // ========================================================================
    // Invariants
    // ========================================================================

    /// Check every lock and match invariant against `store`.
    pub fn verify(&self, store: &QueueStore, config: &MatchConfig) -> Result<(), InvariantViolation> {
        let target = config.target_size();
        let mut listed: HashMap<ParticipantId, MatchId> = HashMap::new();

        for record in self.active.values() {
            let match_id = record.id;
            let mut actual = 0;

            for entry_id in &record.entries {
                if listed.insert(*entry_id, match_id).is_some() {
                    return Err(InvariantViolation::SharedEntry { entry: *entry_id });
                }
                let Some(entry) = store.get(*entry_id) else {
                    return Err(InvariantViolation::MissingEntry {
                        entry: *entry_id,
                        match_id,
                    });
                };
                match entry.lock() {
                    EntryLock::Unlocked => {
                        return Err(InvariantViolation::NotLocked {
                            entry: *entry_id,
                            match_id,
                        })
                    }
                    EntryLock::LockedTo(locked_to) if locked_to != match_id => {
                        return Err(InvariantViolation::LockMismatch {
                            entry: *entry_id,
                            locked_to,
                            listed_in: match_id,
                        })
                    }
                    EntryLock::LockedTo(_) => {}
                }
                actual += entry.size();
            }

            if actual != record.total_members {
                return Err(InvariantViolation::MemberCountMismatch {
                    match_id,
                    recorded: record.total_members,
                    actual,
                });
            }
            if record.total_members > target {
                return Err(InvariantViolation::Oversized {
                    match_id,
                    members: record.total_members,
                    target,
                });
            }
            if !record.composition().fits_within(&config.composition) {
                return Err(InvariantViolation::QuotaExceeded { match_id });
            }
            if record.entries.len() < 2 {
                return Err(InvariantViolation::Undersized {
                    match_id,
                    entries: record.entries.len(),
                });
            }

            let consistent = match record.state {
                MatchState::Forming => record.total_members < target,
                MatchState::AwaitingConfirmation => record.total_members == target,
                MatchState::Confirmed | MatchState::Dissolved => false,
            };
            if !consistent {
                return Err(InvariantViolation::StateMismatch {
                    match_id,
                    state: record.state.as_str(),
                    members: record.total_members,
                    target,
                });
            }
        }

        for entry in store.iter() {
            if let Some(match_id) = entry.locked_to() {
                if !self.active.contains_key(&match_id) {
                    return Err(InvariantViolation::LockToInactiveMatch {
                        entry: entry.id,
                        match_id,
                    });
                }
                if listed.get(&entry.id) != Some(&match_id) {
                    return Err(InvariantViolation::NotListed {
                        entry: entry.id,
                        match_id,
                    });
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{QueueEntry, Role};

    fn setup(roles: &[Role]) -> (QueueStore, MatchLifecycle, MatchConfig) {
        let mut store = QueueStore::new();
        for (i, role) in roles.iter().enumerate() {
            let id = ParticipantId(i as u64 + 1);
            let entry = QueueEntry::solo(id, format!("p{}", id.0), *role, KeyRange::new(10, 15));
            store.insert(entry, i as u64).unwrap();
        }
        (store, MatchLifecycle::new(GuildId(1), 8), MatchConfig::default())
    }

    fn candidate(store: &QueueStore, ids: &[u64], supersedes: Option<MatchId>) -> Candidate {
        let entries: Vec<ParticipantId> = ids.iter().map(|i| ParticipantId(*i)).collect();
        let assignment = Assignment::primary(entries.iter().flat_map(|id| store.get(*id).unwrap().members.iter()));
        Candidate {
            supersedes,
            total_members: entries.len(),
            entries,
            range: KeyRange::new(10, 15),
            assignment,
        }
    }

    fn commit(
        store: &mut QueueStore,
        lifecycle: &mut MatchLifecycle,
        config: &MatchConfig,
        ids: &[u64],
        supersedes: Option<MatchId>,
    ) -> (MatchId, MatchEvent) {
        let next = candidate(store, ids, supersedes);
        let joined = ParticipantId(*ids.last().unwrap());
        lifecycle.on_formed_or_grown(store, next, joined, config, 0)
    }

    #[test]
    fn test_form_locks_entries() {
        let (mut store, mut lifecycle, config) = setup(&[Role::Tank, Role::Healer]);
        let (id, event) = commit(&mut store, &mut lifecycle, &config, &[1, 2], None);

        assert_eq!(event.kind(), "MatchFormed");
        assert_eq!(store.get(ParticipantId(1)).unwrap().locked_to(), Some(id));
        assert_eq!(store.get(ParticipantId(2)).unwrap().locked_to(), Some(id));
        assert_eq!(lifecycle.get(id).unwrap().state, MatchState::Forming);
        assert!(lifecycle.verify(&store, &config).is_ok());
    }

    #[test]
    fn test_growth_supersedes() {
        let (mut store, mut lifecycle, config) = setup(&[Role::Tank, Role::Healer, Role::Dps]);
        let (first, _) = commit(&mut store, &mut lifecycle, &config, &[1, 2], None);
        lifecycle.attach_notification(first, 500).unwrap();

        let (second, event) = commit(&mut store, &mut lifecycle, &config, &[1, 2, 3], Some(first));

        assert_ne!(first, second);
        assert!(lifecycle.get(first).is_none());
        assert_eq!(lifecycle.retired_as(first), Some(Retirement::Superseded(second)));
        assert_eq!(lifecycle.get(second).unwrap().lineage, first);
        match event {
            MatchEvent::MatchGrown {
                previous,
                previous_notification,
                ..
            } => {
                assert_eq!(previous, first);
                assert_eq!(previous_notification, Some(500));
            }
            other => panic!("expected MatchGrown, got {other:?}"),
        }
        assert!(lifecycle.verify(&store, &config).is_ok());
    }

    #[test]
    fn test_confirm_requires_full_match() {
        let (mut store, mut lifecycle, config) = setup(&[Role::Tank, Role::Healer]);
        let (id, _) = commit(&mut store, &mut lifecycle, &config, &[1, 2], None);
        let mut events = Vec::new();

        let outcome = lifecycle.on_member_confirmed(&mut store, id, ParticipantId(1), 0, &mut events);
        assert_eq!(outcome, ConfirmOutcome::NotAwaitingConfirmation(id));
        assert!(events.is_empty());
    }

    #[test]
    fn test_confirm_completes_and_removes() {
        let roles = [Role::Tank, Role::Healer, Role::Dps, Role::Dps, Role::Dps];
        let (mut store, mut lifecycle, config) = setup(&roles);
        let (id, _) = commit(&mut store, &mut lifecycle, &config, &[1, 2, 3, 4, 5], None);
        assert_eq!(lifecycle.get(id).unwrap().state, MatchState::AwaitingConfirmation);

        let mut events = Vec::new();
        for i in 1..=4 {
            let outcome = lifecycle.on_member_confirmed(&mut store, id, ParticipantId(i), 10, &mut events);
            assert!(matches!(outcome, ConfirmOutcome::Recorded { .. }));
        }
        let again = lifecycle.on_member_confirmed(&mut store, id, ParticipantId(1), 10, &mut events);
        assert!(matches!(again, ConfirmOutcome::AlreadyConfirmed { .. }));

        let outcome = lifecycle.on_member_confirmed(&mut store, id, ParticipantId(5), 10, &mut events);
        let ConfirmOutcome::Completed(receipt) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(receipt.key_level, 10);
        assert_eq!(receipt.composition(), RoleCounts::standard_party());
        assert!(store.is_empty());
        assert_eq!(lifecycle.retired_as(id), Some(Retirement::Confirmed));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_reject_dissolves_pair() {
        let (mut store, mut lifecycle, config) = setup(&[Role::Tank, Role::Healer]);
        let (id, _) = commit(&mut store, &mut lifecycle, &config, &[1, 2], None);
        let mut events = Vec::new();

        let outcome =
            lifecycle.on_member_rejected_or_left(&mut store, id, ParticipantId(2), RemovalReason::Rejected, true, &mut events);

        assert_eq!(
            outcome,
            RemovalOutcome::Dissolved {
                match_id: id,
                released: vec![ParticipantId(1)]
            }
        );
        assert!(!store.contains(ParticipantId(2)));
        assert!(!store.get(ParticipantId(1)).unwrap().is_locked());
        assert_eq!(lifecycle.active_count(), 0);
        assert!(lifecycle.verify(&store, &config).is_ok());
    }

    #[test]
    fn test_reject_shrinks_into_new_record() {
        let (mut store, mut lifecycle, config) = setup(&[Role::Tank, Role::Healer, Role::Dps]);
        let (id, _) = commit(&mut store, &mut lifecycle, &config, &[1, 2, 3], None);
        let mut events = Vec::new();

        let outcome =
            lifecycle.on_member_rejected_or_left(&mut store, id, ParticipantId(3), RemovalReason::Rejected, false, &mut events);
        let RemovalOutcome::Shrunk { previous, current } = outcome else {
            panic!("expected shrink");
        };

        assert_eq!(previous, id);
        let record = lifecycle.get(current).unwrap();
        assert_eq!(record.entries, vec![ParticipantId(1), ParticipantId(2)]);
        assert_eq!(record.composition(), RoleCounts::new(1, 1, 0));
        assert_eq!(record.lineage, id);
        assert!(!store.get(ParticipantId(3)).unwrap().is_locked());
        assert!(lifecycle.verify(&store, &config).is_ok());
    }

    #[test]
    fn test_stale_reference() {
        let (mut store, mut lifecycle, config) = setup(&[Role::Tank, Role::Healer, Role::Dps]);
        let (first, _) = commit(&mut store, &mut lifecycle, &config, &[1, 2], None);
        let (second, _) = commit(&mut store, &mut lifecycle, &config, &[1, 2, 3], Some(first));
        let mut events = Vec::new();

        let outcome = lifecycle.on_member_rejected_or_left(&mut store, first, ParticipantId(2), RemovalReason::Rejected, true, &mut events);
        assert_eq!(
            outcome,
            RemovalOutcome::Stale(StaleMatch {
                id: first,
                retired_as: Some(Retirement::Superseded(second))
            })
        );
        assert!(events.is_empty());
        assert!(store.contains(ParticipantId(2)));

        let unknown = lifecycle.attach_notification(MatchId(42), 1).unwrap_err();
        assert_eq!(unknown.retired_as, None);
    }

    #[test]
    fn test_time_out_removes_unconfirmed() {
        let roles = [Role::Tank, Role::Healer, Role::Dps, Role::Dps, Role::Dps];
        let (mut store, mut lifecycle, config) = setup(&roles);
        let (id, _) = commit(&mut store, &mut lifecycle, &config, &[1, 2, 3, 4, 5], None);
        let mut events = Vec::new();
        lifecycle.on_member_confirmed(&mut store, id, ParticipantId(1), 0, &mut events);
        lifecycle.on_member_confirmed(&mut store, id, ParticipantId(2), 0, &mut events);

        let outcome = lifecycle.time_out(&mut store, id, &mut events);
        let RemovalOutcome::Shrunk { current, .. } = outcome else {
            panic!("expected shrink");
        };

        let record = lifecycle.get(current).unwrap();
        assert_eq!(record.entries, vec![ParticipantId(1), ParticipantId(2)]);
        assert!(record.confirmed.is_empty());
        // Timed-out entries stay queued
        assert_eq!(store.len(), 5);
        assert_eq!(store.unlocked_count(), 3);
        assert!(lifecycle.verify(&store, &config).is_ok());
    }

    #[test]
    fn test_retired_history_is_bounded() {
        let mut lifecycle = MatchLifecycle::new(GuildId(1), 2);
        for i in 0..3 {
            lifecycle.retire(MatchId(i), Retirement::Dissolved);
        }

        assert_eq!(lifecycle.retired_as(MatchId(0)), None);
        assert_eq!(lifecycle.retired_as(MatchId(2)), Some(Retirement::Dissolved));
    }

    #[test]
    fn test_verify_detects_foreign_lock() {
        let (mut store, lifecycle, config) = setup(&[Role::Tank]);
        store.lock_to(ParticipantId(1), MatchId(9));

        assert_eq!(
            lifecycle.verify(&store, &config),
            Err(InvariantViolation::LockToInactiveMatch {
                entry: ParticipantId(1),
                match_id: MatchId(9)
            })
        );
    }
}
