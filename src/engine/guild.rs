//! Per-guild serializer.
//!
//! A [`GuildQueue`] owns one guild's queue store and match records. Every
//! mutation goes through `&mut self`, so holding the guild (see
//! [`Matchmaker`](crate::engine::Matchmaker)) is what makes arrival,
//! departure, growth, confirmation and rejection atomic with respect to each
//! other.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use party_matcher::config::MatchConfig;
//! use party_matcher::engine::{ArrivalOutcome, GuildQueue};
//! use party_matcher::types::{GuildId, KeyRange, ParticipantId, QueueEntry, Role};
//!
//! let mut guild = GuildQueue::new(GuildId(1), Arc::new(MatchConfig::default()));
//! let range = KeyRange::new(10, 15);
//!
//! let tank = QueueEntry::solo(ParticipantId(1), "Thrall", Role::Tank, range);
//! assert_eq!(guild.arrive(tank, 0).unwrap().outcome, ArrivalOutcome::Waiting);
//!
//! let healer = QueueEntry::solo(ParticipantId(2), "Jaina", Role::Healer, range);
//! let applied = guild.arrive(healer, 1).unwrap();
//! assert!(matches!(applied.outcome, ArrivalOutcome::FormedNewMatch(_)));
//! assert_eq!(applied.events.len(), 1);
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::MatchConfig;
use crate::engine::events::{MatchEvent, MatchView, RemovalReason};
use crate::engine::finder::resolve;
use crate::engine::lifecycle::{ConfirmOutcome, Match, MatchLifecycle, MatchState, RemovalOutcome, StaleMatch};
use crate::error::{EntryError, InvariantViolation};
use crate::queue::QueueStore;
use crate::rules::assign_roles;
use crate::types::{GuildId, MatchId, ParticipantId, QueueEntry, RoleCounts};

// ============================================================================
// Outcomes
// ============================================================================

/// An operation's outcome plus the events the transport must render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied<T> {
    pub outcome: T,
    pub events: Vec<MatchEvent>,
}

impl<T> Applied<T> {
    fn new(outcome: T, events: Vec<MatchEvent>) -> Self {
        Self { outcome, events }
    }

    fn quiet(outcome: T) -> Self {
        Self::new(outcome, Vec::new())
    }
}

/// Result of offering an entry to the match finder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrivalOutcome {
    JoinedExistingMatch(MatchId),
    FormedNewMatch(MatchId),
    Waiting,
}

impl ArrivalOutcome {
    /// Match the entry ended up in, if any
    pub fn match_id(self) -> Option<MatchId> {
        match self {
            ArrivalOutcome::JoinedExistingMatch(id) | ArrivalOutcome::FormedNewMatch(id) => Some(id),
            ArrivalOutcome::Waiting => None,
        }
    }
}

/// Result of a departure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepartureOutcome {
    /// Nobody with that id is queued
    NotQueued,
    /// The entry was waiting and left
    Left(ParticipantId),
    /// The entry was in a match; the match was shrunk or dissolved
    LeftMatch(RemovalOutcome),
}

/// Queue counters for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub guild: GuildId,
    pub entries: usize,
    pub waiting_entries: usize,
    pub locked_entries: usize,
    pub players: usize,
    /// Queued players per primary role
    pub roles: RoleCounts,
    pub forming_matches: usize,
    pub awaiting_matches: usize,
}

// ============================================================================
// GuildQueue
// ============================================================================

/// Queue store and match lifecycle of one guild.
#[derive(Debug, Clone)]
pub struct GuildQueue {
    guild: GuildId,
    config: Arc<MatchConfig>,
    store: QueueStore,
    lifecycle: MatchLifecycle,
}

impl GuildQueue {
    /// Create an empty guild queue
    pub fn new(guild: GuildId, config: Arc<MatchConfig>) -> Self {
        let lifecycle = MatchLifecycle::new(guild, config.retired_history);
        Self {
            guild,
            config,
            store: QueueStore::with_capacity(64),
            lifecycle,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn guild(&self) -> GuildId {
        self.guild
    }

    #[inline]
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Read-only view of the queue store
    #[inline]
    pub fn store(&self) -> &QueueStore {
        &self.store
    }

    /// Read-only view of the match records
    #[inline]
    pub fn lifecycle(&self) -> &MatchLifecycle {
        &self.lifecycle
    }

    /// Get a queued entry by entry id
    pub fn entry(&self, id: ParticipantId) -> Option<&QueueEntry> {
        self.store.get(id)
    }

    /// Get an active match
    pub fn get_match(&self, id: MatchId) -> Option<&Match> {
        self.lifecycle.get(id)
    }

    /// Transport view of an active match
    pub fn view(&self, id: MatchId) -> Option<MatchView> {
        self.lifecycle.view(id, &self.store)
    }

    // ========================================================================
    // Boundary operations
    // ========================================================================

    /// Queue an entry and try to match it.
    ///
    /// An entry whose id is already queued replaces the old one, which
    /// departs first (its events are included).
    ///
    /// # Errors
    ///
    /// [`EntryError`] if the entry is malformed or a member is already
    /// queued in another entry. Nothing changes on error.
    pub fn arrive(&mut self, entry: QueueEntry, now: u64) -> Result<Applied<ArrivalOutcome>, EntryError> {
        self.validate(&entry)?;

        let mut events = Vec::new();
        if self.store.contains(entry.id) {
            debug!(guild = %self.guild, entry = %entry.id, "entry re-queued; replacing");
            let departed = self.depart_entry(entry.id);
            events.extend(departed.events);
        }

        let id = entry.id;
        self.store.insert(entry, now)?;
        let outcome = self.offer(id, now, &mut events);
        self.debug_verify();
        Ok(Applied::new(outcome, events))
    }

    /// Remove an entry from the queue.
    ///
    /// `id` may be the entry id or the id of any member; a member leaving
    /// takes its whole entry with it.
    pub fn depart(&mut self, id: ParticipantId) -> Applied<DepartureOutcome> {
        let Some(entry_id) = self.store.entry_of_member(id) else {
            return Applied::quiet(DepartureOutcome::NotQueued);
        };
        let applied = self.depart_entry(entry_id);
        self.debug_verify();
        applied
    }

    /// Record a confirmation from `participant` for `match_id`
    pub fn confirm(&mut self, match_id: MatchId, participant: ParticipantId, now: u64) -> Applied<ConfirmOutcome> {
        let mut events = Vec::new();
        let outcome = self
            .lifecycle
            .on_member_confirmed(&mut self.store, match_id, participant, now, &mut events);
        self.debug_verify();
        Applied::new(outcome, events)
    }

    /// An entry declines `match_id`.
    ///
    /// `participant` may be the entry id or any member's id. The entry
    /// leaves the queue unless `reject_leaves_queue` is off.
    pub fn reject(&mut self, match_id: MatchId, participant: ParticipantId) -> Applied<RemovalOutcome> {
        let entry = self.store.entry_of_member(participant).unwrap_or(participant);
        let mut events = Vec::new();
        let outcome = self.lifecycle.on_member_rejected_or_left(
            &mut self.store,
            match_id,
            entry,
            RemovalReason::Rejected,
            self.config.reject_leaves_queue,
            &mut events,
        );
        self.debug_verify();
        Applied::new(outcome, events)
    }

    /// Time out a match: entries that have not confirmed are removed from
    /// it and stay queued.
    pub fn time_out(&mut self, match_id: MatchId) -> Applied<RemovalOutcome> {
        let mut events = Vec::new();
        let outcome = self.lifecycle.time_out(&mut self.store, match_id, &mut events);
        self.debug_verify();
        Applied::new(outcome, events)
    }

    /// Attach the transport's notification handle to a match
    pub fn attach_notification(&mut self, match_id: MatchId, handle: u64) -> Result<Option<u64>, StaleMatch> {
        self.lifecycle.attach_notification(match_id, handle)
    }

    /// Offer every unlocked entry to the match finder, oldest first.
    ///
    /// Shrunk matches are only grown on the next arrival; this is the
    /// explicit re-scan for callers that want it sooner.
    pub fn rescan(&mut self, now: u64) -> Applied<Vec<ArrivalOutcome>> {
        let waiting: Vec<ParticipantId> = self
            .store
            .unlocked_in_arrival_order()
            .iter()
            .map(|e| e.id)
            .collect();

        let mut events = Vec::new();
        let mut outcomes = Vec::new();
        for id in waiting {
            // Entries taken by an earlier candidate in this pass are locked now
            if self.store.get(id).map_or(true, QueueEntry::is_locked) {
                continue;
            }
            let outcome = self.offer(id, now, &mut events);
            if outcome != ArrivalOutcome::Waiting {
                outcomes.push(outcome);
            }
        }

        debug!(guild = %self.guild, matched = outcomes.len(), "rescan finished");
        self.debug_verify();
        Applied::new(outcomes, events)
    }

    /// Refresh the presence clock of the entry holding `id`
    pub fn touch(&mut self, id: ParticipantId, now: u64) -> bool {
        match self.store.entry_of_member(id) {
            Some(entry) => self.store.touch(entry, now),
            None => false,
        }
    }

    /// Unlocked entries not touched for longer than `stale_after_ms`
    pub fn stale_entries(&self, now: u64) -> Vec<ParticipantId> {
        let stale: Vec<ParticipantId> = self
            .store
            .unlocked_in_arrival_order()
            .into_iter()
            .filter(|e| e.idle_ms(now) > self.config.stale_after_ms)
            .map(|e| e.id)
            .collect();
        if !stale.is_empty() {
            warn!(guild = %self.guild, count = stale.len(), "entries waiting past the stale threshold");
        }
        stale
    }

    /// Queue counters
    pub fn snapshot(&self) -> QueueSnapshot {
        let roles: RoleCounts = self
            .store
            .iter()
            .flat_map(|e| e.members.iter())
            .filter_map(|m| m.primary_role())
            .collect();
        let unlocked = self.store.unlocked_count();
        let count_state = |state: MatchState| self.lifecycle.active().filter(|m| m.state == state).count();

        QueueSnapshot {
            guild: self.guild,
            entries: self.store.len(),
            waiting_entries: unlocked,
            locked_entries: self.store.len() - unlocked,
            players: self.store.player_count(),
            roles,
            forming_matches: count_state(MatchState::Forming),
            awaiting_matches: count_state(MatchState::AwaitingConfirmation),
        }
    }

    /// Check every lock and match invariant
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        self.lifecycle.verify(&self.store, &self.config)
    }

    /// SHA-256 digest over the queue and the active match records.
    ///
    /// Two guilds fed the same events produce the same root.
    pub fn state_root(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.guild.0.to_le_bytes());
        hasher.update(self.store.state_root());
        for record in self.lifecycle.active() {
            hasher.update(record.id.0.to_le_bytes());
            hasher.update(record.lineage.0.to_le_bytes());
            hasher.update([record.state as u8]);
            for entry in &record.entries {
                hasher.update(entry.0.to_le_bytes());
            }
            for (member, role) in &record.assignment.roles {
                hasher.update(member.0.to_le_bytes());
                hasher.update([role.to_u8()]);
            }
        }

        let mut root = [0u8; 32];
        root.copy_from_slice(&hasher.finalize());
        root
    }

    /// State root as a hex string
    pub fn state_root_hex(&self) -> String {
        hex::encode(self.state_root())
    }

    /// Drop every entry and match
    pub fn clear(&mut self) {
        self.store.clear();
        self.lifecycle.clear();
    }

    // ========================================================================
    // Internal
    // ========================================================================

    /// Run the finder for a queued, unlocked entry and commit its candidate
    fn offer(&mut self, id: ParticipantId, now: u64, events: &mut Vec<MatchEvent>) -> ArrivalOutcome {
        let Some(candidate) = resolve(&self.store, &self.lifecycle, id, &self.config) else {
            debug!(guild = %self.guild, entry = %id, "no match; waiting");
            return ArrivalOutcome::Waiting;
        };

        let grew = candidate.is_growth();
        let (match_id, event) = self
            .lifecycle
            .on_formed_or_grown(&mut self.store, candidate, id, &self.config, now);
        events.push(event);

        if grew {
            ArrivalOutcome::JoinedExistingMatch(match_id)
        } else {
            ArrivalOutcome::FormedNewMatch(match_id)
        }
    }

    fn depart_entry(&mut self, entry_id: ParticipantId) -> Applied<DepartureOutcome> {
        let Some(locked_to) = self.store.get(entry_id).map(QueueEntry::locked_to) else {
            return Applied::quiet(DepartureOutcome::NotQueued);
        };

        match locked_to {
            Some(match_id) => {
                let mut events = Vec::new();
                let outcome = self.lifecycle.on_member_rejected_or_left(
                    &mut self.store,
                    match_id,
                    entry_id,
                    RemovalReason::Departed,
                    true,
                    &mut events,
                );
                Applied::new(DepartureOutcome::LeftMatch(outcome), events)
            }
            None => {
                self.store.remove(entry_id);
                debug!(guild = %self.guild, entry = %entry_id, "entry left the queue");
                Applied::quiet(DepartureOutcome::Left(entry_id))
            }
        }
    }

    fn validate(&self, entry: &QueueEntry) -> Result<(), EntryError> {
        if entry.members.is_empty() {
            return Err(EntryError::NoMembers(entry.id));
        }
        if let Some(member) = entry.members.iter().find(|m| m.roles.is_empty()) {
            return Err(EntryError::NoRole(member.id));
        }
        if !entry.has_member(entry.id) {
            return Err(EntryError::LeaderNotMember(entry.id));
        }

        let mut seen = HashSet::with_capacity(entry.size());
        for member in &entry.members {
            if !seen.insert(member.id) {
                return Err(EntryError::DuplicateMember {
                    member: member.id,
                    entry: entry.id,
                });
            }
        }

        let target = self.config.target_size();
        if entry.size() >= target {
            return Err(EntryError::GroupTooLarge {
                size: entry.size(),
                target,
            });
        }

        self.config.key_levels.validate(&entry.range)?;

        if assign_roles(&entry.members, &self.config.composition).is_none() {
            return Err(EntryError::CompositionExceedsQuota(entry.id));
        }

        for member in &entry.members {
            if let Some(holder) = self.store.entry_of_member(member.id) {
                if holder != entry.id {
                    return Err(EntryError::DuplicateMember {
                        member: member.id,
                        entry: holder,
                    });
                }
            }
        }

        Ok(())
    }

    #[inline]
    fn debug_verify(&self) {
        debug_assert_eq!(self.verify(), Ok(()), "{} invariant violated", self.guild);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
