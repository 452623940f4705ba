//! Multi-guild front.
//!
//! Routes every boundary call to the serializer of the guild it names. Each
//! guild sits behind its own mutex, so events for one guild apply one at a
//! time in call order while different guilds proceed in parallel. The map
//! lock is never held while a guild is being mutated: the guild's `Arc` is
//! cloned out of the map first.
//!
//! Only `arrive` creates a guild. Every other call on an unknown guild is
//! answered as an empty guild would answer it, without registering one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use tracing::info;

use crate::config::MatchConfig;
use crate::engine::guild::{Applied, ArrivalOutcome, DepartureOutcome, GuildQueue, QueueSnapshot};
use crate::engine::lifecycle::{ConfirmOutcome, RemovalOutcome, StaleMatch};
use crate::error::{ConfigError, EngineResult, InvariantViolation};
use crate::types::{GuildId, MatchId, ParticipantId, QueueEntry};

/// Matchmaking engine for any number of guilds.
///
/// ## Example
///
/// ```
/// use party_matcher::config::MatchConfig;
/// use party_matcher::engine::{ArrivalOutcome, Matchmaker};
/// use party_matcher::types::{GuildId, KeyRange, ParticipantId, QueueEntry, Role};
///
/// let engine = Matchmaker::new(MatchConfig::default()).unwrap();
/// let range = KeyRange::new(10, 15);
///
/// engine.arrive(GuildId(1), QueueEntry::solo(ParticipantId(1), "Thrall", Role::Tank, range), 0).unwrap();
/// // Same players in another guild never meet
/// let other = engine.arrive(GuildId(2), QueueEntry::solo(ParticipantId(2), "Jaina", Role::Healer, range), 0).unwrap();
///
/// assert_eq!(other.outcome, ArrivalOutcome::Waiting);
/// assert_eq!(engine.guild_count(), 2);
/// ```
#[derive(Debug)]
pub struct Matchmaker {
    config: Arc<MatchConfig>,
    guilds: DashMap<GuildId, Arc<Mutex<GuildQueue>>>,
}

impl Matchmaker {
    /// Create an engine after validating `config`
    pub fn new(config: MatchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            party_size = config.target_size(),
            tank = config.composition.tank,
            healer = config.composition.healer,
            dps = config.composition.dps,
            "matchmaker started"
        );
        Ok(Self {
            config: Arc::new(config),
            guilds: DashMap::new(),
        })
    }

    /// Shared configuration
    #[inline]
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Number of guilds seen so far
    #[inline]
    pub fn guild_count(&self) -> usize {
        self.guilds.len()
    }

    /// Ids of every guild seen so far, sorted
    pub fn guild_ids(&self) -> Vec<GuildId> {
        let mut ids: Vec<GuildId> = self.guilds.iter().map(|g| *g.key()).collect();
        ids.sort();
        ids
    }

    /// Get or create the serializer of `guild`
    fn handle(&self, guild: GuildId) -> Arc<Mutex<GuildQueue>> {
        self.guilds
            .entry(guild)
            .or_insert_with(|| Arc::new(Mutex::new(GuildQueue::new(guild, Arc::clone(&self.config)))))
            .clone()
    }

    /// Serializer of `guild`, if it was ever created
    fn existing(&self, guild: GuildId) -> Option<Arc<Mutex<GuildQueue>>> {
        self.guilds.get(&guild).map(|g| Arc::clone(g.value()))
    }

    /// Run `f` with exclusive access to one guild, creating it if needed.
    ///
    /// A guild whose mutex was poisoned by a panicking caller is recovered:
    /// every mutation leaves the guild consistent before it returns.
    pub fn with_guild<R>(&self, guild: GuildId, f: impl FnOnce(&mut GuildQueue) -> R) -> R {
        let handle = self.handle(guild);
        let mut queue: MutexGuard<'_, GuildQueue> = handle.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut queue)
    }

    /// Run `f` on `guild` if it exists, or on a throwaway empty guild.
    fn with_existing<R>(&self, guild: GuildId, f: impl FnOnce(&mut GuildQueue) -> R) -> R {
        match self.existing(guild) {
            Some(handle) => {
                let mut queue: MutexGuard<'_, GuildQueue> = handle.lock().unwrap_or_else(PoisonError::into_inner);
                f(&mut queue)
            }
            None => f(&mut GuildQueue::new(guild, Arc::clone(&self.config))),
        }
    }

    // ========================================================================
    // Boundary operations
    // ========================================================================

    /// Queue an entry in `guild` and try to match it
    pub fn arrive(&self, guild: GuildId, entry: QueueEntry, now: u64) -> EngineResult<Applied<ArrivalOutcome>> {
        self.with_guild(guild, |q| q.arrive(entry, now)).map_err(Into::into)
    }

    /// Remove an entry (by entry or member id) from `guild`
    pub fn depart(&self, guild: GuildId, id: ParticipantId) -> Applied<DepartureOutcome> {
        self.with_existing(guild, |q| q.depart(id))
    }

    /// Record a confirmation
    pub fn confirm(
        &self,
        guild: GuildId,
        match_id: MatchId,
        participant: ParticipantId,
        now: u64,
    ) -> Applied<ConfirmOutcome> {
        self.with_existing(guild, |q| q.confirm(match_id, participant, now))
    }

    /// Record a rejection
    pub fn reject(&self, guild: GuildId, match_id: MatchId, participant: ParticipantId) -> Applied<RemovalOutcome> {
        self.with_existing(guild, |q| q.reject(match_id, participant))
    }

    /// Time out a match
    pub fn time_out(&self, guild: GuildId, match_id: MatchId) -> Applied<RemovalOutcome> {
        self.with_existing(guild, |q| q.time_out(match_id))
    }

    /// Attach a transport notification handle to a match
    pub fn attach_notification(&self, guild: GuildId, match_id: MatchId, handle: u64) -> Result<Option<u64>, StaleMatch> {
        self.with_existing(guild, |q| q.attach_notification(match_id, handle))
    }

    /// Offer every waiting entry of `guild` to the finder again
    pub fn rescan(&self, guild: GuildId, now: u64) -> Applied<Vec<ArrivalOutcome>> {
        self.with_existing(guild, |q| q.rescan(now))
    }

    /// Refresh an entry's presence clock
    pub fn touch(&self, guild: GuildId, id: ParticipantId, now: u64) -> bool {
        self.with_existing(guild, |q| q.touch(id, now))
    }

    /// Entries of `guild` waiting past the stale threshold
    pub fn stale_entries(&self, guild: GuildId, now: u64) -> Vec<ParticipantId> {
        self.with_existing(guild, |q| q.stale_entries(now))
    }

    /// Queue counters of `guild`
    pub fn snapshot(&self, guild: GuildId) -> QueueSnapshot {
        self.with_existing(guild, |q| q.snapshot())
    }

    /// Queue counters of every guild, sorted by guild id
    pub fn snapshots(&self) -> Vec<QueueSnapshot> {
        self.guild_ids().into_iter().map(|g| self.snapshot(g)).collect()
    }

    /// State root of `guild`
    pub fn state_root(&self, guild: GuildId) -> [u8; 32] {
        self.with_existing(guild, |q| q.state_root())
    }

    /// Check the invariants of every guild
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        for guild in self.guild_ids() {
            self.with_existing(guild, |q| q.verify())?;
        }
        Ok(())
    }
}
