//! Per-guild queue store.
//!
//! ## Architecture
//!
//! - **Slab**: Pre-allocated storage for O(1) entry insert/remove/lookup
//! - **HashMap**: Entry id to slab key, for O(1) lookup by identity
//! - **HashMap**: Member id to entry id, so one participant can never sit in
//!   two entries at once
//!
//! The store is the single source of truth for who is waiting and who is
//! locked into which match. Lock flips go through [`QueueStore::lock_to`] and
//! [`QueueStore::unlock`]; only the match lifecycle calls them.
//!
//! ## Example
//!
//! ```
//! use party_matcher::queue::QueueStore;
//! use party_matcher::types::{KeyRange, ParticipantId, QueueEntry, Role};
//!
//! let mut store = QueueStore::with_capacity(64);
//! let tank = QueueEntry::solo(ParticipantId(1), "Thrall", Role::Tank, KeyRange::new(10, 15));
//! store.insert(tank, 1_000).unwrap();
//!
//! assert_eq!(store.len(), 1);
//! assert!(store.contains(ParticipantId(1)));
//! ```

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use slab::Slab;

use crate::error::EntryError;
use crate::types::{EntryLock, MatchId, ParticipantId, QueueEntry};

/// Queue of one guild.
#[derive(Debug, Clone, Default)]
pub struct QueueStore {
    /// Entry storage
    entries: Slab<QueueEntry>,

    /// Entry id to slab key
    index: HashMap<ParticipantId, usize>,

    /// Member id to the id of the entry holding it
    members: HashMap<ParticipantId, ParticipantId>,

    /// Next arrival sequence number
    next_sequence: u64,
}

impl QueueStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Slab::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            members: HashMap::with_capacity(capacity),
            next_sequence: 0,
        }
    }

    // ========================================================================
    // Capacity and Size
    // ========================================================================

    /// Get the current capacity (pre-allocated slots)
    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    /// Number of queued entries
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the queue is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of queued players across all entries
    pub fn player_count(&self) -> usize {
        self.entries.iter().map(|(_, e)| e.size()).sum()
    }

    /// Number of entries not locked to any match
    pub fn unlocked_count(&self) -> usize {
        self.entries.iter().filter(|(_, e)| !e.is_locked()).count()
    }

    // ========================================================================
    // Entry Management
    // ========================================================================

    /// Queue an entry, stamping its arrival time and sequence number.
    ///
    /// The entry is stored unlocked regardless of the lock it carries.
    ///
    /// # Errors
    ///
    /// [`EntryError::DuplicateMember`] if the entry id or any member id is
    /// already queued.
    pub fn insert(&mut self, mut entry: QueueEntry, now: u64) -> Result<(), EntryError> {
        if self.index.contains_key(&entry.id) {
            return Err(EntryError::DuplicateMember {
                member: entry.id,
                entry: entry.id,
            });
        }
        for member in &entry.members {
            if let Some(holder) = self.members.get(&member.id) {
                return Err(EntryError::DuplicateMember {
                    member: member.id,
                    entry: *holder,
                });
            }
        }

        entry.lock = EntryLock::Unlocked;
        entry.joined_at = now;
        entry.seen_at = now;
        entry.sequence = self.next_sequence;
        self.next_sequence += 1;

        let id = entry.id;
        for member in &entry.members {
            self.members.insert(member.id, id);
        }
        let key = self.entries.insert(entry);
        self.index.insert(id, key);
        Ok(())
    }

    /// Remove an entry by id
    ///
    /// # Returns
    ///
    /// The removed entry, or None if not queued
    pub fn remove(&mut self, id: ParticipantId) -> Option<QueueEntry> {
        let key = self.index.remove(&id)?;
        let entry = self.entries.remove(key);
        for member in &entry.members {
            self.members.remove(&member.id);
        }
        Some(entry)
    }

    /// Get an entry by id
    #[inline]
    pub fn get(&self, id: ParticipantId) -> Option<&QueueEntry> {
        let key = *self.index.get(&id)?;
        self.entries.get(key)
    }

    /// Check if an entry is queued
    #[inline]
    pub fn contains(&self, id: ParticipantId) -> bool {
        self.index.contains_key(&id)
    }

    /// Id of the entry that holds `member`
    #[inline]
    pub fn entry_of_member(&self, member: ParticipantId) -> Option<ParticipantId> {
        self.members.get(&member).copied()
    }

    /// Refresh the presence clock of an entry; arrival order is unchanged
    ///
    /// Returns false if the entry is not queued.
    pub fn touch(&mut self, id: ParticipantId, now: u64) -> bool {
        match self.get_mut(id) {
            Some(entry) => {
                entry.seen_at = now;
                true
            }
            None => false,
        }
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.members.clear();
    }

    fn get_mut(&mut self, id: ParticipantId) -> Option<&mut QueueEntry> {
        let key = *self.index.get(&id)?;
        self.entries.get_mut(key)
    }

    // ========================================================================
    // Locks (driven by the match lifecycle)
    // ========================================================================

    /// Lock an entry to a match, returning the previous lock state
    pub(crate) fn lock_to(&mut self, id: ParticipantId, match_id: MatchId) -> Option<EntryLock> {
        let entry = self.get_mut(id)?;
        let previous = entry.lock;
        entry.lock = EntryLock::LockedTo(match_id);
        Some(previous)
    }

    /// Unlock an entry, returning the previous lock state
    pub(crate) fn unlock(&mut self, id: ParticipantId) -> Option<EntryLock> {
        let entry = self.get_mut(id)?;
        let previous = entry.lock;
        entry.lock = EntryLock::Unlocked;
        Some(previous)
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    /// Iterate over all entries in slab order
    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter().map(|(_, entry)| entry)
    }

    /// All entries, oldest first (by arrival time, then arrival sequence)
    pub fn in_arrival_order(&self) -> Vec<&QueueEntry> {
        let mut ordered: Vec<&QueueEntry> = self.iter().collect();
        ordered.sort_by_key(|e| (e.joined_at, e.sequence));
        ordered
    }

    /// Unlocked entries, oldest first
    pub fn unlocked_in_arrival_order(&self) -> Vec<&QueueEntry> {
        let mut ordered: Vec<&QueueEntry> = self.iter().filter(|e| !e.is_locked()).collect();
        ordered.sort_by_key(|e| (e.joined_at, e.sequence));
        ordered
    }

    // ========================================================================
    // State Root
    // ========================================================================

    /// SHA-256 digest of the queue contents, independent of slab layout.
    pub fn state_root(&self) -> [u8; 32] {
        let mut ordered: Vec<&QueueEntry> = self.iter().collect();
        ordered.sort_by_key(|e| e.id);

        let mut hasher = Sha256::new();
        for entry in ordered {
            hasher.update(entry.id.0.to_le_bytes());
            hasher.update(entry.joined_at.to_le_bytes());
            hasher.update(entry.range.min.to_le_bytes());
            hasher.update(entry.range.max.to_le_bytes());
            hasher.update([u8::from(entry.has_keystone)]);
            let lock = entry.locked_to().map_or(0, |m| m.0 + 1);
            hasher.update(lock.to_le_bytes());
            for member in &entry.members {
                hasher.update(member.id.0.to_le_bytes());
                for role in &member.roles {
                    hasher.update([role.to_u8()]);
                }
            }
        }

        let mut root = [0u8; 32];
        root.copy_from_slice(&hasher.finalize());
        root
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KeyRange, Member, Role};

    fn solo(id: u64, role: Role) -> QueueEntry {
        QueueEntry::solo(ParticipantId(id), format!("p{id}"), role, KeyRange::new(10, 15))
    }

    #[test]
    fn test_store_new() {
        let store = QueueStore::new();

        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert_eq!(store.player_count(), 0);
    }

    #[test]
    fn test_store_with_capacity() {
        let store = QueueStore::with_capacity(1_000);
        assert!(store.capacity() >= 1_000);
    }

    #[test]
    fn test_store_insert_stamps_arrival() {
        let mut store = QueueStore::new();
        store.insert(solo(1, Role::Tank), 500).unwrap();
        store.insert(solo(2, Role::Healer), 700).unwrap();

        let first = store.get(ParticipantId(1)).unwrap();
        assert_eq!(first.joined_at(), 500);
        assert_eq!(first.sequence, 0);
        assert_eq!(store.get(ParticipantId(2)).unwrap().sequence, 1);
    }

    #[test]
    fn test_store_insert_clears_incoming_lock() {
        let mut store = QueueStore::new();
        let mut entry = solo(1, Role::Tank);
        entry.lock = EntryLock::LockedTo(MatchId(99));

        store.insert(entry, 0).unwrap();
        assert!(!store.get(ParticipantId(1)).unwrap().is_locked());
    }

    #[test]
    fn test_store_rejects_duplicate_member() {
        let mut store = QueueStore::new();
        let group = QueueEntry::group(
            ParticipantId(1),
            "duo",
            vec![
                Member::new(ParticipantId(1), Role::Tank),
                Member::new(ParticipantId(2), Role::Healer),
            ],
            KeyRange::new(2, 5),
        );
        store.insert(group, 0).unwrap();

        let err = store.insert(solo(2, Role::Dps), 0).unwrap_err();
        assert_eq!(
            err,
            EntryError::DuplicateMember {
                member: ParticipantId(2),
                entry: ParticipantId(1)
            }
        );
        assert_eq!(store.entry_of_member(ParticipantId(2)), Some(ParticipantId(1)));
    }

    #[test]
    fn test_store_remove_frees_members() {
        let mut store = QueueStore::new();
        store.insert(solo(1, Role::Tank), 0).unwrap();

        let removed = store.remove(ParticipantId(1));
        assert_eq!(removed.map(|e| e.id), Some(ParticipantId(1)));
        assert!(store.entry_of_member(ParticipantId(1)).is_none());
        assert!(store.remove(ParticipantId(1)).is_none());

        // Can queue again once removed
        store.insert(solo(1, Role::Tank), 10).unwrap();
        assert!(store.contains(ParticipantId(1)));
    }

    #[test]
    fn test_store_lock_unlock() {
        let mut store = QueueStore::new();
        store.insert(solo(1, Role::Tank), 0).unwrap();

        assert_eq!(store.lock_to(ParticipantId(1), MatchId(3)), Some(EntryLock::Unlocked));
        assert_eq!(store.get(ParticipantId(1)).unwrap().locked_to(), Some(MatchId(3)));
        assert_eq!(store.unlocked_count(), 0);

        assert_eq!(store.unlock(ParticipantId(1)), Some(EntryLock::LockedTo(MatchId(3))));
        assert_eq!(store.unlocked_count(), 1);
        assert!(store.lock_to(ParticipantId(9), MatchId(1)).is_none());
    }

    #[test]
    fn test_store_arrival_order() {
        let mut store = QueueStore::new();
        store.insert(solo(3, Role::Dps), 300).unwrap();
        store.insert(solo(1, Role::Tank), 100).unwrap();
        store.insert(solo(2, Role::Healer), 100).unwrap();

        let ids: Vec<u64> = store.in_arrival_order().iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        store.lock_to(ParticipantId(2), MatchId(1));
        let ids: Vec<u64> = store.unlocked_in_arrival_order().iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_store_touch() {
        let mut store = QueueStore::new();
        store.insert(solo(1, Role::Tank), 100).unwrap();

        assert!(store.touch(ParticipantId(1), 900));
        let entry = store.get(ParticipantId(1)).unwrap();
        assert_eq!(entry.seen_at(), 900);
        assert_eq!(entry.joined_at(), 100);
        assert!(!store.touch(ParticipantId(2), 900));
    }

    #[test]
    fn test_store_state_root() {
        let mut a = QueueStore::new();
        let mut b = QueueStore::new();
        a.insert(solo(1, Role::Tank), 0).unwrap();
        a.insert(solo(2, Role::Healer), 0).unwrap();
        b.insert(solo(2, Role::Healer), 0).unwrap();
        b.insert(solo(1, Role::Tank), 0).unwrap();

        // Same contents, different insertion order
        assert_eq!(a.state_root(), b.state_root());

        a.lock_to(ParticipantId(1), MatchId(0));
        assert_ne!(a.state_root(), b.state_root());
    }

    #[test]
    fn test_store_clear() {
        let mut store = QueueStore::new();
        store.insert(solo(1, Role::Tank), 0).unwrap();
        store.clear();

        assert!(store.is_empty());
        assert!(store.entry_of_member(ParticipantId(1)).is_none());
    }
}
