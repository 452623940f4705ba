//! Queue entries: the unit that waits in a guild's queue.
//!
//! ## Solo and Group Entries
//!
//! A solo entry holds one member whose id equals the entry id. A group entry
//! is a pre-formed party registered by its leader: the entry id is the
//! leader's id and the leader must appear among the members.
//!
//! ## Role Preferences
//!
//! Each member lists the roles they can play in order of preference. The
//! first role is the primary role; further roles are fallbacks that the
//! role assignment may use when the primary slot is already taken.
//!
//! ## Locks
//!
//! [`EntryLock`] is the exclusive association of an entry with one active
//! match. It is owned by the queue store and flipped only by the match
//! lifecycle; it carries no transport data.

use serde::{Deserialize, Serialize};

use crate::types::{KeyRange, MatchId, ParticipantId, Role, RoleCounts};

// ============================================================================
// Member
// ============================================================================

/// One participant inside an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Sub-identity of this member
    pub id: ParticipantId,

    /// Roles in order of preference (first = primary)
    pub roles: Vec<Role>,
}

impl Member {
    /// A member who plays exactly one role
    pub fn new(id: ParticipantId, role: Role) -> Self {
        Self {
            id,
            roles: vec![role],
        }
    }

    /// A member with fallback roles. Duplicates are dropped, order is kept.
    ///
    /// ```
    /// use party_matcher::types::{Member, ParticipantId, Role};
    ///
    /// let m = Member::flexible(ParticipantId(1), [Role::Tank, Role::Dps, Role::Tank]);
    /// assert_eq!(m.roles, vec![Role::Tank, Role::Dps]);
    /// assert_eq!(m.primary_role(), Some(Role::Tank));
    /// ```
    pub fn flexible<I: IntoIterator<Item = Role>>(id: ParticipantId, roles: I) -> Self {
        let mut ordered: Vec<Role> = Vec::with_capacity(Role::ALL.len());
        for role in roles {
            if !ordered.contains(&role) {
                ordered.push(role);
            }
        }
        Self { id, roles: ordered }
    }

    /// The preferred role, if any role was given
    #[inline]
    pub fn primary_role(&self) -> Option<Role> {
        self.roles.first().copied()
    }

    /// True if the member accepts more than one role
    #[inline]
    pub fn is_flexible(&self) -> bool {
        self.roles.len() > 1
    }
}

// ============================================================================
// EntryLock
// ============================================================================

/// Lock state of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EntryLock {
    /// Waiting; eligible for fresh assembly
    #[default]
    Unlocked,
    /// Member of the given active match
    LockedTo(MatchId),
}

// ============================================================================
// QueueEntry
// ============================================================================

/// A waiting or matched participant unit.
///
/// ## Example
///
/// ```
/// use party_matcher::types::{KeyRange, ParticipantId, QueueEntry, Role};
///
/// let tank = QueueEntry::solo(ParticipantId(1), "Thrall", Role::Tank, KeyRange::new(10, 15));
/// assert_eq!(tank.size(), 1);
/// assert!(!tank.is_locked());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Identity of the entry (solo player or group leader)
    pub id: ParticipantId,

    /// Label the transport renders
    pub display_name: String,

    /// Members in registration order
    pub members: Vec<Member>,

    /// Accepted key levels
    pub range: KeyRange,

    /// Whether this entry brings a keystone
    pub has_keystone: bool,

    /// Lock state, mutated only through the queue store
    #[serde(skip)]
    pub(crate) lock: EntryLock,

    /// Arrival time in milliseconds
    #[serde(skip)]
    pub(crate) joined_at: u64,

    /// Last sign of life in milliseconds; refreshed by `touch`
    #[serde(skip)]
    pub(crate) seen_at: u64,

    /// Arrival sequence number within the guild, assigned by the store
    #[serde(skip)]
    pub(crate) sequence: u64,
}

impl QueueEntry {
    /// Create a solo entry for one player
    pub fn solo(id: ParticipantId, display_name: impl Into<String>, role: Role, range: KeyRange) -> Self {
        Self::with_members(id, display_name, vec![Member::new(id, role)], range)
    }

    /// Create a solo entry for a player with fallback roles
    pub fn solo_flexible<I: IntoIterator<Item = Role>>(
        id: ParticipantId,
        display_name: impl Into<String>,
        roles: I,
        range: KeyRange,
    ) -> Self {
        Self::with_members(id, display_name, vec![Member::flexible(id, roles)], range)
    }

    /// Create a group entry registered by `leader`.
    ///
    /// The leader must be one of `members`; this is checked on arrival.
    pub fn group(
        leader: ParticipantId,
        display_name: impl Into<String>,
        members: Vec<Member>,
        range: KeyRange,
    ) -> Self {
        Self::with_members(leader, display_name, members, range)
    }

    fn with_members(
        id: ParticipantId,
        display_name: impl Into<String>,
        members: Vec<Member>,
        range: KeyRange,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            members,
            range,
            has_keystone: false,
            lock: EntryLock::Unlocked,
            joined_at: 0,
            seen_at: 0,
            sequence: 0,
        }
    }

    /// Builder: mark the entry as bringing a keystone
    pub fn with_keystone(mut self, has_keystone: bool) -> Self {
        self.has_keystone = has_keystone;
        self
    }

    /// Number of members represented by this entry
    #[inline]
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// True for a pre-formed group
    #[inline]
    pub fn is_group(&self) -> bool {
        self.members.len() > 1
    }

    /// True if any member has fallback roles
    pub fn has_flexible_members(&self) -> bool {
        self.members.iter().any(Member::is_flexible)
    }

    /// Per-role counts using each member's primary role
    pub fn primary_counts(&self) -> RoleCounts {
        self.members.iter().filter_map(Member::primary_role).collect()
    }

    /// Current lock state
    #[inline]
    pub fn lock(&self) -> EntryLock {
        self.lock
    }

    /// Match this entry is locked to, if any
    #[inline]
    pub fn locked_to(&self) -> Option<MatchId> {
        match self.lock {
            EntryLock::LockedTo(id) => Some(id),
            EntryLock::Unlocked => None,
        }
    }

    /// True if locked to a match
    #[inline]
    pub fn is_locked(&self) -> bool {
        matches!(self.lock, EntryLock::LockedTo(_))
    }

    /// Arrival time in milliseconds
    #[inline]
    pub fn joined_at(&self) -> u64 {
        self.joined_at
    }

    /// Arrival or last touch time in milliseconds
    #[inline]
    pub fn seen_at(&self) -> u64 {
        self.seen_at
    }

    /// Milliseconds spent waiting at `now`
    pub fn waited_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.joined_at)
    }

    /// Milliseconds since the last touch at `now`
    pub fn idle_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.seen_at)
    }

    /// Check if `participant` is one of this entry's members
    pub fn has_member(&self, participant: ParticipantId) -> bool {
        self.members.iter().any(|m| m.id == participant)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
