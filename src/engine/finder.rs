//! Match finder.
//!
//! Decides, for one newly eligible entry, whether it grows an existing
//! match, forms a new one with waiting entries, or keeps waiting. The finder
//! only reads the queue store and the match records; it returns a
//! [`Candidate`] that the lifecycle controller commits.
//!
//! ## Algorithm
//!
//! First fit, never best fit:
//!
//! 1. **Grow**: `Forming` matches, oldest lineage first. The first match the
//!    entry fits (size, range overlap, composition, keystone rule) wins.
//!    Members already in the match keep their roles; only the newcomer may
//!    take a fallback role.
//! 2. **Assemble**: starting from the entry, walk unlocked entries oldest
//!    first and take every one that still fits. Fewer than 2 entries is not
//!    a match.
//! 3. Otherwise the entry waits.

use std::iter;

use crate::config::MatchConfig;
use crate::engine::lifecycle::MatchLifecycle;
use crate::queue::QueueStore;
use crate::rules::{assign_roles, composition_accepts, keystone_satisfied, ranges_overlap, Assignment};
use crate::types::{KeyRange, MatchId, ParticipantId, QueueEntry};

/// A match the finder proposes; committed by the lifecycle controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Active match this candidate replaces (grow phase only)
    pub supersedes: Option<MatchId>,

    /// Entry ids, existing entries first, in joining order
    pub entries: Vec<ParticipantId>,

    /// Common range of all entries
    pub range: KeyRange,

    /// Role of every member
    pub assignment: Assignment,

    /// Sum of member counts
    pub total_members: usize,
}

impl Candidate {
    /// True if the candidate grows an existing match
    #[inline]
    pub fn is_growth(&self) -> bool {
        self.supersedes.is_some()
    }
}

/// Find a match for the queued, unlocked entry `arriving`.
///
/// Returns None when the entry should wait, including when it is unknown or
/// already locked.
pub fn resolve(
    store: &QueueStore,
    lifecycle: &MatchLifecycle,
    arriving: ParticipantId,
    config: &MatchConfig,
) -> Option<Candidate> {
    let entry = store.get(arriving)?;
    if entry.is_locked() {
        return None;
    }

    grow(store, lifecycle, entry, config).or_else(|| assemble(store, entry, config))
}

/// Grow phase: fold `entry` into the oldest `Forming` match it fits.
fn grow(
    store: &QueueStore,
    lifecycle: &MatchLifecycle,
    entry: &QueueEntry,
    config: &MatchConfig,
) -> Option<Candidate> {
    let target = config.target_size();

    for record in lifecycle.forming_oldest_first() {
        let total_members = record.total_members + entry.size();
        if total_members > target {
            continue;
        }
        if !ranges_overlap(&record.range, &entry.range) {
            continue;
        }
        let Some(range) = record.range.intersect(&entry.range) else {
            continue;
        };

        let Some(assignment) = extend(&record.assignment, entry, config) else {
            continue;
        };
        let existing: Vec<&QueueEntry> = record.entries.iter().filter_map(|id| store.get(*id)).collect();
        if !keystone_satisfied(
            &range,
            existing.iter().copied().chain(iter::once(entry)),
            config.keystone_required_from,
        ) {
            continue;
        }

        let mut entries = record.entries.clone();
        entries.push(entry.id);
        return Some(Candidate {
            supersedes: Some(record.id),
            entries,
            range,
            assignment,
            total_members,
        });
    }

    None
}

/// Fresh-assembly phase: build a new match from unlocked entries, starting
/// with `entry`.
fn assemble(store: &QueueStore, entry: &QueueEntry, config: &MatchConfig) -> Option<Candidate> {
    let target = config.target_size();

    let mut taken: Vec<&QueueEntry> = vec![entry];
    let mut range = entry.range;
    let mut total_members = entry.size();
    let mut assignment = extend(&Assignment::default(), entry, config)?;

    for other in store.unlocked_in_arrival_order() {
        if total_members >= target {
            break;
        }
        if other.id == entry.id || total_members + other.size() > target {
            continue;
        }
        let Some(next_range) = range.intersect(&other.range) else {
            continue;
        };
        let Some(next_assignment) = fit(&taken, &assignment, other, config) else {
            continue;
        };
        if !keystone_satisfied(
            &next_range,
            taken.iter().copied().chain(iter::once(other)),
            config.keystone_required_from,
        ) {
            continue;
        }

        taken.push(other);
        range = next_range;
        assignment = next_assignment;
        total_members += other.size();
    }

    if taken.len() < 2 {
        return None;
    }

    Some(Candidate {
        supersedes: None,
        entries: taken.iter().map(|e| e.id).collect(),
        range,
        assignment,
        total_members,
    })
}

/// Add `incoming` to `current` without touching any role already assigned.
///
/// Primary roles are tried first. A flexible incoming member may fall back
/// to any slot still open in the quota.
fn extend(current: &Assignment, incoming: &QueueEntry, config: &MatchConfig) -> Option<Assignment> {
    let quota = &config.composition;

    let added = if composition_accepts(&current.counts, &incoming.primary_counts(), quota) {
        Assignment::primary(&incoming.members)
    } else if incoming.has_flexible_members() {
        assign_roles(&incoming.members, &current.counts.remaining_in(quota))?
    } else {
        return None;
    };

    let mut next = current.clone();
    next.extend(added);
    Some(next)
}

/// Add `incoming` to entries being assembled into a new match.
///
/// Nobody has been notified of these roles yet, so when extending fails and
/// anyone has fallback roles, every member is reassigned from scratch.
fn fit(
    taken: &[&QueueEntry],
    current: &Assignment,
    incoming: &QueueEntry,
    config: &MatchConfig,
) -> Option<Assignment> {
    if let Some(next) = extend(current, incoming, config) {
        return Some(next);
    }

    let flexible = incoming.has_flexible_members() || taken.iter().any(|e| e.has_flexible_members());
    if !flexible {
        return None;
    }

    let members = taken
        .iter()
        .flat_map(|e| e.members.iter())
        .chain(incoming.members.iter());
    assign_roles(members, &config.composition)
}

// ============================================================================
// Unit Tests
// ============================================================================
