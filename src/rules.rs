//! Range and composition rules.
//!
//! Pure functions with no state and no error conditions. The match finder
//! combines them to decide whether entries may share a match.
//!
//! ## Role Assignment
//!
//! Members with one role are fixed. Members with fallback roles are resolved
//! by backtracking in preference order, visiting the members with the fewest
//! options first. The search space is tiny (a party holds a handful of
//! players), so exhaustive search is fine.

use crate::types::{KeyRange, Member, ParticipantId, QueueEntry, Role, RoleCounts};

/// True iff `a.min <= b.max && b.min <= a.max`.
#[inline]
pub fn ranges_overlap(a: &KeyRange, b: &KeyRange) -> bool {
    a.overlaps(b)
}

/// True iff, for every role, `current + incoming <= target`.
///
/// A role with quota 0 in `target` rejects any incoming member of that role.
#[inline]
pub fn composition_accepts(current: &RoleCounts, incoming: &RoleCounts, target: &RoleCounts) -> bool {
    current.combined(incoming).fits_within(target)
}

/// One resolved role per member.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assignment {
    /// `(member, role)` in the order the members were given
    pub roles: Vec<(ParticipantId, Role)>,

    /// Per-role totals of `roles`
    pub counts: RoleCounts,
}

impl Assignment {
    /// Assign every member its primary role, without checking any quota
    pub fn primary<'a, I>(members: I) -> Self
    where
        I: IntoIterator<Item = &'a Member>,
    {
        let roles: Vec<(ParticipantId, Role)> = members
            .into_iter()
            .filter_map(|m| m.primary_role().map(|role| (m.id, role)))
            .collect();
        let counts = roles.iter().map(|(_, role)| *role).collect();
        Self { roles, counts }
    }

    /// Append another assignment
    pub fn extend(&mut self, other: Assignment) {
        self.counts = self.counts.combined(&other.counts);
        self.roles.extend(other.roles);
    }

    /// Role assigned to `member`, if present
    pub fn role_of(&self, member: ParticipantId) -> Option<Role> {
        self.roles
            .iter()
            .find(|(id, _)| *id == member)
            .map(|(_, role)| *role)
    }

    /// Number of assigned members
    #[inline]
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Resolve one role per member within `quota`.
///
/// Returns None when a member has no role or no assignment fits.
///
/// ```
/// use party_matcher::rules::assign_roles;
/// use party_matcher::types::{Member, ParticipantId, Role, RoleCounts};
///
/// let members = [
///     Member::flexible(ParticipantId(1), [Role::Tank, Role::Dps]),
///     Member::flexible(ParticipantId(2), [Role::Tank, Role::Healer]),
///     Member::new(ParticipantId(3), Role::Dps),
/// ];
/// let assignment = assign_roles(&members, &RoleCounts::standard_party()).unwrap();
///
/// assert_eq!(assignment.role_of(ParticipantId(1)), Some(Role::Tank));
/// assert_eq!(assignment.role_of(ParticipantId(2)), Some(Role::Healer));
/// assert_eq!(assignment.role_of(ParticipantId(3)), Some(Role::Dps));
/// ```
pub fn assign_roles<'a, I>(members: I, quota: &RoleCounts) -> Option<Assignment>
where
    I: IntoIterator<Item = &'a Member>,
{
    let members: Vec<&Member> = members.into_iter().collect();
    let mut counts = RoleCounts::default();
    let mut chosen: Vec<Option<Role>> = vec![None; members.len()];
    let mut flexible: Vec<usize> = Vec::new();

    for (idx, member) in members.iter().enumerate() {
        match member.roles.as_slice() {
            [] => return None,
            [only] => {
                counts.add(*only);
                chosen[idx] = Some(*only);
            }
            _ => flexible.push(idx),
        }
    }

    if !counts.fits_within(quota) {
        return None;
    }

    // Lower branching factor first; stable so ties keep arrival order.
    flexible.sort_by_key(|&idx| members[idx].roles.len());

    if !backtrack(&members, &flexible, 0, &mut counts, &mut chosen, quota) {
        return None;
    }

    let roles = members
        .iter()
        .zip(chosen)
        .map(|(member, role)| role.map(|role| (member.id, role)))
        .collect::<Option<Vec<_>>>()?;

    Some(Assignment { roles, counts })
}

fn backtrack(
    members: &[&Member],
    order: &[usize],
    position: usize,
    counts: &mut RoleCounts,
    chosen: &mut [Option<Role>],
    quota: &RoleCounts,
) -> bool {
    let Some(&idx) = order.get(position) else {
        return true;
    };

    for &role in &members[idx].roles {
        if counts.get(role) >= quota.get(role) {
            continue;
        }
        counts.add(role);
        chosen[idx] = Some(role);
        if backtrack(members, order, position + 1, counts, chosen, quota) {
            return true;
        }
        counts.remove(role);
        chosen[idx] = None;
    }

    false
}

/// Keystone rule: a group whose common range reaches `required_from` needs at
/// least one entry with a keystone. Always satisfied when the rule is off.
pub fn keystone_satisfied<'a, I>(common: &KeyRange, entries: I, required_from: Option<u32>) -> bool
where
    I: IntoIterator<Item = &'a QueueEntry>,
{
    match required_from {
        None => true,
        Some(level) if common.max < level => true,
        Some(_) => entries.into_iter().any(|entry| entry.has_keystone),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn quota() -> RoleCounts {
        RoleCounts::standard_party()
    }

    #[test]
    fn test_ranges_overlap_matches_key_range() {
        let a = KeyRange::new(10, 15);
        let b = KeyRange::new(15, 20);
        assert!(ranges_overlap(&a, &b));
        assert!(!ranges_overlap(&a, &KeyRange::new(16, 20)));
    }

    #[test]
    fn test_composition_accepts() {
        let filled = RoleCounts::new(1, 1, 2);

        assert!(composition_accepts(&filled, &RoleCounts::new(0, 0, 1), &quota()));
        assert!(!composition_accepts(&filled, &RoleCounts::new(1, 0, 0), &quota()));
        assert!(!composition_accepts(&filled, &RoleCounts::new(0, 0, 2), &quota()));
    }

    #[test]
    fn test_composition_rejects_zero_quota_role() {
        let no_healers = RoleCounts::new(1, 0, 4);
        assert!(!composition_accepts(&RoleCounts::default(), &RoleCounts::new(0, 1, 0), &no_healers));
    }

    #[test]
    fn test_assign_single_roles() {
        let members = [
            Member::new(ParticipantId(10), Role::Tank),
            Member::new(ParticipantId(11), Role::Healer),
        ];
        let assignment = assign_roles(&members, &quota()).expect("valid composition");

        assert_eq!(assignment.counts, RoleCounts::new(1, 1, 0));
        assert_eq!(assignment.len(), 2);
    }

    #[test]
    fn test_assign_rejects_two_tanks() {
        let members = [
            Member::new(ParticipantId(1), Role::Tank),
            Member::new(ParticipantId(2), Role::Tank),
        ];
        assert!(assign_roles(&members, &quota()).is_none());
    }

    #[test]
    fn test_assign_uses_fallback() {
        let members = [
            Member::new(ParticipantId(1), Role::Tank),
            Member::flexible(ParticipantId(2), [Role::Tank, Role::Dps]),
        ];
        let assignment = assign_roles(&members, &quota()).expect("fallback should fit");

        assert_eq!(assignment.role_of(ParticipantId(2)), Some(Role::Dps));
    }

    #[test]
    fn test_assign_backtracks() {
        // Greedy would give member 1 the tank slot and strand member 2.
        let members = [
            Member::flexible(ParticipantId(1), [Role::Tank, Role::Healer]),
            Member::flexible(ParticipantId(2), [Role::Tank, Role::Healer]),
            Member::flexible(ParticipantId(3), [Role::Healer, Role::Tank]),
        ];
        assert!(assign_roles(&members, &quota()).is_none());

        let members = [
            Member::flexible(ParticipantId(1), [Role::Healer, Role::Tank]),
            Member::flexible(ParticipantId(2), [Role::Healer, Role::Dps]),
            Member::new(ParticipantId(3), Role::Healer),
        ];
        let assignment = assign_roles(&members, &quota()).expect("backtracking should fit");
        assert_eq!(assignment.role_of(ParticipantId(3)), Some(Role::Healer));
        assert_eq!(assignment.role_of(ParticipantId(1)), Some(Role::Tank));
        assert_eq!(assignment.role_of(ParticipantId(2)), Some(Role::Dps));
    }

    #[test]
    fn test_assign_rejects_member_without_role() {
        let members = [Member::flexible(ParticipantId(1), [])];
        assert!(assign_roles(&members, &quota()).is_none());
    }

    #[test]
    fn test_assignment_primary_and_extend() {
        let mut base = Assignment::primary(&[Member::new(ParticipantId(1), Role::Tank)]);
        base.extend(Assignment::primary(&[Member::flexible(
            ParticipantId(2),
            [Role::Dps, Role::Healer],
        )]));

        assert_eq!(base.counts, RoleCounts::new(1, 0, 1));
        assert_eq!(base.role_of(ParticipantId(2)), Some(Role::Dps));
        assert_eq!(base.role_of(ParticipantId(3)), None);
    }

    #[test]
    fn test_keystone_rule() {
        let without = QueueEntry::solo(ParticipantId(1), "a", Role::Tank, KeyRange::new(2, 10));
        let with = QueueEntry::solo(ParticipantId(2), "b", Role::Healer, KeyRange::new(2, 10))
            .with_keystone(true);
        let common = KeyRange::new(2, 10);

        assert!(keystone_satisfied(&common, [&without], None));
        assert!(!keystone_satisfied(&common, [&without], Some(2)));
        assert!(keystone_satisfied(&common, [&without, &with], Some(2)));
    }

    #[test]
    fn test_keystone_rule_ignores_untimed() {
        let entry = QueueEntry::solo(ParticipantId(1), "a", Role::Tank, KeyRange::exactly(0));
        assert!(keystone_satisfied(&KeyRange::exactly(0), [&entry], Some(2)));
    }
}
