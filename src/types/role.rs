//! Party roles and per-role counters.
//!
//! ## Roles
//!
//! A party is built from three roles. The quota for each role comes from
//! [`MatchConfig::composition`](crate::config::MatchConfig); the reference
//! quota is 1 tank, 1 healer and 3 damage dealers for a party of 5.
//!
//! A role whose quota is 0 can never be filled.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Role enum
// ============================================================================

/// Party role.
///
/// Represented as u8 for compact encoding:
/// - Tank = 0
/// - Healer = 1
/// - Dps = 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Tank,
    Healer,
    Dps,
}

impl Role {
    /// All roles in slot order.
    pub const ALL: [Role; 3] = [Role::Tank, Role::Healer, Role::Dps];

    /// Convert to u8 for serialization
    pub fn to_u8(self) -> u8 {
        match self {
            Role::Tank => 0,
            Role::Healer => 1,
            Role::Dps => 2,
        }
    }

    /// Convert from u8 for deserialization
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Role::Tank),
            1 => Some(Role::Healer),
            2 => Some(Role::Dps),
            _ => None,
        }
    }

    /// Lowercase name, as used in configuration and events.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Tank => "tank",
            Role::Healer => "healer",
            Role::Dps => "dps",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tank" => Ok(Role::Tank),
            "healer" => Ok(Role::Healer),
            "dps" => Ok(Role::Dps),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

// ============================================================================
// RoleCounts
// ============================================================================

/// Number of members per role.
///
/// Used both for filled slots (a match's composition) and for quotas
/// (the target composition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleCounts {
    pub tank: u32,
    pub healer: u32,
    pub dps: u32,
}

impl RoleCounts {
    /// Create counts from explicit values
    pub const fn new(tank: u32, healer: u32, dps: u32) -> Self {
        Self { tank, healer, dps }
    }

    /// The reference party: 1 tank, 1 healer, 3 dps.
    pub const fn standard_party() -> Self {
        Self::new(1, 1, 3)
    }

    /// Count for a single role
    #[inline]
    pub fn get(&self, role: Role) -> u32 {
        match role {
            Role::Tank => self.tank,
            Role::Healer => self.healer,
            Role::Dps => self.dps,
        }
    }

    /// Increment the count for a role
    #[inline]
    pub fn add(&mut self, role: Role) {
        match role {
            Role::Tank => self.tank += 1,
            Role::Healer => self.healer += 1,
            Role::Dps => self.dps += 1,
        }
    }

    /// Decrement the count for a role (saturating)
    #[inline]
    pub fn remove(&mut self, role: Role) {
        match role {
            Role::Tank => self.tank = self.tank.saturating_sub(1),
            Role::Healer => self.healer = self.healer.saturating_sub(1),
            Role::Dps => self.dps = self.dps.saturating_sub(1),
        }
    }

    /// Sum across all roles, saturating at `u32::MAX`
    #[inline]
    pub fn total(&self) -> u32 {
        self.checked_total().unwrap_or(u32::MAX)
    }

    /// Sum across all roles, or None on overflow
    pub fn checked_total(&self) -> Option<u32> {
        self.tank.checked_add(self.healer)?.checked_add(self.dps)
    }

    /// Component-wise sum (saturating)
    pub fn combined(&self, other: &RoleCounts) -> RoleCounts {
        RoleCounts::new(
            self.tank.saturating_add(other.tank),
            self.healer.saturating_add(other.healer),
            self.dps.saturating_add(other.dps),
        )
    }

    /// True if no role exceeds the matching role in `quota`.
    pub fn fits_within(&self, quota: &RoleCounts) -> bool {
        Role::ALL.iter().all(|&role| self.get(role) <= quota.get(role))
    }

    /// Slots still open in `quota` after these counts are taken.
    pub fn remaining_in(&self, quota: &RoleCounts) -> RoleCounts {
        RoleCounts::new(
            quota.tank.saturating_sub(self.tank),
            quota.healer.saturating_sub(self.healer),
            quota.dps.saturating_sub(self.dps),
        )
    }
}

impl FromIterator<Role> for RoleCounts {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        let mut counts = RoleCounts::default();
        for role in iter {
            counts.add(role);
        }
        counts
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_conversion() {
        assert_eq!(Role::Tank.to_u8(), 0);
        assert_eq!(Role::Healer.to_u8(), 1);
        assert_eq!(Role::Dps.to_u8(), 2);
        assert_eq!(Role::from_u8(1), Some(Role::Healer));
        assert_eq!(Role::from_u8(3), None);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("tank".parse::<Role>(), Ok(Role::Tank));
        assert_eq!(" Healer ".parse::<Role>(), Ok(Role::Healer));
        assert_eq!("DPS".parse::<Role>(), Ok(Role::Dps));
        assert!("bard".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_counts_from_iter() {
        let counts: RoleCounts = [Role::Dps, Role::Tank, Role::Dps].into_iter().collect();
        assert_eq!(counts, RoleCounts::new(1, 0, 2));
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.checked_total(), Some(3));
    }

    #[test]
    fn test_role_counts_fits_within() {
        let quota = RoleCounts::standard_party();

        assert!(RoleCounts::new(1, 1, 3).fits_within(&quota));
        assert!(RoleCounts::new(0, 0, 2).fits_within(&quota));
        assert!(!RoleCounts::new(2, 0, 0).fits_within(&quota));
        assert!(!RoleCounts::new(0, 0, 4).fits_within(&quota));
    }

    #[test]
    fn test_role_counts_remaining() {
        let quota = RoleCounts::standard_party();
        let filled = RoleCounts::new(1, 0, 2);

        assert_eq!(filled.remaining_in(&quota), RoleCounts::new(0, 1, 1));
    }

    #[test]
    fn test_role_counts_remove_saturates() {
        let mut counts = RoleCounts::new(0, 1, 0);
        counts.remove(Role::Tank);
        counts.remove(Role::Healer);
        assert_eq!(counts, RoleCounts::default());
    }
}
