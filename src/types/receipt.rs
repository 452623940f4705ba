//! Completion receipt for a confirmed match.
//!
//! The receipt is what downstream accounting (statistics, leaderboards)
//! consumes once every entry of a match has confirmed. It is a fixed-size
//! SSZ container so it encodes identically everywhere.

use sha2::{Digest, Sha256};
use ssz_rs::prelude::*;

use crate::types::{ParticipantId, Role, RoleCounts};

/// Record of a confirmed match.
///
/// ## Roster Root
///
/// The 32-byte roster root is a SHA-256 hash over the final roster
/// (participant id and assigned role, sorted by id). Two receipts with the
/// same roster root describe the same party.
///
/// ## Example
///
/// ```
/// use party_matcher::types::{MatchReceipt, ParticipantId, Role, RoleCounts};
///
/// let roster = [(ParticipantId(1), Role::Tank), (ParticipantId(2), Role::Healer)];
/// let receipt = MatchReceipt::new(
///     4,                          // match_id
///     77,                         // guild_id
///     10,                         // key_level
///     2,                          // entry_count
///     RoleCounts::new(1, 1, 0),   // composition
///     MatchReceipt::roster_root(&roster),
///     1703577600000,              // confirmed_at
/// );
/// assert_eq!(receipt.member_count(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, SimpleSerialize, serde::Serialize)]
pub struct MatchReceipt {
    /// Id of the confirmed match generation
    pub match_id: u64,

    /// Guild the match was formed in
    pub guild_id: u64,

    /// Key level recorded for the run (minimum of the common range)
    pub key_level: u64,

    /// Number of queue entries that made up the party
    pub entry_count: u64,

    /// Tanks in the final composition
    pub tank_count: u8,

    /// Healers in the final composition
    pub healer_count: u8,

    /// Damage dealers in the final composition
    pub dps_count: u8,

    /// SHA-256 over the sorted roster
    pub roster_root: [u8; 32],

    /// Confirmation timestamp in milliseconds
    pub confirmed_at: u64,
}

impl MatchReceipt {
    /// Create a new receipt
    pub fn new(
        match_id: u64,
        guild_id: u64,
        key_level: u64,
        entry_count: u64,
        composition: RoleCounts,
        roster_root: [u8; 32],
        confirmed_at: u64,
    ) -> Self {
        Self {
            match_id,
            guild_id,
            key_level,
            entry_count,
            tank_count: clamp_u8(composition.tank),
            healer_count: clamp_u8(composition.healer),
            dps_count: clamp_u8(composition.dps),
            roster_root,
            confirmed_at,
        }
    }

    /// Compute the roster root for a list of `(participant, assigned role)` pairs.
    ///
    /// Order of the input does not matter.
    pub fn roster_root(roster: &[(ParticipantId, Role)]) -> [u8; 32] {
        let mut sorted: Vec<(ParticipantId, Role)> = roster.to_vec();
        sorted.sort_by_key(|(id, _)| *id);

        let mut hasher = Sha256::new();
        for (id, role) in sorted {
            hasher.update(id.0.to_le_bytes());
            hasher.update([role.to_u8()]);
        }
        let result = hasher.finalize();

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    }

    /// Final composition as role counts
    pub fn composition(&self) -> RoleCounts {
        RoleCounts::new(
            u32::from(self.tank_count),
            u32::from(self.healer_count),
            u32::from(self.dps_count),
        )
    }

    /// Total players in the party
    pub fn member_count(&self) -> u32 {
        self.composition().total()
    }

    /// Get the roster root as a hex string
    pub fn roster_root_hex(&self) -> String {
        hex::encode(self.roster_root)
    }
}

fn clamp_u8(value: u32) -> u8 {
    u8::try_from(value).unwrap_or(u8::MAX)
}

// ============================================================================
// Unit Tests
// ============================================================================
