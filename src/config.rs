//! Matchmaking configuration.
//!
//! Configuration is loaded from TOML. Every field has a default, so an empty
//! file yields the reference setup: a party of 5 (1 tank, 1 healer, 3 dps),
//! key levels 0 and 2..=20, keystone rule off.
//!
//! ```toml
//! reject_leaves_queue = true
//! keystone_required_from = 2
//!
//! [composition]
//! tank = 1
//! healer = 1
//! dps = 3
//!
//! [key_levels]
//! min = 2
//! max = 25
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::types::{KeyLevelBounds, RoleCounts};

/// Largest party a composition may describe
pub const MAX_PARTY_SIZE: u32 = 40;

/// Engine configuration shared by every guild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Quota per role; the target party size is the sum
    pub composition: RoleCounts,

    /// Levels an entry may queue for
    pub key_levels: KeyLevelBounds,

    /// When set, a group whose common range reaches this level needs at
    /// least one entry with a keystone
    pub keystone_required_from: Option<u32>,

    /// Whether an entry that rejects a match also leaves the queue
    pub reject_leaves_queue: bool,

    /// How many retired match ids each guild remembers for stale reporting
    pub retired_history: usize,

    /// Wait time after which an unlocked entry counts as stale
    pub stale_after_ms: u64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            composition: RoleCounts::standard_party(),
            key_levels: KeyLevelBounds::default(),
            keystone_required_from: None,
            reject_leaves_queue: true,
            retired_history: 256,
            stale_after_ms: 15 * 60 * 1000,
        }
    }
}

impl MatchConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: MatchConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, including when it
    /// does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "cannot read config file");
            ConfigError::Io(e)
        })?;
        let config = Self::from_toml_str(&contents)?;
        info!(path = %path.display(), party_size = config.target_size(), "config loaded");
        Ok(config)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let total = self
            .composition
            .checked_total()
            .filter(|total| *total <= MAX_PARTY_SIZE)
            .ok_or(ConfigError::CompositionTooLarge { max: MAX_PARTY_SIZE })?;
        if total < 2 {
            return Err(ConfigError::CompositionTooSmall(total));
        }
        if self.key_levels.min == 0 {
            return Err(ConfigError::ZeroMinLevel);
        }
        if self.key_levels.min > self.key_levels.max {
            return Err(ConfigError::InvertedBounds {
                min: self.key_levels.min,
                max: self.key_levels.max,
            });
        }
        Ok(())
    }

    /// Number of players in a complete party
    #[inline]
    pub fn target_size(&self) -> usize {
        self.composition.total() as usize
    }
}
