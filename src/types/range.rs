//! Key level ranges.
//!
//! ## Overview
//!
//! Every entry states the inclusive range of key levels it will accept.
//! Two entries can only share a match if their ranges overlap, and a match
//! tracks the intersection of all of its entries' ranges, which narrows
//! monotonically as the match grows.
//!
//! ## Levels
//!
//! Level 0 is the untimed dungeon (M0). Timed keys run from
//! [`KeyLevelBounds::min`] to [`KeyLevelBounds::max`]; levels strictly
//! between 0 and `min` do not exist.
//!
//! ## Examples
//!
//! ```
//! use party_matcher::types::range::KeyRange;
//!
//! let a = KeyRange::new(9, 11);
//! let b = KeyRange::new(10, 14);
//!
//! assert!(a.overlaps(&b));
//! assert_eq!(a.intersect(&b), Some(KeyRange::new(10, 11)));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EntryError;

// ============================================================================
// KeyRange
// ============================================================================

/// Inclusive key level interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyRange {
    pub min: u32,
    pub max: u32,
}

impl KeyRange {
    /// Create a range. No validation happens here; see [`KeyLevelBounds::validate`].
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// A range covering a single level
    pub const fn exactly(level: u32) -> Self {
        Self::new(level, level)
    }

    /// True iff `self.min <= other.max && other.min <= self.max`.
    ///
    /// Symmetric and reflexive.
    #[inline]
    pub fn overlaps(&self, other: &KeyRange) -> bool {
        self.min <= other.max && other.min <= self.max
    }

    /// The overlapping part of two ranges, or None if they are disjoint
    pub fn intersect(&self, other: &KeyRange) -> Option<KeyRange> {
        if !self.overlaps(other) {
            return None;
        }
        Some(KeyRange::new(self.min.max(other.min), self.max.min(other.max)))
    }

    /// True if `level` lies inside the range
    #[inline]
    pub fn contains(&self, level: u32) -> bool {
        self.min <= level && level <= self.max
    }

    /// Intersection of every range in the iterator.
    ///
    /// Returns None for an empty iterator or when the ranges share no level.
    pub fn common<'a, I>(ranges: I) -> Option<KeyRange>
    where
        I: IntoIterator<Item = &'a KeyRange>,
    {
        let mut iter = ranges.into_iter();
        let first = *iter.next()?;
        iter.try_fold(first, |acc, r| acc.intersect(r))
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "+{}", self.min)
        } else {
            write!(f, "+{}..+{}", self.min, self.max)
        }
    }
}

// ============================================================================
// KeyLevelBounds
// ============================================================================

/// Levels an entry may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyLevelBounds {
    /// Lowest timed key level
    pub min: u32,
    /// Highest timed key level
    pub max: u32,
    /// Whether level 0 (untimed) may be queued for
    pub allow_zero: bool,
}

impl Default for KeyLevelBounds {
    fn default() -> Self {
        Self {
            min: 2,
            max: 20,
            allow_zero: true,
        }
    }
}

impl KeyLevelBounds {
    /// True if a single level may be queued for
    pub fn is_valid_level(&self, level: u32) -> bool {
        (level == 0 && self.allow_zero) || (self.min <= level && level <= self.max)
    }

    /// Validate a requested range against these bounds.
    ///
    /// # Errors
    ///
    /// - [`EntryError::InvertedRange`] if `min > max`
    /// - [`EntryError::UnsupportedKeyLevel`] if either end is not a valid level
    pub fn validate(&self, range: &KeyRange) -> Result<(), EntryError> {
        if range.min > range.max {
            return Err(EntryError::InvertedRange {
                min: range.min,
                max: range.max,
            });
        }
        for level in [range.min, range.max] {
            if !self.is_valid_level(level) {
                return Err(EntryError::UnsupportedKeyLevel(level));
            }
        }
        Ok(())
    }
}

// ============================================================================
// KeyBracket
// ============================================================================

/// Preset ranges offered by the queue UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyBracket {
    /// `"0"`: untimed only
    Zero,
    /// `"2-5"`
    Low,
    /// `"6-9"`
    Mid,
    /// `"10+"`: 10 up to the highest level
    High,
    /// `"anything"`: 0 up to the highest level
    Anything,
}

impl KeyBracket {
    pub const ALL: [KeyBracket; 5] = [
        KeyBracket::Zero,
        KeyBracket::Low,
        KeyBracket::Mid,
        KeyBracket::High,
        KeyBracket::Anything,
    ];

    /// Bracket key as typed by users
    pub fn as_str(self) -> &'static str {
        match self {
            KeyBracket::Zero => "0",
            KeyBracket::Low => "2-5",
            KeyBracket::Mid => "6-9",
            KeyBracket::High => "10+",
            KeyBracket::Anything => "anything",
        }
    }

    /// Numeric range for this bracket, clamped to `bounds`.
    ///
    /// None if no level of the bracket is allowed under `bounds`.
    pub fn to_range(self, bounds: &KeyLevelBounds) -> Option<KeyRange> {
        let timed = |min: u32, max: u32| {
            let range = KeyRange::new(min.max(bounds.min), max.min(bounds.max));
            (range.min <= range.max).then_some(range)
        };

        match self {
            KeyBracket::Zero => bounds.allow_zero.then_some(KeyRange::exactly(0)),
            KeyBracket::Low => timed(2, 5),
            KeyBracket::Mid => timed(6, 9),
            KeyBracket::High => timed(10, bounds.max),
            KeyBracket::Anything if bounds.allow_zero => Some(KeyRange::new(0, bounds.max)),
            KeyBracket::Anything => timed(bounds.min, bounds.max),
        }
    }

    /// Bracket whose range equals `range` exactly, if any
    pub fn from_range(range: &KeyRange, bounds: &KeyLevelBounds) -> Option<KeyBracket> {
        Self::ALL
            .into_iter()
            .find(|bracket| bracket.to_range(bounds) == Some(*range))
    }
}

/// Error returned when parsing an unknown bracket key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown key bracket: {0}")]
pub struct UnknownBracket(pub String);

impl FromStr for KeyBracket {
    type Err = UnknownBracket;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|bracket| bracket.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownBracket(s.to_string()))
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
