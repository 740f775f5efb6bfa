//! The score contract the scoring network relies on.

use std::fmt::{Debug, Display};
use std::ops::{Add, Neg, Sub};

use super::ScoreLevel;

/// Core trait for all score types.
///
/// The network only combines scores: it adds and subtracts constraint
/// impacts, negates penalties and scales a constraint weight by the match
/// weight. Scores are immutable values; every operation returns a new one.
///
/// Levels are ordered from highest to lowest priority and compared in that
/// order.
pub trait Score:
    Copy
    + Debug
    + Display
    + Default
    + Send
    + Sync
    + Eq
    + Ord
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    /// The identity element for addition.
    fn zero() -> Self;

    /// Number of levels, e.g. 2 for hard/soft.
    fn levels_count() -> usize;

    /// Level values, highest priority first.
    fn to_level_numbers(&self) -> Vec<i64>;

    /// Builds a score from level values.
    ///
    /// # Panics
    /// Panics if `levels.len() != levels_count()`.
    fn from_level_numbers(levels: &[i64]) -> Self;

    /// Semantic label of the level at `index`.
    ///
    /// # Panics
    /// Panics if `index >= levels_count()`.
    fn level_label(index: usize) -> ScoreLevel;

    /// Multiplies every level by `factor`, saturating on overflow.
    fn scaled(&self, factor: i64) -> Self {
        let levels: Vec<i64> = self
            .to_level_numbers()
            .into_iter()
            .map(|level| level.saturating_mul(factor))
            .collect();
        Self::from_level_numbers(&levels)
    }

    /// Multiplies every level by a decimal factor, rounding half away from
    /// zero and saturating on overflow.
    #[cfg(feature = "decimal")]
    fn scaled_decimal(&self, factor: rust_decimal::Decimal) -> Self {
        use rust_decimal::prelude::ToPrimitive;
        use rust_decimal::{Decimal, RoundingStrategy};

        let levels: Vec<i64> = self
            .to_level_numbers()
            .into_iter()
            .map(|level| {
                let product = Decimal::from(level)
                    .checked_mul(factor)
                    .map(|p| {
                        p.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                    })
                    .and_then(|p| p.to_i64());
                match product {
                    Some(value) => value,
                    None if (level < 0) != factor.is_sign_negative() => i64::MIN,
                    None => i64::MAX,
                }
            })
            .collect();
        Self::from_level_numbers(&levels)
    }

    /// A solution is feasible when no hard level is negative.
    fn is_feasible(&self) -> bool {
        self.to_level_numbers()
            .iter()
            .enumerate()
            .all(|(i, level)| Self::level_label(i) != ScoreLevel::Hard || *level >= 0)
    }

    fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    /// Label of the highest-priority non-zero level, if any.
    fn dominant_level(&self) -> Option<ScoreLevel> {
        self.to_level_numbers()
            .iter()
            .position(|level| *level != 0)
            .map(Self::level_label)
    }
}

/// Scores that round-trip through their textual form, e.g. `-1hard/0soft`.
pub trait ParseableScore: Score {
    fn parse(s: &str) -> Result<Self, ScoreParseError>;

    fn to_string_repr(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("score parse error: {message}")]
pub struct ScoreParseError {
    pub message: String,
}

impl ScoreParseError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
