//! Hard/soft score with five fixed decimal places.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Neg, Sub};

use super::traits::{ParseableScore, Score, ScoreParseError};
use super::ScoreLevel;

/// Fixed-point scale: five decimal places.
const SCALE: i64 = 100_000;
const DECIMALS: usize = 5;

/// A hard/soft score whose levels carry five decimal places.
///
/// Levels are stored pre-multiplied by 100 000 so arithmetic stays integral.
///
/// ```
/// use solverforge_core::{HardSoftDecimalScore, ParseableScore};
///
/// let score = HardSoftDecimalScore::of_scaled(-150_000, -250_000);
/// assert_eq!(score.to_string(), "-1.5hard/-2.5soft");
/// assert_eq!(HardSoftDecimalScore::parse("-1.5hard/-2.5soft").unwrap(), score);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HardSoftDecimalScore {
    hard: i64,
    soft: i64,
}

impl HardSoftDecimalScore {
    pub const ZERO: HardSoftDecimalScore = HardSoftDecimalScore { hard: 0, soft: 0 };
    pub const ONE_HARD: HardSoftDecimalScore = HardSoftDecimalScore {
        hard: SCALE,
        soft: 0,
    };
    pub const ONE_SOFT: HardSoftDecimalScore = HardSoftDecimalScore {
        hard: 0,
        soft: SCALE,
    };

    /// Creates a score from whole (unscaled) level values.
    #[inline]
    pub const fn of(hard: i64, soft: i64) -> Self {
        HardSoftDecimalScore {
            hard: hard * SCALE,
            soft: soft * SCALE,
        }
    }

    /// Creates a score from levels already multiplied by 100 000.
    #[inline]
    pub const fn of_scaled(hard: i64, soft: i64) -> Self {
        HardSoftDecimalScore { hard, soft }
    }

    #[inline]
    pub const fn hard_scaled(&self) -> i64 {
        self.hard
    }

    #[inline]
    pub const fn soft_scaled(&self) -> i64 {
        self.soft
    }
}

impl Score for HardSoftDecimalScore {
    #[inline]
    fn zero() -> Self {
        HardSoftDecimalScore::ZERO
    }

    #[inline]
    fn levels_count() -> usize {
        2
    }

    fn to_level_numbers(&self) -> Vec<i64> {
        vec![self.hard, self.soft]
    }

    fn from_level_numbers(levels: &[i64]) -> Self {
        assert_eq!(levels.len(), 2, "HardSoftDecimalScore requires exactly 2 levels");
        HardSoftDecimalScore::of_scaled(levels[0], levels[1])
    }

    fn level_label(index: usize) -> ScoreLevel {
        match index {
            0 => ScoreLevel::Hard,
            1 => ScoreLevel::Soft,
            _ => panic!("HardSoftDecimalScore has 2 levels, got index {}", index),
        }
    }

    #[inline]
    fn scaled(&self, factor: i64) -> Self {
        HardSoftDecimalScore::of_scaled(
            self.hard.saturating_mul(factor),
            self.soft.saturating_mul(factor),
        )
    }

    #[inline]
    fn is_feasible(&self) -> bool {
        self.hard >= 0
    }
}

impl Ord for HardSoftDecimalScore {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.hard, self.soft).cmp(&(other.hard, other.soft))
    }
}

impl PartialOrd for HardSoftDecimalScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add for HardSoftDecimalScore {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        HardSoftDecimalScore::of_scaled(
            self.hard.saturating_add(other.hard),
            self.soft.saturating_add(other.soft),
        )
    }
}

impl Sub for HardSoftDecimalScore {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        HardSoftDecimalScore::of_scaled(
            self.hard.saturating_sub(other.hard),
            self.soft.saturating_sub(other.soft),
        )
    }
}

impl Neg for HardSoftDecimalScore {
    type Output = Self;

    fn neg(self) -> Self {
        HardSoftDecimalScore::of_scaled(self.hard.saturating_neg(), self.soft.saturating_neg())
    }
}

fn write_fixed(f: &mut fmt::Formatter<'_>, scaled: i64) -> fmt::Result {
    let sign = if scaled < 0 { "-" } else { "" };
    let magnitude = scaled.unsigned_abs();
    let whole = magnitude / SCALE as u64;
    let fraction = magnitude % SCALE as u64;
    if fraction == 0 {
        write!(f, "{}{}", sign, whole)
    } else {
        let digits = format!("{:0width$}", fraction, width = DECIMALS);
        write!(f, "{}{}.{}", sign, whole, digits.trim_end_matches('0'))
    }
}

fn parse_fixed(text: &str) -> Result<i64, ScoreParseError> {
    let invalid = || ScoreParseError::new(format!("invalid decimal level '{}'", text));
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if whole.is_empty() || fraction.len() > DECIMALS {
        return Err(invalid());
    }
    let whole: i64 = whole.parse().map_err(|_| invalid())?;
    let mut fraction_value: i64 = 0;
    for (i, c) in fraction.chars().enumerate() {
        let digit = c.to_digit(10).ok_or_else(invalid)? as i64;
        fraction_value += digit * 10_i64.pow((DECIMALS - 1 - i) as u32);
    }
    let magnitude = whole
        .checked_mul(SCALE)
        .and_then(|w| w.checked_add(fraction_value))
        .ok_or_else(invalid)?;
    Ok(if negative { -magnitude } else { magnitude })
}

impl fmt::Debug for HardSoftDecimalScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HardSoftDecimalScore({})", self)
    }
}

impl fmt::Display for HardSoftDecimalScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_fixed(f, self.hard)?;
        f.write_str("hard/")?;
        write_fixed(f, self.soft)?;
        f.write_str("soft")
    }
}

impl ParseableScore for HardSoftDecimalScore {
    fn parse(s: &str) -> Result<Self, ScoreParseError> {
        let s = s.trim();
        let (hard, soft) = s.split_once('/').ok_or_else(|| {
            ScoreParseError::new(format!(
                "invalid HardSoftDecimalScore '{}': expected 'Xhard/Ysoft'",
                s
            ))
        })?;
        let hard = hard.trim().strip_suffix("hard").ok_or_else(|| {
            ScoreParseError::new(format!("level '{}' must end with 'hard'", hard))
        })?;
        let soft = soft.trim().strip_suffix("soft").ok_or_else(|| {
            ScoreParseError::new(format!("level '{}' must end with 'soft'", soft))
        })?;
        Ok(HardSoftDecimalScore::of_scaled(
            parse_fixed(hard)?,
            parse_fixed(soft)?,
        ))
    }
}
