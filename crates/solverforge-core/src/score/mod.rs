//! Score types.
//!
//! Integer scores are generated by `level_score!`; the decimal score keeps a
//! fixed-point representation and is written out by hand.

#[macro_use]
mod macros;

mod hard_soft_decimal;
mod level;
mod traits;


pub use hard_soft_decimal::HardSoftDecimalScore;
pub use level::ScoreLevel;
pub use traits::{ParseableScore, Score, ScoreParseError};

level_score! {
    /// A single-level score.
    ///
    /// ```
    /// use solverforge_core::{Score, SimpleScore};
    ///
    /// assert!(SimpleScore::of(-3) > SimpleScore::of(-5));
    /// assert_eq!(SimpleScore::of(-5).to_string(), "-5");
    /// ```
    SimpleScore { score: Soft => "" }
}

level_score! {
    /// Hard constraints decide feasibility; soft ones are only compared when
    /// hard levels tie.
    ///
    /// ```
    /// use solverforge_core::{HardSoftScore, Score};
    ///
    /// let infeasible = HardSoftScore::of(-1, -100);
    /// let feasible = HardSoftScore::of(0, -200);
    /// assert!(feasible > infeasible);
    /// assert!(!infeasible.is_feasible());
    /// ```
    HardSoftScore { hard: Hard => "hard", soft: Soft => "soft" }
}

level_score! {
    /// Three levels: hard, medium, soft.
    HardMediumSoftScore {
        hard: Hard => "hard",
        medium: Medium => "medium",
        soft: Soft => "soft",
    }
}

impl SimpleScore {
    pub const ONE: SimpleScore = SimpleScore::of(1);
}

impl HardSoftScore {
    pub const ONE_HARD: HardSoftScore = HardSoftScore::of(1, 0);
    pub const ONE_SOFT: HardSoftScore = HardSoftScore::of(0, 1);

    #[inline]
    pub const fn of_hard(hard: i64) -> Self {
        HardSoftScore::of(hard, 0)
    }

    #[inline]
    pub const fn of_soft(soft: i64) -> Self {
        HardSoftScore::of(0, soft)
    }
}

impl HardMediumSoftScore {
    pub const ONE_HARD: HardMediumSoftScore = HardMediumSoftScore::of(1, 0, 0);
    pub const ONE_MEDIUM: HardMediumSoftScore = HardMediumSoftScore::of(0, 1, 0);
    pub const ONE_SOFT: HardMediumSoftScore = HardMediumSoftScore::of(0, 0, 1);
}
