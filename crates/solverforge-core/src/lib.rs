//! SolverForge Core - score types and constraint identities
//!
//! This crate holds the pieces the incremental scoring network treats as
//! external collaborators:
//! - Score types and the combination contract they share ([`Score`])
//! - Constraint identification ([`ConstraintRef`]) and polarity ([`ImpactType`])

pub mod constraint;
pub mod score;

pub use constraint::{ConstraintRef, ImpactType};
pub use score::{
    HardMediumSoftScore, HardSoftDecimalScore, HardSoftScore, ParseableScore, Score,
    ScoreLevel, ScoreParseError, SimpleScore,
};
