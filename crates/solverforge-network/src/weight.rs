//! Match weighers: the per-match multiplier of a constraint weight.

use std::fmt;
use std::sync::Arc;

use solverforge_core::Score;

/// Computes how many times a constraint's weight one match is worth.
///
/// The impact of a match is `weight * weigher(facts)`, scaled exactly into
/// every score level.
pub enum MatchWeigher<V> {
    Int(Arc<dyn Fn(&[V]) -> i32 + Send + Sync>),
    Long(Arc<dyn Fn(&[V]) -> i64 + Send + Sync>),
    #[cfg(feature = "decimal")]
    Decimal(Arc<dyn Fn(&[V]) -> rust_decimal::Decimal + Send + Sync>),
}

impl<V: 'static> MatchWeigher<V> {
    /// Every match weighs exactly the constraint weight.
    pub fn one() -> Self {
        Self::int(|_| 1)
    }

    pub fn int(f: impl Fn(&[V]) -> i32 + Send + Sync + 'static) -> Self {
        MatchWeigher::Int(Arc::new(f))
    }

    pub fn long(f: impl Fn(&[V]) -> i64 + Send + Sync + 'static) -> Self {
        MatchWeigher::Long(Arc::new(f))
    }

    #[cfg(feature = "decimal")]
    pub fn decimal(f: impl Fn(&[V]) -> rust_decimal::Decimal + Send + Sync + 'static) -> Self {
        MatchWeigher::Decimal(Arc::new(f))
    }

    /// `weight` scaled by this weigher's value for `facts`.
    pub fn impact<Sc: Score>(&self, weight: Sc, facts: &[V]) -> Sc {
        match self {
            MatchWeigher::Int(f) => weight.scaled(i64::from(f(facts))),
            MatchWeigher::Long(f) => weight.scaled(f(facts)),
            #[cfg(feature = "decimal")]
            MatchWeigher::Decimal(f) => weight.scaled_decimal(f(facts)),
        }
    }
}

impl<V> Clone for MatchWeigher<V> {
    fn clone(&self) -> Self {
        match self {
            MatchWeigher::Int(f) => MatchWeigher::Int(Arc::clone(f)),
            MatchWeigher::Long(f) => MatchWeigher::Long(Arc::clone(f)),
            #[cfg(feature = "decimal")]
            MatchWeigher::Decimal(f) => MatchWeigher::Decimal(Arc::clone(f)),
        }
    }
}

impl<V> fmt::Debug for MatchWeigher<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            MatchWeigher::Int(_) => "Int",
            MatchWeigher::Long(_) => "Long",
            #[cfg(feature = "decimal")]
            MatchWeigher::Decimal(_) => "Decimal",
        };
        write!(f, "MatchWeigher::{}", kind)
    }
}
