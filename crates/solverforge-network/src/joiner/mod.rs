// Joiners: the matching conditions of join and exists operators.
//
// Each condition compares a key mapped from the left tuple with a key mapped
// from the right tuple. Conditions become index levels; `filtering` joiners
// become a residual predicate evaluated over the combined facts.
//
// ```
// use solverforge_network::joiner::{equal, less_than, filtering};
// use solverforge_network::{Mapping, Value};
//
// let joiners = equal::<Value>(Mapping::fact(0))
//     .and(less_than(Mapping::fact(1), Mapping::fact(1)))
//     .and(filtering(|facts: &[Value]| facts[0] != facts[2]));
// assert_eq!(joiners.conditions().len(), 2);
// assert_eq!(joiners.filters().len(), 1);
// ```

use std::fmt;

use crate::function::{FunctionId, Mapping, Predicate};

/// How a left key relates to a right key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinerType {
    Equal,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl JoinerType {
    /// The same relation seen from the other side: `a < b` iff `b > a`.
    pub fn flip(self) -> Self {
        match self {
            JoinerType::Equal => JoinerType::Equal,
            JoinerType::LessThan => JoinerType::GreaterThan,
            JoinerType::LessThanOrEqual => JoinerType::GreaterThanOrEqual,
            JoinerType::GreaterThan => JoinerType::LessThan,
            JoinerType::GreaterThanOrEqual => JoinerType::LessThanOrEqual,
        }
    }

    #[inline]
    pub fn matches<T: Ord>(self, left: &T, right: &T) -> bool {
        match self {
            JoinerType::Equal => left == right,
            JoinerType::LessThan => left < right,
            JoinerType::LessThanOrEqual => left <= right,
            JoinerType::GreaterThan => left > right,
            JoinerType::GreaterThanOrEqual => left >= right,
        }
    }
}

impl fmt::Display for JoinerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            JoinerType::Equal => "==",
            JoinerType::LessThan => "<",
            JoinerType::LessThanOrEqual => "<=",
            JoinerType::GreaterThan => ">",
            JoinerType::GreaterThanOrEqual => ">=",
        };
        f.write_str(symbol)
    }
}

// One indexable condition: `left(l) <joiner_type> right(r)`.
#[derive(Debug, Clone)]
pub struct JoinCondition<V> {
    pub joiner_type: JoinerType,
    pub left: Mapping<V>,
    pub right: Mapping<V>,
}

// An ordered list of conditions plus residual filters.
//
// Condition order is significant: consecutive equal conditions share one
// index level, each comparison gets its own.
#[derive(Debug, Clone)]
pub struct Joiners<V> {
    conditions: Vec<JoinCondition<V>>,
    filters: Vec<Predicate<V>>,
}

impl<V> Default for Joiners<V> {
    fn default() -> Self {
        Self {
            conditions: Vec::new(),
            filters: Vec::new(),
        }
    }
}

impl<V> Joiners<V> {
    // No conditions: the full cross product.
    pub fn none() -> Self {
        Self::default()
    }

    // Appends the conditions and filters of `other`.
    pub fn and(mut self, other: Joiners<V>) -> Self {
        self.conditions.extend(other.conditions);
        self.filters.extend(other.filters);
        self
    }

    pub fn conditions(&self) -> &[JoinCondition<V>] {
        &self.conditions
    }

    pub fn filters(&self) -> &[Predicate<V>] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.filters.is_empty()
    }

    pub(crate) fn ids(&self) -> Vec<(JoinerType, FunctionId, FunctionId)> {
        self.conditions
            .iter()
            .map(|c| (c.joiner_type, c.left.id(), c.right.id()))
            .collect()
    }

    pub(crate) fn filter_ids(&self) -> Vec<FunctionId> {
        self.filters.iter().map(Predicate::id).collect()
    }

    fn condition(joiner_type: JoinerType, left: Mapping<V>, right: Mapping<V>) -> Self {
        Self {
            conditions: vec![JoinCondition {
                joiner_type,
                left,
                right,
            }],
            filters: Vec::new(),
        }
    }
}

// Equal keys on both sides, mapped by the same function (self-joins).
pub fn equal<V>(mapping: impl Into<Mapping<V>>) -> Joiners<V> {
    let mapping = mapping.into();
    Joiners::condition(JoinerType::Equal, mapping.clone(), mapping)
}

// Equal keys mapped by different functions.
pub fn equal_bi<V>(left: impl Into<Mapping<V>>, right: impl Into<Mapping<V>>) -> Joiners<V> {
    Joiners::condition(JoinerType::Equal, left.into(), right.into())
}

pub fn less_than<V>(left: impl Into<Mapping<V>>, right: impl Into<Mapping<V>>) -> Joiners<V> {
    Joiners::condition(JoinerType::LessThan, left.into(), right.into())
}

pub fn less_than_or_equal<V>(
    left: impl Into<Mapping<V>>,
    right: impl Into<Mapping<V>>,
) -> Joiners<V> {
    Joiners::condition(JoinerType::LessThanOrEqual, left.into(), right.into())
}

pub fn greater_than<V>(left: impl Into<Mapping<V>>, right: impl Into<Mapping<V>>) -> Joiners<V> {
    Joiners::condition(JoinerType::GreaterThan, left.into(), right.into())
}

pub fn greater_than_or_equal<V>(
    left: impl Into<Mapping<V>>,
    right: impl Into<Mapping<V>>,
) -> Joiners<V> {
    Joiners::condition(JoinerType::GreaterThanOrEqual, left.into(), right.into())
}

// A residual predicate over the combined facts, left facts first.
pub fn filtering<V>(predicate: impl Into<Predicate<V>>) -> Joiners<V> {
    Joiners {
        conditions: Vec::new(),
        filters: vec![predicate.into()],
    }
}
