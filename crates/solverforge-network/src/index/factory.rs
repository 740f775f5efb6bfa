//! Turns a joiner condition list into indexers and key extractors.

use super::indexer::{Indexer, Level};
use super::keys::KeyExtractor;
use crate::fact::Fact;
use crate::joiner::{JoinCondition, JoinerType};

/// Level layout and key extraction for both sides of one join or exists.
///
/// Consecutive equal conditions collapse into one composite level; every
/// comparison condition gets a level of its own. The left indexer stores
/// left tuples and is queried with right keys, so it keeps each comparison
/// as declared; the right indexer keeps the flipped comparison.
pub(crate) struct IndexerFactory<V> {
    levels: Vec<Level>,
    left: KeyExtractor<V>,
    right: KeyExtractor<V>,
}

impl<V: Fact> IndexerFactory<V> {
    pub fn new(conditions: &[JoinCondition<V>]) -> Self {
        let mut levels = Vec::new();
        let mut left = Vec::<Vec<_>>::new();
        let mut right = Vec::<Vec<_>>::new();
        for condition in conditions {
            let collapse = condition.joiner_type == JoinerType::Equal
                && levels.last() == Some(&Level::Equal);
            if collapse {
                if let (Some(l), Some(r)) = (left.last_mut(), right.last_mut()) {
                    l.push(condition.left.clone());
                    r.push(condition.right.clone());
                }
            } else {
                levels.push(match condition.joiner_type {
                    JoinerType::Equal => Level::Equal,
                    other => Level::Compare(other),
                });
                left.push(vec![condition.left.clone()]);
                right.push(vec![condition.right.clone()]);
            }
        }
        Self {
            levels,
            left: KeyExtractor::new(left),
            right: KeyExtractor::new(right),
        }
    }

    #[cfg(test)]
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn left_keys(&self) -> &KeyExtractor<V> {
        &self.left
    }

    pub fn right_keys(&self) -> &KeyExtractor<V> {
        &self.right
    }

    pub fn left_indexer<T>(&self) -> Indexer<V, T> {
        Indexer::new(self.levels.clone())
    }

    pub fn right_indexer<T>(&self) -> Indexer<V, T> {
        Indexer::new(
            self.levels
                .iter()
                .map(|level| match level {
                    Level::Equal => Level::Equal,
                    Level::Compare(op) => Level::Compare(op.flip()),
                })
                .collect(),
        )
    }
}
