//! Composite index keys and their extraction from tuples.

use smallvec::SmallVec;

use crate::error::Result;
use crate::fact::Fact;
use crate::function::{guarded, FunctionRole, Mapping};

/// The key of one index level.
///
/// Up to four components are stored inline; longer equality groups fall back
/// to a boxed slice. A null component is a [`Value::Null`](crate::Value::Null)
/// like any other value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexKey<V> {
    One(V),
    Two(V, V),
    Three(V, V, V),
    Four(V, V, V, V),
    Many(Box<[V]>),
}

impl<V: Fact> IndexKey<V> {
    pub fn from_values(values: SmallVec<[V; 4]>) -> Self {
        match values.as_slice() {
            [a] => IndexKey::One(a.clone()),
            [a, b] => IndexKey::Two(a.clone(), b.clone()),
            [a, b, c] => IndexKey::Three(a.clone(), b.clone(), c.clone()),
            [a, b, c, d] => IndexKey::Four(a.clone(), b.clone(), c.clone(), d.clone()),
            rest => IndexKey::Many(rest.into()),
        }
    }

    /// The only component of a single-value key.
    #[inline]
    pub fn single(&self) -> Option<&V> {
        match self {
            IndexKey::One(v) => Some(v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexKey::One(..) => 1,
            IndexKey::Two(..) => 2,
            IndexKey::Three(..) => 3,
            IndexKey::Four(..) => 4,
            IndexKey::Many(values) => values.len(),
        }
    }
}

/// All index keys of one tuple, one per index level.
///
/// `None` means the indexer has no levels at all, which is not the same as a
/// key whose components are null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum IndexKeys<V> {
    #[default]
    None,
    One(IndexKey<V>),
    Many(Box<[IndexKey<V>]>),
}

impl<V> IndexKeys<V> {
    #[inline]
    pub fn level(&self, depth: usize) -> Option<&IndexKey<V>> {
        match (self, depth) {
            (IndexKeys::None, _) => None,
            (IndexKeys::One(key), 0) => Some(key),
            (IndexKeys::One(_), _) => None,
            (IndexKeys::Many(keys), d) => keys.get(d),
        }
    }

    pub fn levels(&self) -> usize {
        match self {
            IndexKeys::None => 0,
            IndexKeys::One(_) => 1,
            IndexKeys::Many(keys) => keys.len(),
        }
    }
}

/// Maps a tuple's facts to its [`IndexKeys`], one mapping group per level.
#[derive(Debug, Clone)]
pub(crate) struct KeyExtractor<V> {
    levels: Vec<Vec<Mapping<V>>>,
}

impl<V: Fact> KeyExtractor<V> {
    pub fn new(levels: Vec<Vec<Mapping<V>>>) -> Self {
        Self { levels }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn extract(&self, operator: &'static str, facts: &[V]) -> Result<IndexKeys<V>> {
        let mut keys = Vec::with_capacity(self.levels.len());
        for mappings in &self.levels {
            let values = mappings
                .iter()
                .map(|m| guarded(operator, FunctionRole::JoinKey, facts, || m.apply(facts)))
                .collect::<Result<SmallVec<[V; 4]>>>()?;
            keys.push(IndexKey::from_values(values));
        }
        Ok(match keys.len() {
            0 => IndexKeys::None,
            1 => keys.pop().map_or(IndexKeys::None, IndexKeys::One),
            _ => IndexKeys::Many(keys.into_boxed_slice()),
        })
    }
}
