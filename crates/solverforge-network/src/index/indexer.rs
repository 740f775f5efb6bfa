//! The indexer chain: one node per level, unordered buckets at the leaves.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use super::keys::{IndexKey, IndexKeys};
use super::IndexError;
use crate::arena::Arena;
use crate::fact::Fact;
use crate::joiner::JoinerType;

/// Id of an entry inside one [`Indexer`].
pub type EntryId = usize;

/// Kind of one index level.
///
/// `Compare(op)` keeps a stored entry `s` for a query `q` iff `s op q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Equal,
    Compare(JoinerType),
}

enum IndexNode<V> {
    Bucket(Vec<EntryId>),
    Equal(HashMap<IndexKey<V>, IndexNode<V>>),
    Compare(BTreeMap<V, IndexNode<V>>),
}

impl<V: Fact> IndexNode<V> {
    fn new(levels: &[Level], depth: usize) -> Self {
        match levels.get(depth) {
            None => IndexNode::Bucket(Vec::new()),
            Some(Level::Equal) => IndexNode::Equal(HashMap::new()),
            Some(Level::Compare(_)) => IndexNode::Compare(BTreeMap::new()),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            IndexNode::Bucket(bucket) => bucket.is_empty(),
            IndexNode::Equal(map) => map.is_empty(),
            IndexNode::Compare(map) => map.is_empty(),
        }
    }
}

struct Entry<T> {
    value: T,
    position: usize,
}

/// Stores values under [`IndexKeys`] and visits the values matching a query
/// key coming from the opposite side.
pub(crate) struct Indexer<V, T> {
    levels: Vec<Level>,
    root: IndexNode<V>,
    entries: Arena<Entry<T>>,
}

fn level_key<V>(keys: &IndexKeys<V>, depth: usize) -> Result<&IndexKey<V>, IndexError> {
    keys.level(depth).ok_or(IndexError::LevelMismatch {
        expected: depth + 1,
        found: keys.levels(),
    })
}

fn compare_key<V: Fact>(keys: &IndexKeys<V>, depth: usize) -> Result<&V, IndexError> {
    level_key(keys, depth)?
        .single()
        .ok_or(IndexError::CompositeComparisonKey { depth })
}

impl<V: Fact, T> Indexer<V, T> {
    pub fn new(levels: Vec<Level>) -> Self {
        let root = IndexNode::new(&levels, 0);
        Self {
            levels,
            root,
            entries: Arena::new(),
        }
    }

    #[cfg(test)]
    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, entry: EntryId) -> Option<&T> {
        self.entries.get(entry).map(|e| &e.value)
    }

    fn check(&self, keys: &IndexKeys<V>) -> Result<(), IndexError> {
        if keys.levels() == self.levels.len() {
            Ok(())
        } else {
            Err(IndexError::LevelMismatch {
                expected: self.levels.len(),
                found: keys.levels(),
            })
        }
    }

    pub fn put(&mut self, keys: &IndexKeys<V>, value: T) -> Result<EntryId, IndexError> {
        self.check(keys)?;
        let levels = &self.levels;
        let mut node = &mut self.root;
        for depth in 0..levels.len() {
            node = match node {
                IndexNode::Equal(map) => map
                    .entry(level_key(keys, depth)?.clone())
                    .or_insert_with(|| IndexNode::new(levels, depth + 1)),
                IndexNode::Compare(map) => map
                    .entry(compare_key(keys, depth)?.clone())
                    .or_insert_with(|| IndexNode::new(levels, depth + 1)),
                IndexNode::Bucket(_) => return Err(IndexError::Shape { depth }),
            };
        }
        let IndexNode::Bucket(bucket) = node else {
            return Err(IndexError::Shape {
                depth: levels.len(),
            });
        };
        let id = self.entries.insert(Entry {
            value,
            position: bucket.len(),
        });
        bucket.push(id);
        Ok(id)
    }

    /// Removes `entry`, which must have been put under `keys`.
    pub fn remove(&mut self, keys: &IndexKeys<V>, entry: EntryId) -> Result<T, IndexError> {
        self.check(keys)?;
        let position = self
            .entries
            .get(entry)
            .ok_or(IndexError::UnknownEntry(entry))?
            .position;
        if let Some(moved) = remove_from(&mut self.root, keys, 0, entry, position)? {
            if let Some(moved) = self.entries.get_mut(moved) {
                moved.position = position;
            }
        }
        self.entries
            .remove(entry)
            .map(|e| e.value)
            .ok_or(IndexError::UnknownEntry(entry))
    }

    /// Number of entries a query with `keys` visits, summed from bucket
    /// lengths without touching the entries.
    pub fn size(&self, keys: &IndexKeys<V>) -> Result<usize, IndexError> {
        self.check(keys)?;
        self.count(&self.root, keys, 0)
    }

    /// Calls `f` for every entry matching the query `keys`.
    ///
    /// Equal levels match by key equality; comparison levels scan only the
    /// satisfying side of the ordered map.
    pub fn for_each<E, F>(&self, keys: &IndexKeys<V>, mut f: F) -> Result<(), E>
    where
        E: From<IndexError>,
        F: FnMut(EntryId, &T) -> Result<(), E>,
    {
        self.check(keys)?;
        self.visit(&self.root, keys, 0, &mut |id| match self.entries.get(id) {
            Some(entry) => f(id, &entry.value),
            None => Err(IndexError::UnknownEntry(id).into()),
        })
    }

    /// Entry ids matching `keys`, collected.
    #[cfg(test)]
    pub fn matches(&self, keys: &IndexKeys<V>) -> Result<Vec<EntryId>, IndexError> {
        let mut ids = Vec::new();
        self.for_each(keys, |id, _| {
            ids.push(id);
            Ok::<(), IndexError>(())
        })?;
        Ok(ids)
    }

    fn visit<E, F>(
        &self,
        node: &IndexNode<V>,
        keys: &IndexKeys<V>,
        depth: usize,
        f: &mut F,
    ) -> Result<(), E>
    where
        E: From<IndexError>,
        F: FnMut(EntryId) -> Result<(), E>,
    {
        match node {
            IndexNode::Bucket(bucket) => {
                for &id in bucket {
                    f(id)?;
                }
                Ok(())
            }
            IndexNode::Equal(map) => match map.get(level_key(keys, depth)?) {
                Some(child) => self.visit(child, keys, depth + 1, f),
                None => Ok(()),
            },
            IndexNode::Compare(map) => self.each_child(map, keys, depth, &mut |child| {
                self.visit(child, keys, depth + 1, f)
            }),
        }
    }

    fn count(&self, node: &IndexNode<V>, keys: &IndexKeys<V>, depth: usize) -> Result<usize, IndexError> {
        match node {
            IndexNode::Bucket(bucket) => Ok(bucket.len()),
            IndexNode::Equal(map) => match map.get(level_key(keys, depth)?) {
                Some(child) => self.count(child, keys, depth + 1),
                None => Ok(0),
            },
            IndexNode::Compare(map) => {
                let mut total = 0;
                self.each_child(map, keys, depth, &mut |child| {
                    total += self.count(child, keys, depth + 1)?;
                    Ok::<(), IndexError>(())
                })?;
                Ok(total)
            }
        }
    }

    /// Calls `f` for the children of a comparison level that satisfy the
    /// query; greater-than levels are walked in descending key order.
    fn each_child<E, F>(
        &self,
        map: &BTreeMap<V, IndexNode<V>>,
        keys: &IndexKeys<V>,
        depth: usize,
        f: &mut F,
    ) -> Result<(), E>
    where
        E: From<IndexError>,
        F: FnMut(&IndexNode<V>) -> Result<(), E>,
    {
        let Level::Compare(op) = self.levels[depth] else {
            return Err(IndexError::Shape { depth }.into());
        };
        let q = compare_key(keys, depth)?;
        match op {
            JoinerType::LessThan => map.range(..q).try_for_each(|(_, c)| f(c)),
            JoinerType::LessThanOrEqual => map.range(..=q).try_for_each(|(_, c)| f(c)),
            JoinerType::GreaterThan => map
                .range::<V, _>((Bound::Excluded(q), Bound::Unbounded))
                .rev()
                .try_for_each(|(_, c)| f(c)),
            JoinerType::GreaterThanOrEqual => map.range(q..).rev().try_for_each(|(_, c)| f(c)),
            JoinerType::Equal => map.get(q).map_or(Ok(()), |c| f(c)),
        }
    }
}

fn remove_from<V: Fact>(
    node: &mut IndexNode<V>,
    keys: &IndexKeys<V>,
    depth: usize,
    entry: EntryId,
    position: usize,
) -> Result<Option<EntryId>, IndexError> {
    match node {
        IndexNode::Bucket(bucket) => {
            if bucket.get(position) != Some(&entry) {
                return Err(IndexError::MissingKey(entry));
            }
            bucket.swap_remove(position);
            Ok(bucket.get(position).copied())
        }
        IndexNode::Equal(map) => {
            let key = level_key(keys, depth)?;
            let child = map.get_mut(key).ok_or(IndexError::MissingKey(entry))?;
            let moved = remove_from(child, keys, depth + 1, entry, position)?;
            if child.is_empty() {
                map.remove(key);
            }
            Ok(moved)
        }
        IndexNode::Compare(map) => {
            let key = compare_key(keys, depth)?;
            let child = map.get_mut(key).ok_or(IndexError::MissingKey(entry))?;
            let moved = remove_from(child, keys, depth + 1, entry, position)?;
            if child.is_empty() {
                map.remove(key);
            }
            Ok(moved)
        }
    }
}
