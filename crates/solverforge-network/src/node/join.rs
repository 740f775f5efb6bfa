use std::collections::HashMap;

use super::pair::PairTable;
use super::{combined, passes, Change, Node, NodeIndex, PropagationQueue, Side};
use crate::arena::Arena;
use crate::error::{NetworkError, Result};
use crate::fact::{Fact, Facts};
use crate::function::Predicate;
use crate::index::{EntryId, IndexKeys, Indexer, IndexerFactory, KeyExtractor};
use crate::joiner::Joiners;
use crate::tuple::{Slot, TupleArena, TupleId};

const LABEL: &str = "join";

/// Store slots a two-input operator claims on the tuples of one input.
#[derive(Debug, Clone, Copy)]
pub(crate) struct InputSlots {
    pub keys: usize,
    pub record: usize,
}

struct Record {
    tuple: TupleId,
    entry: EntryId,
}

struct JoinSide<V> {
    slots: InputSlots,
    keys: KeyExtractor<V>,
    index: Indexer<V, usize>,
    records: Arena<Record>,
}

/// Emits one combined tuple per matching (left, right) pair.
///
/// Pairs are found through the opposite side's indexer; a residual filter
/// from `filtering` joiners is evaluated on the combined facts.
pub(crate) struct JoinNode<V> {
    left: JoinSide<V>,
    right: JoinSide<V>,
    filters: Vec<Predicate<V>>,
    pairs: PairTable<TupleId>,
    queue: PropagationQueue,
    scratch: Vec<usize>,
}

impl<V: Fact> JoinNode<V> {
    pub fn new(owner: NodeIndex, joiners: &Joiners<V>, left: InputSlots, right: InputSlots) -> Self {
        let factory = IndexerFactory::new(joiners.conditions());
        Self {
            left: JoinSide {
                slots: left,
                keys: factory.left_keys().clone(),
                index: factory.left_indexer(),
                records: Arena::new(),
            },
            right: JoinSide {
                slots: right,
                keys: factory.right_keys().clone(),
                index: factory.right_indexer(),
                records: Arena::new(),
            },
            filters: joiners.filters().to_vec(),
            pairs: PairTable::new(),
            queue: PropagationQueue::new(owner),
            scratch: Vec::new(),
        }
    }

    /// (this side, opposite side)
    fn split(&mut self, side: Side) -> (&mut JoinSide<V>, &mut JoinSide<V>) {
        match side {
            Side::Left => (&mut self.left, &mut self.right),
            Side::Right => (&mut self.right, &mut self.left),
        }
    }

    fn tuple_of(&self, side: Side, record: usize) -> Result<TupleId> {
        let records = match side {
            Side::Left => &self.left.records,
            Side::Right => &self.right.records,
        };
        records
            .get(record)
            .map(|r| r.tuple)
            .ok_or_else(|| NetworkError::corrupted(format!("{} lost record {}", LABEL, record)))
    }

    /// Combined facts of the pair formed by `record` on `side` and `other`.
    fn pair_facts(
        &self,
        side: Side,
        record: usize,
        other: usize,
        tuples: &TupleArena<V>,
    ) -> Result<(usize, usize, Facts<V>)> {
        let (l, r) = match side {
            Side::Left => (record, other),
            Side::Right => (other, record),
        };
        let facts = combined(
            tuples,
            self.tuple_of(Side::Left, l)?,
            self.tuple_of(Side::Right, r)?,
        )?;
        Ok((l, r, facts))
    }

    /// Opposite-side records matching `keys`, into `self.scratch`.
    fn collect_matches(&mut self, side: Side, keys: &IndexKeys<V>) -> Result<Vec<usize>> {
        let mut matches = std::mem::take(&mut self.scratch);
        matches.clear();
        let (_, other) = self.split(side);
        other.index.for_each(keys, |_, &record| {
            matches.push(record);
            Ok::<(), NetworkError>(())
        })?;
        Ok(matches)
    }

    fn insert_keyed(
        &mut self,
        side: Side,
        tuple: TupleId,
        keys: IndexKeys<V>,
        tuples: &mut TupleArena<V>,
    ) -> Result<()> {
        let (this, _) = self.split(side);
        let record = this.records.insert(Record { tuple, entry: 0 });
        let entry = this.index.put(&keys, record)?;
        if let Some(r) = this.records.get_mut(record) {
            r.entry = entry;
        }
        let slots = this.slots;
        tuples.set_slot(tuple, slots.record, Slot::Handle(record))?;

        let matches = self.collect_matches(side, &keys)?;
        for &other in &matches {
            let (l, r, facts) = self.pair_facts(side, record, other, tuples)?;
            if passes(LABEL, &self.filters, &facts)? {
                let out = self.queue.insert(tuples, facts);
                self.pairs.add(l, r, out);
            }
        }
        self.scratch = matches;
        tuples.set_slot(tuple, slots.keys, Slot::Keys(keys))
    }

    fn refresh_out(&mut self, out: TupleId, facts: Facts<V>, tuples: &mut TupleArena<V>) -> Result<()> {
        tuples.get_mut(out)?.facts = facts;
        self.queue.update(tuples, out)
    }

    fn retest_pairs(
        &mut self,
        side: Side,
        record: usize,
        keys: &IndexKeys<V>,
        tuples: &mut TupleArena<V>,
    ) -> Result<()> {
        let mut existing: HashMap<usize, usize> = HashMap::new();
        for &pair in self.pairs.links(side, record) {
            if let Some(p) = self.pairs.get(pair) {
                let other = match side {
                    Side::Left => p.right,
                    Side::Right => p.left,
                };
                existing.insert(other, pair);
            }
        }

        let matches = self.collect_matches(side, keys)?;
        for &other in &matches {
            let (l, r, facts) = self.pair_facts(side, record, other, tuples)?;
            let pass = passes(LABEL, &self.filters, &facts)?;
            match (existing.remove(&other), pass) {
                (Some(pair), true) => {
                    let out = self.pairs.get(pair).map(|p| p.payload);
                    if let Some(out) = out {
                        self.refresh_out(out, facts, tuples)?;
                    }
                }
                (Some(pair), false) => {
                    if let Some(p) = self.pairs.remove(pair) {
                        self.queue.retract(tuples, p.payload)?;
                    }
                }
                (None, true) => {
                    let out = self.queue.insert(tuples, facts);
                    self.pairs.add(l, r, out);
                }
                (None, false) => {}
            }
        }
        self.scratch = matches;

        for pair in existing.into_values() {
            if let Some(p) = self.pairs.remove(pair) {
                self.queue.retract(tuples, p.payload)?;
            }
        }
        Ok(())
    }

    /// Number of live pairs, for tests.
    #[cfg(test)]
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }
}

impl<V: Fact> Node<V> for JoinNode<V> {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn insert(&mut self, side: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let (this, _) = self.split(side);
        let keys = this.keys.extract(LABEL, tuples.facts(tuple)?)?;
        self.insert_keyed(side, tuple, keys, tuples)
    }

    fn update(&mut self, side: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let (this, _) = self.split(side);
        let slots = this.slots;
        let Some(record) = tuples.slot(tuple, slots.record)?.handle() else {
            return self.insert(side, tuple, tuples);
        };
        let keys = this.keys.extract(LABEL, tuples.facts(tuple)?)?;
        if tuples.slot(tuple, slots.keys)?.keys() != Some(&keys) {
            self.retract(side, tuple, tuples)?;
            return self.insert_keyed(side, tuple, keys, tuples);
        }

        if !self.filters.is_empty() {
            return self.retest_pairs(side, record, &keys, tuples);
        }
        let linked: Vec<(usize, usize, TupleId)> = self
            .pairs
            .links(side, record)
            .iter()
            .filter_map(|&pair| self.pairs.get(pair))
            .map(|p| (p.left, p.right, p.payload))
            .collect();
        for (l, r, out) in linked {
            let facts = combined(
                tuples,
                self.tuple_of(Side::Left, l)?,
                self.tuple_of(Side::Right, r)?,
            )?;
            self.refresh_out(out, facts, tuples)?;
        }
        Ok(())
    }

    fn retract(&mut self, side: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let (this, _) = self.split(side);
        let slots = this.slots;
        let Some(record) = tuples.take_slot(tuple, slots.record)?.handle() else {
            return Ok(());
        };
        let Slot::Keys(keys) = tuples.take_slot(tuple, slots.keys)? else {
            return Err(NetworkError::corrupted(format!(
                "{} tuple {:?} has a record but no keys",
                LABEL, tuple
            )));
        };
        let removed = this
            .records
            .remove(record)
            .ok_or_else(|| NetworkError::corrupted(format!("{} lost record {}", LABEL, record)))?;
        this.index.remove(&keys, removed.entry)?;
        for pair in self.pairs.remove_all(side, record) {
            self.queue.retract(tuples, pair.payload)?;
        }
        Ok(())
    }

    fn propagate(
        &mut self,
        tuples: &mut TupleArena<V>,
        changes: &mut Vec<(Change, TupleId)>,
    ) -> Result<()> {
        self.queue.propagate(tuples, changes)
    }
}
