use super::join::InputSlots;
use super::pair::PairTable;
use super::{combined, passes, Change, Node, NodeIndex, PropagationQueue, Side};
use crate::arena::Arena;
use crate::error::{NetworkError, Result};
use crate::fact::{Fact, Facts};
use crate::function::Predicate;
use crate::index::{EntryId, IndexKeys, Indexer, IndexerFactory, KeyExtractor};
use crate::joiner::Joiners;
use crate::tuple::{Slot, TupleArena, TupleId};

struct LeftRecord {
    tuple: TupleId,
    entry: EntryId,
    count: usize,
    out: Option<TupleId>,
}

struct RightRecord {
    tuple: TupleId,
    entry: EntryId,
}

/// Semi-join: a left tuple is passed on, as a copy of its facts, exactly
/// while the existence of matching right tuples equals `should_exist`.
///
/// Without filtering joiners a left tuple only counts its matches. With
/// them, every passing (left, right) pair is tracked so a right tuple can be
/// withdrawn from exactly the left tuples it counted for.
pub(crate) struct ExistsNode<V> {
    should_exist: bool,
    left_slots: InputSlots,
    right_slots: InputSlots,
    left_keys: KeyExtractor<V>,
    right_keys: KeyExtractor<V>,
    left_index: Indexer<V, usize>,
    right_index: Indexer<V, usize>,
    lefts: Arena<LeftRecord>,
    rights: Arena<RightRecord>,
    filters: Vec<Predicate<V>>,
    trackers: PairTable<()>,
    queue: PropagationQueue,
    scratch: Vec<usize>,
}

impl<V: Fact> ExistsNode<V> {
    pub fn new(
        owner: NodeIndex,
        should_exist: bool,
        joiners: &Joiners<V>,
        left_slots: InputSlots,
        right_slots: InputSlots,
    ) -> Self {
        let factory = IndexerFactory::new(joiners.conditions());
        Self {
            should_exist,
            left_slots,
            right_slots,
            left_keys: factory.left_keys().clone(),
            right_keys: factory.right_keys().clone(),
            left_index: factory.left_indexer(),
            right_index: factory.right_indexer(),
            lefts: Arena::new(),
            rights: Arena::new(),
            filters: joiners.filters().to_vec(),
            trackers: PairTable::new(),
            queue: PropagationQueue::new(owner),
            scratch: Vec::new(),
        }
    }

    fn operator(&self) -> &'static str {
        if self.should_exist {
            "if_exists"
        } else {
            "if_not_exists"
        }
    }

    fn lost(&self, what: &str, record: usize) -> NetworkError {
        NetworkError::corrupted(format!("{} lost {} record {}", self.operator(), what, record))
    }

    fn left_tuple(&self, record: usize) -> Result<TupleId> {
        self.lefts
            .get(record)
            .map(|r| r.tuple)
            .ok_or_else(|| self.lost("left", record))
    }

    fn right_tuple(&self, record: usize) -> Result<TupleId> {
        self.rights
            .get(record)
            .map(|r| r.tuple)
            .ok_or_else(|| self.lost("right", record))
    }

    /// Whether the pair passes the filtering joiners.
    fn pair_passes(&self, left: usize, right: usize, tuples: &TupleArena<V>) -> Result<bool> {
        let facts = combined(tuples, self.left_tuple(left)?, self.right_tuple(right)?)?;
        passes(self.operator(), &self.filters, &facts)
    }

    /// Appends the records of `side` matching a query with `keys` from the
    /// other side.
    fn matching(&self, side: Side, keys: &IndexKeys<V>, found: &mut Vec<usize>) -> Result<()> {
        let index = match side {
            Side::Left => &self.left_index,
            Side::Right => &self.right_index,
        };
        index.for_each(keys, |_, &record| {
            found.push(record);
            Ok::<(), NetworkError>(())
        })
    }

    /// Counts the right tuples `left` currently matches, tracking pairs when
    /// filtering.
    fn count_matches(
        &mut self,
        left: usize,
        keys: &IndexKeys<V>,
        tuples: &TupleArena<V>,
    ) -> Result<usize> {
        if self.filters.is_empty() {
            return Ok(self.right_index.size(keys)?);
        }
        let mut rights = std::mem::take(&mut self.scratch);
        rights.clear();
        self.matching(Side::Right, keys, &mut rights)?;
        let mut count = 0;
        for &right in &rights {
            if self.pair_passes(left, right, tuples)? {
                self.trackers.add(left, right, ());
                count += 1;
            }
        }
        self.scratch = rights;
        Ok(count)
    }

    /// Brings the output of `left` in line with its count: inserted or
    /// retracted on a boundary crossing, otherwise left alone.
    fn reconcile(&mut self, left: usize, tuples: &mut TupleArena<V>) -> Result<()> {
        let should_exist = self.should_exist;
        let Some(record) = self.lefts.get_mut(left) else {
            return Err(self.lost("left", left));
        };
        let propagate = (record.count > 0) == should_exist;
        match (propagate, record.out) {
            (true, None) => {
                let facts: Facts<V> = tuples.facts(record.tuple)?.iter().cloned().collect();
                record.out = Some(self.queue.insert(tuples, facts));
            }
            (false, Some(out)) => {
                record.out = None;
                self.queue.retract(tuples, out)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Moves the count of `left` without touching its output.
    fn bump(&mut self, left: usize, up: bool) -> Result<()> {
        let Some(record) = self.lefts.get_mut(left) else {
            return Err(self.lost("left", left));
        };
        record.count = if up {
            record.count + 1
        } else {
            record.count.saturating_sub(1)
        };
        Ok(())
    }

    fn insert_left(&mut self, tuple: TupleId, keys: IndexKeys<V>, tuples: &mut TupleArena<V>) -> Result<()> {
        let record = self.lefts.insert(LeftRecord {
            tuple,
            entry: 0,
            count: 0,
            out: None,
        });
        let entry = self.left_index.put(&keys, record)?;
        let count = self.count_matches(record, &keys, tuples)?;
        if let Some(r) = self.lefts.get_mut(record) {
            r.entry = entry;
            r.count = count;
        }
        tuples.set_slot(tuple, self.left_slots.record, Slot::Handle(record))?;
        tuples.set_slot(tuple, self.left_slots.keys, Slot::Keys(keys))?;
        self.reconcile(record, tuples)
    }

    fn insert_right(&mut self, tuple: TupleId, keys: IndexKeys<V>, tuples: &mut TupleArena<V>) -> Result<()> {
        let record = self.rights.insert(RightRecord { tuple, entry: 0 });
        let entry = self.right_index.put(&keys, record)?;
        if let Some(r) = self.rights.get_mut(record) {
            r.entry = entry;
        }
        tuples.set_slot(tuple, self.right_slots.record, Slot::Handle(record))?;
        let mut touched = std::mem::take(&mut self.scratch);
        touched.clear();
        self.count_right(record, &keys, &mut touched, tuples)?;
        for &left in &touched {
            self.reconcile(left, tuples)?;
        }
        self.scratch = touched;
        tuples.set_slot(tuple, self.right_slots.keys, Slot::Keys(keys))
    }

    /// Counts `right` for every left tuple it matches under `keys`, appending
    /// the lefts it was counted for to `touched`.
    fn count_right(
        &mut self,
        right: usize,
        keys: &IndexKeys<V>,
        touched: &mut Vec<usize>,
        tuples: &TupleArena<V>,
    ) -> Result<()> {
        let start = touched.len();
        self.matching(Side::Left, keys, touched)?;
        let mut kept = start;
        for i in start..touched.len() {
            let left = touched[i];
            if !self.filters.is_empty() {
                if !self.pair_passes(left, right, tuples)? {
                    continue;
                }
                self.trackers.add(left, right, ());
            }
            self.bump(left, true)?;
            touched[kept] = left;
            kept += 1;
        }
        touched.truncate(kept);
        Ok(())
    }

    /// Takes `right`, stored under `keys`, out of the count of every left
    /// tuple it counted for, appending those lefts to `touched`.
    fn withdraw_right(&mut self, right: usize, keys: &IndexKeys<V>, touched: &mut Vec<usize>) -> Result<()> {
        let start = touched.len();
        if self.filters.is_empty() {
            self.matching(Side::Left, keys, touched)?;
        } else {
            touched.extend(
                self.trackers
                    .remove_all(Side::Right, right)
                    .into_iter()
                    .map(|tracker| tracker.left),
            );
        }
        for i in start..touched.len() {
            self.bump(touched[i], false)?;
        }
        Ok(())
    }

    fn retract_left(&mut self, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let Some(record) = tuples.take_slot(tuple, self.left_slots.record)?.handle() else {
            return Ok(());
        };
        let Slot::Keys(keys) = tuples.take_slot(tuple, self.left_slots.keys)? else {
            return Err(self.lost("left keys of", record));
        };
        let removed = self
            .lefts
            .remove(record)
            .ok_or_else(|| self.lost("left", record))?;
        self.left_index.remove(&keys, removed.entry)?;
        self.trackers.remove_all(Side::Left, record);
        match removed.out {
            Some(out) => self.queue.retract(tuples, out),
            None => Ok(()),
        }
    }

    fn retract_right(&mut self, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let Some(record) = tuples.take_slot(tuple, self.right_slots.record)?.handle() else {
            return Ok(());
        };
        let Slot::Keys(keys) = tuples.take_slot(tuple, self.right_slots.keys)? else {
            return Err(self.lost("right keys of", record));
        };
        let removed = self
            .rights
            .remove(record)
            .ok_or_else(|| self.lost("right", record))?;
        self.right_index.remove(&keys, removed.entry)?;
        let mut touched = std::mem::take(&mut self.scratch);
        touched.clear();
        self.withdraw_right(record, &keys, &mut touched)?;
        for &left in &touched {
            self.reconcile(left, tuples)?;
        }
        self.scratch = touched;
        Ok(())
    }

    /// Re-keys and recounts a known left tuple, keeping its record and
    /// output. The output is updated in place unless the count crossed the
    /// existence boundary.
    fn update_left(
        &mut self,
        record: usize,
        tuple: TupleId,
        keys: IndexKeys<V>,
        tuples: &mut TupleArena<V>,
    ) -> Result<()> {
        let rekeyed = tuples.slot(tuple, self.left_slots.keys)?.keys() != Some(&keys);
        if rekeyed {
            let Slot::Keys(old) = tuples.take_slot(tuple, self.left_slots.keys)? else {
                return Err(self.lost("left keys of", record));
            };
            let entry = self.lefts.get(record).map(|r| r.entry).ok_or_else(|| self.lost("left", record))?;
            self.left_index.remove(&old, entry)?;
            let entry = self.left_index.put(&keys, record)?;
            if let Some(r) = self.lefts.get_mut(record) {
                r.entry = entry;
            }
        }
        if rekeyed || !self.filters.is_empty() {
            self.trackers.remove_all(Side::Left, record);
            let count = self.count_matches(record, &keys, tuples)?;
            if let Some(r) = self.lefts.get_mut(record) {
                r.count = count;
            }
        }
        if rekeyed {
            tuples.set_slot(tuple, self.left_slots.keys, Slot::Keys(keys))?;
        }

        let before = self.lefts.get(record).and_then(|r| r.out);
        self.reconcile(record, tuples)?;
        let after = self.lefts.get(record).and_then(|r| r.out);
        match (before, after) {
            (Some(before), Some(out)) if before == out => {
                let facts: Facts<V> = tuples.facts(tuple)?.iter().cloned().collect();
                tuples.get_mut(out)?.facts = facts;
                self.queue.update(tuples, out)
            }
            _ => Ok(()),
        }
    }

    /// Re-keys and recounts a known right tuple. Every affected left is
    /// reconciled once, after both the withdrawal and the recount.
    fn update_right(
        &mut self,
        record: usize,
        tuple: TupleId,
        keys: IndexKeys<V>,
        tuples: &mut TupleArena<V>,
    ) -> Result<()> {
        let rekeyed = tuples.slot(tuple, self.right_slots.keys)?.keys() != Some(&keys);
        if !rekeyed && self.filters.is_empty() {
            return Ok(());
        }
        let Slot::Keys(old) = tuples.take_slot(tuple, self.right_slots.keys)? else {
            return Err(self.lost("right keys of", record));
        };
        let mut touched = std::mem::take(&mut self.scratch);
        touched.clear();
        self.withdraw_right(record, &old, &mut touched)?;
        if rekeyed {
            let entry = self.rights.get(record).map(|r| r.entry).ok_or_else(|| self.lost("right", record))?;
            self.right_index.remove(&old, entry)?;
            let entry = self.right_index.put(&keys, record)?;
            if let Some(r) = self.rights.get_mut(record) {
                r.entry = entry;
            }
        }
        self.count_right(record, &keys, &mut touched, tuples)?;
        for &left in &touched {
            self.reconcile(left, tuples)?;
        }
        self.scratch = touched;
        tuples.set_slot(tuple, self.right_slots.keys, Slot::Keys(keys))
    }

    #[cfg(test)]
    pub fn count_of(&self, tuple: TupleId) -> Option<usize> {
        self.lefts.iter().find(|(_, r)| r.tuple == tuple).map(|(_, r)| r.count)
    }
}

impl<V: Fact> Node<V> for ExistsNode<V> {
    fn label(&self) -> &'static str {
        self.operator()
    }

    fn insert(&mut self, side: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let operator = self.operator();
        match side {
            Side::Left => {
                let keys = self.left_keys.extract(operator, tuples.facts(tuple)?)?;
                self.insert_left(tuple, keys, tuples)
            }
            Side::Right => {
                let keys = self.right_keys.extract(operator, tuples.facts(tuple)?)?;
                self.insert_right(tuple, keys, tuples)
            }
        }
    }

    fn update(&mut self, side: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let operator = self.operator();
        let (slots, extractor) = match side {
            Side::Left => (self.left_slots, &self.left_keys),
            Side::Right => (self.right_slots, &self.right_keys),
        };
        let Some(record) = tuples.slot(tuple, slots.record)?.handle() else {
            return self.insert(side, tuple, tuples);
        };
        let keys = extractor.extract(operator, tuples.facts(tuple)?)?;
        match side {
            Side::Left => self.update_left(record, tuple, keys, tuples),
            Side::Right => self.update_right(record, tuple, keys, tuples),
        }
    }

    fn retract(&mut self, side: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        match side {
            Side::Left => self.retract_left(tuple, tuples),
            Side::Right => self.retract_right(tuple, tuples),
        }
    }

    fn propagate(
        &mut self,
        tuples: &mut TupleArena<V>,
        changes: &mut Vec<(Change, TupleId)>,
    ) -> Result<()> {
        self.queue.propagate(tuples, changes)
    }
}
