use std::collections::HashMap;

use smallvec::SmallVec;

use super::{Change, Node, NodeIndex, PropagationQueue, Side};
use crate::arena::Arena;
use crate::collector::{Accumulator, Contribution, SharedCollector};
use crate::error::{NetworkError, Result};
use crate::fact::{Fact, Facts};
use crate::function::{guarded, FunctionRole, Mapping};
use crate::tuple::{Slot, TupleArena, TupleId};

const LABEL: &str = "group_by";

/// Own slot of every group output tuple: the id of its group.
pub(crate) const GROUP_SLOT: usize = 0;

/// Store slots a group-by claims on its input tuples.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GroupSlots {
    pub group: usize,
    pub contributions: usize,
}

struct Group<V> {
    key: Facts<V>,
    accumulators: Vec<Box<dyn Accumulator<V>>>,
    count: usize,
    out: Option<TupleId>,
}

/// Groups input tuples by key and folds them into one accumulator per
/// collector. Each live group owns one output tuple: its key facts followed
/// by the finished collector results.
pub(crate) struct GroupNode<V> {
    keys: Vec<Mapping<V>>,
    collectors: Vec<SharedCollector<V>>,
    slots: GroupSlots,
    groups: Arena<Group<V>>,
    by_key: HashMap<Facts<V>, usize>,
    queue: PropagationQueue,
}

impl<V: Fact> GroupNode<V> {
    pub fn new(
        owner: NodeIndex,
        keys: Vec<Mapping<V>>,
        collectors: Vec<SharedCollector<V>>,
        slots: GroupSlots,
    ) -> Self {
        Self {
            keys,
            collectors,
            slots,
            groups: Arena::new(),
            by_key: HashMap::new(),
            queue: PropagationQueue::new(owner),
        }
    }

    fn key_of(&self, facts: &[V]) -> Result<Facts<V>> {
        self.keys
            .iter()
            .map(|m| guarded(LABEL, FunctionRole::GroupKey, facts, || m.apply(facts)))
            .collect()
    }

    fn contributions_of(&self, facts: &[V]) -> Result<SmallVec<[Contribution<V>; 4]>> {
        self.collectors
            .iter()
            .map(|c| guarded(LABEL, FunctionRole::Collector, facts, || c.extract(facts)))
            .collect()
    }

    fn group_mut(&mut self, group: usize) -> Result<&mut Group<V>> {
        self.groups
            .get_mut(group)
            .ok_or_else(|| NetworkError::corrupted(format!("{} lost group {}", LABEL, group)))
    }

    fn accumulate(
        &mut self,
        group: usize,
        contributions: &[Contribution<V>],
        facts: &[V],
    ) -> Result<()> {
        let group = self.group_mut(group)?;
        for (acc, contribution) in group.accumulators.iter_mut().zip(contributions) {
            guarded(LABEL, FunctionRole::Collector, facts, || {
                acc.accumulate(contribution)
            })?;
        }
        Ok(())
    }

    fn unaccumulate(
        &mut self,
        group: usize,
        contributions: &[Contribution<V>],
        facts: &[V],
    ) -> Result<()> {
        let group = self.group_mut(group)?;
        for (acc, contribution) in group.accumulators.iter_mut().zip(contributions) {
            guarded(LABEL, FunctionRole::Collector, facts, || acc.retract(contribution))?;
        }
        Ok(())
    }

    fn insert_keyed(
        &mut self,
        tuple: TupleId,
        key: Facts<V>,
        tuples: &mut TupleArena<V>,
    ) -> Result<()> {
        let facts: Facts<V> = tuples.facts(tuple)?.iter().cloned().collect();
        let contributions = self.contributions_of(&facts)?;
        let group = match self.by_key.get(&key) {
            Some(&group) => group,
            None => {
                let accumulators = self
                    .collectors
                    .iter()
                    .map(SharedCollector::create_accumulator)
                    .collect();
                let group = self.groups.insert(Group {
                    key: key.clone(),
                    accumulators,
                    count: 0,
                    out: None,
                });
                self.by_key.insert(key.clone(), group);
                group
            }
        };
        self.accumulate(group, &contributions, &facts)?;

        let state = self.group_mut(group)?;
        state.count += 1;
        let out = state.out;
        match out {
            Some(out) => self.queue.update(tuples, out)?,
            None => {
                let out = self.queue.insert(tuples, key);
                self.group_mut(group)?.out = Some(out);
                tuples.set_slot(out, GROUP_SLOT, Slot::Handle(group))?;
            }
        }
        tuples.set_slot(tuple, self.slots.group, Slot::Handle(group))?;
        tuples.set_slot(tuple, self.slots.contributions, Slot::Contributions(contributions))
    }

    /// Number of live groups, for tests.
    #[cfg(test)]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

/// Rewrites a group output tuple as key facts plus finished results.
/// Reports whether the facts changed.
fn finish<V: Fact>(groups: &Arena<Group<V>>, tuples: &mut TupleArena<V>, out: TupleId) -> Result<bool> {
    let group = tuples
        .slot(out, GROUP_SLOT)?
        .handle()
        .and_then(|g| groups.get(g))
        .ok_or_else(|| NetworkError::corrupted(format!("{} output {:?} has no group", LABEL, out)))?;
    let mut facts = group.key.clone();
    for acc in &group.accumulators {
        facts.push(guarded(LABEL, FunctionRole::Collector, &group.key, || acc.finish())?);
    }
    let tuple = tuples.get_mut(out)?;
    if tuple.facts == facts {
        return Ok(false);
    }
    tuple.facts = facts;
    Ok(true)
}

impl<V: Fact> Node<V> for GroupNode<V> {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn insert(&mut self, _: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let key = self.key_of(tuples.facts(tuple)?)?;
        self.insert_keyed(tuple, key, tuples)
    }

    fn update(&mut self, side: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let Some(group) = tuples.slot(tuple, self.slots.group)?.handle() else {
            return self.insert(side, tuple, tuples);
        };
        let facts: Facts<V> = tuples.facts(tuple)?.iter().cloned().collect();
        let key = self.key_of(&facts)?;
        if self.group_mut(group)?.key != key {
            self.retract(side, tuple, tuples)?;
            return self.insert_keyed(tuple, key, tuples);
        }

        let Slot::Contributions(old) = tuples.take_slot(tuple, self.slots.contributions)? else {
            return Err(NetworkError::corrupted(format!(
                "{} input {:?} has no contributions",
                LABEL, tuple
            )));
        };
        self.unaccumulate(group, &old, &facts)?;
        let contributions = self.contributions_of(&facts)?;
        self.accumulate(group, &contributions, &facts)?;
        tuples.set_slot(tuple, self.slots.contributions, Slot::Contributions(contributions))?;
        let out = self.group_mut(group)?.out;
        match out {
            Some(out) => self.queue.update(tuples, out),
            None => Ok(()),
        }
    }

    fn retract(&mut self, _: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let Some(group) = tuples.take_slot(tuple, self.slots.group)?.handle() else {
            return Ok(());
        };
        let Slot::Contributions(old) = tuples.take_slot(tuple, self.slots.contributions)? else {
            return Err(NetworkError::corrupted(format!(
                "{} input {:?} has no contributions",
                LABEL, tuple
            )));
        };
        let facts: Facts<V> = tuples.facts(tuple)?.iter().cloned().collect();
        self.unaccumulate(group, &old, &facts)?;

        let state = self.group_mut(group)?;
        state.count = state.count.saturating_sub(1);
        let (count, out) = (state.count, state.out);
        if count > 0 {
            return match out {
                Some(out) => self.queue.update(tuples, out),
                None => Ok(()),
            };
        }
        let Some(removed) = self.groups.remove(group) else {
            return Ok(());
        };
        self.by_key.remove(&removed.key);
        match removed.out {
            Some(out) => self.queue.retract(tuples, out),
            None => Ok(()),
        }
    }

    fn propagate(
        &mut self,
        tuples: &mut TupleArena<V>,
        changes: &mut Vec<(Change, TupleId)>,
    ) -> Result<()> {
        let groups = &self.groups;
        self.queue
            .propagate_with(tuples, changes, |tuples, out| finish(groups, tuples, out))
    }
}
