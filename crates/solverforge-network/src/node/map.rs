use super::{Change, Node, NodeIndex, PropagationQueue, Side};
use crate::error::Result;
use crate::fact::{Fact, Facts};
use crate::function::{guarded, FunctionRole, Mapping};
use crate::tuple::{Slot, TupleArena, TupleId};

/// Re-projects each input tuple into a new tuple of 1 to 4 mapped facts.
///
/// Different inputs may map to equal outputs; every input keeps its own
/// output tuple.
pub(crate) struct MapNode<V> {
    mappings: Vec<Mapping<V>>,
    slot: usize,
    queue: PropagationQueue,
}

impl<V: Fact> MapNode<V> {
    pub fn new(owner: NodeIndex, mappings: Vec<Mapping<V>>, slot: usize) -> Self {
        Self {
            mappings,
            slot,
            queue: PropagationQueue::new(owner),
        }
    }

    fn project(&self, tuples: &TupleArena<V>, tuple: TupleId) -> Result<Facts<V>> {
        let facts = tuples.facts(tuple)?;
        self.mappings
            .iter()
            .map(|m| guarded("map", FunctionRole::Mapping, facts, || m.apply(facts)))
            .collect()
    }
}

impl<V: Fact> Node<V> for MapNode<V> {
    fn label(&self) -> &'static str {
        "map"
    }

    fn insert(&mut self, _: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let facts = self.project(tuples, tuple)?;
        let out = self.queue.insert(tuples, facts);
        tuples.set_slot(tuple, self.slot, Slot::Link(out))
    }

    fn update(&mut self, side: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let Some(out) = tuples.slot(tuple, self.slot)?.link() else {
            return self.insert(side, tuple, tuples);
        };
        let facts = self.project(tuples, tuple)?;
        if tuples.facts(out)? != facts.as_slice() {
            tuples.get_mut(out)?.facts = facts;
            self.queue.update(tuples, out)?;
        }
        Ok(())
    }

    fn retract(&mut self, _: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        match tuples.take_slot(tuple, self.slot)?.link() {
            Some(out) => self.queue.retract(tuples, out),
            None => Ok(()),
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
