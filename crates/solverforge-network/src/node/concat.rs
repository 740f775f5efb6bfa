use super::{Change, Node, NodeIndex, PropagationQueue, Side};
use crate::error::Result;
use crate::fact::{Fact, Facts};
use crate::function::{guarded, FunctionRole, Mapping};
use crate::tuple::{Slot, TupleArena, TupleId};

/// Union of two streams.
///
/// Each input tuple gets its own output tuple, so a tuple arriving on both
/// sides is emitted twice and retracting one side leaves the other's copy
/// alone. Tuples of the shorter side are padded up to the longer arity.
pub(crate) struct ConcatNode<V> {
    left_slot: usize,
    right_slot: usize,
    left_padding: Vec<Mapping<V>>,
    right_padding: Vec<Mapping<V>>,
    queue: PropagationQueue,
}

impl<V: Fact> ConcatNode<V> {
    pub fn new(
        owner: NodeIndex,
        (left_slot, left_padding): (usize, Vec<Mapping<V>>),
        (right_slot, right_padding): (usize, Vec<Mapping<V>>),
    ) -> Self {
        Self {
            left_slot,
            right_slot,
            left_padding,
            right_padding,
            queue: PropagationQueue::new(owner),
        }
    }

    fn side(&self, side: Side) -> (usize, &[Mapping<V>]) {
        match side {
            Side::Left => (self.left_slot, self.left_padding.as_slice()),
            Side::Right => (self.right_slot, self.right_padding.as_slice()),
        }
    }

    fn project(&self, side: Side, tuples: &TupleArena<V>, tuple: TupleId) -> Result<Facts<V>> {
        let facts = tuples.facts(tuple)?;
        let mut out: Facts<V> = facts.iter().cloned().collect();
        for padding in self.side(side).1 {
            out.push(guarded("concat", FunctionRole::Padding, facts, || {
                padding.apply(facts)
            })?);
        }
        Ok(out)
    }
}

impl<V: Fact> Node<V> for ConcatNode<V> {
    fn label(&self) -> &'static str {
        "concat"
    }

    fn insert(&mut self, side: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let facts = self.project(side, tuples, tuple)?;
        let out = self.queue.insert(tuples, facts);
        tuples.set_slot(tuple, self.side(side).0, Slot::Link(out))
    }

    fn update(&mut self, side: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let Some(out) = tuples.slot(tuple, self.side(side).0)?.link() else {
            return self.insert(side, tuple, tuples);
        };
        let facts = self.project(side, tuples, tuple)?;
        if tuples.facts(out)? != facts.as_slice() {
            tuples.get_mut(out)?.facts = facts;
            self.queue.update(tuples, out)?;
        }
        Ok(())
    }

    fn retract(&mut self, side: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let slot = self.side(side).0;
        match tuples.take_slot(tuple, slot)?.link() {
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
