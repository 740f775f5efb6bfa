//! Entry point of fact changes.

use smallvec::smallvec;

use super::{Change, Node, NodeIndex, PropagationQueue, Side};
use crate::error::{NetworkError, Result};
use crate::fact::Fact;
use crate::tuple::{TupleArena, TupleId, TupleState};

/// Owns one arity-1 tuple per live fact of a source.
pub(crate) struct SourceNode {
    name: String,
    queue: PropagationQueue,
}

impl SourceNode {
    pub fn new(owner: NodeIndex, name: String) -> Self {
        Self {
            name,
            queue: PropagationQueue::new(owner),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> NodeIndex {
        self.queue.owner()
    }

    /// Whether `tuple` is a live fact of this source.
    pub fn owns<V: Fact>(&self, tuples: &TupleArena<V>, tuple: TupleId) -> bool {
        tuples
            .get(tuple)
            .map(|t| t.owner == self.owner() && t.state.is_active())
            .unwrap_or(false)
    }

    pub fn insert_fact<V: Fact>(&mut self, tuples: &mut TupleArena<V>, fact: V) -> TupleId {
        self.queue.insert(tuples, smallvec![fact])
    }

    pub fn update_fact<V: Fact>(
        &mut self,
        tuples: &mut TupleArena<V>,
        tuple: TupleId,
        fact: V,
    ) -> Result<()> {
        tuples.get_mut(tuple)?.facts = smallvec![fact];
        self.queue.update(tuples, tuple)
    }

    pub fn retract_fact<V: Fact>(&mut self, tuples: &mut TupleArena<V>, tuple: TupleId) -> Result<()> {
        self.queue.retract(tuples, tuple)
    }

    /// Facts of every settled tuple, in tuple order.
    pub fn live_facts<V: Fact>(&self, tuples: &TupleArena<V>) -> Vec<V> {
        tuples
            .owned_by(self.owner())
            .filter(|(_, t)| t.state == TupleState::Ok)
            .filter_map(|(_, t)| t.facts.first().cloned())
            .collect()
    }
}

impl<V: Fact> Node<V> for SourceNode {
    fn label(&self) -> &'static str {
        "source"
    }

    fn insert(&mut self, _: Side, tuple: TupleId, _: &mut TupleArena<V>) -> Result<()> {
        Err(NetworkError::corrupted(format!(
            "source '{}' received tuple {:?}",
            self.name, tuple
        )))
    }

    fn update(&mut self, side: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        self.insert(side, tuple, tuples)
    }

    fn retract(&mut self, side: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        self.insert(side, tuple, tuples)
    }

    fn propagate(
        &mut self,
        tuples: &mut TupleArena<V>,
        changes: &mut Vec<(Change, TupleId)>,
    ) -> Result<()> {
        self.queue.propagate(tuples, changes)
    }

    fn as_source(&self) -> Option<&SourceNode> {
        Some(self)
    }

    fn as_source_mut(&mut self) -> Option<&mut SourceNode> {
        Some(self)
    }
}
