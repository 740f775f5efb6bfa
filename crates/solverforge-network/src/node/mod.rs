//! Operators of the network and the protocol between them.
//!
//! An operator receives insert/update/retract calls for the tuples of its
//! parents, keeps its bookkeeping in the store slots reserved for it, and
//! queues changes of the tuples it owns. Queued changes reach downstream only
//! when the network propagates the operator.

mod concat;
mod exists;
mod group;
mod join;
mod map;
mod pair;
mod queue;
mod scorer;
mod source;

#[cfg(test)]
mod tests;

pub(crate) use concat::ConcatNode;
pub(crate) use exists::ExistsNode;
pub(crate) use group::{GroupNode, GroupSlots, GROUP_SLOT};
pub(crate) use join::{InputSlots, JoinNode};
pub(crate) use map::MapNode;
pub(crate) use queue::PropagationQueue;
pub(crate) use scorer::ScorerNode;
pub(crate) use source::SourceNode;

use crate::builder::StreamId;
use crate::error::Result;
use crate::fact::{Fact, Facts};
use crate::function::{guarded, FunctionRole, Predicate};
use crate::tuple::{TupleArena, TupleId};

/// Position of an operator in the network, also its propagation order.
pub(crate) type NodeIndex = usize;

/// Which input of an operator a tuple arrives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Side {
    Left,
    Right,
}

/// A settled transition of one tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Change {
    Insert,
    Update,
    Retract,
}

pub(crate) trait Node<V: Fact>: Send {
    fn label(&self) -> &'static str;

    fn insert(&mut self, side: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()>;

    /// An update of a tuple this operator never saw is an insert.
    fn update(&mut self, side: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()>;

    /// A retract of a tuple this operator never saw does nothing.
    fn retract(&mut self, side: Side, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()>;

    /// Settles the owned tuples and reports their net changes.
    fn propagate(
        &mut self,
        tuples: &mut TupleArena<V>,
        changes: &mut Vec<(Change, TupleId)>,
    ) -> Result<()>;

    fn as_source(&self) -> Option<&SourceNode> {
        None
    }

    fn as_source_mut(&mut self) -> Option<&mut SourceNode> {
        None
    }
}

/// Where an owner's settled changes go.
pub(crate) enum Lifecycle<V> {
    Node { node: NodeIndex, side: Side },
    Scorer(usize),
    /// A filter stream: forwards to `next` only while `predicate` holds.
    Conditional {
        stream: StreamId,
        predicate: Predicate<V>,
        next: Vec<Lifecycle<V>>,
    },
}

/// Left facts followed by right facts.
pub(crate) fn combined<V: Fact>(
    tuples: &TupleArena<V>,
    left: TupleId,
    right: TupleId,
) -> Result<Facts<V>> {
    let mut facts: Facts<V> = tuples.facts(left)?.iter().cloned().collect();
    facts.extend(tuples.facts(right)?.iter().cloned());
    Ok(facts)
}

/// Whether `facts` pass every filter.
pub(crate) fn passes<V: Fact>(
    operator: &'static str,
    filters: &[Predicate<V>],
    facts: &[V],
) -> Result<bool> {
    for filter in filters {
        if !guarded(operator, FunctionRole::Predicate, facts, || filter.test(facts))? {
            return Ok(false);
        }
    }
    Ok(true)
}
