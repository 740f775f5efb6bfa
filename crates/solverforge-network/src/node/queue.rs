//! Per-owner dirty queue.

use crate::error::{NetworkError, Result};
use crate::fact::{Fact, Facts};
use crate::tuple::{TupleArena, TupleId, TupleState};

use super::{Change, NodeIndex};

/// Batches the changes of the tuples one operator owns until the next
/// propagation, so downstream sees at most one transition per tuple.
pub(crate) struct PropagationQueue {
    owner: NodeIndex,
    dirty: Vec<TupleId>,
}

impl PropagationQueue {
    pub fn new(owner: NodeIndex) -> Self {
        Self {
            owner,
            dirty: Vec::new(),
        }
    }

    pub fn owner(&self) -> NodeIndex {
        self.owner
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }

    /// Creates a tuple in state `Creating` and queues it.
    pub fn insert<V: Fact>(&mut self, tuples: &mut TupleArena<V>, facts: Facts<V>) -> TupleId {
        let id = tuples.create(self.owner, facts);
        self.dirty.push(id);
        id
    }

    pub fn update<V: Fact>(&mut self, tuples: &mut TupleArena<V>, id: TupleId) -> Result<()> {
        match tuples.state(id)? {
            TupleState::Ok => {
                tuples.set_state(id, TupleState::Updating)?;
                self.dirty.push(id);
                Ok(())
            }
            TupleState::Creating | TupleState::Updating => Ok(()),
            state => Err(NetworkError::corrupted(format!(
                "update of tuple {:?} in state {:?}",
                id, state
            ))),
        }
    }

    pub fn retract<V: Fact>(&mut self, tuples: &mut TupleArena<V>, id: TupleId) -> Result<()> {
        match tuples.state(id)? {
            TupleState::Creating => tuples.set_state(id, TupleState::Aborting),
            TupleState::Ok => {
                tuples.set_state(id, TupleState::Dying)?;
                self.dirty.push(id);
                Ok(())
            }
            TupleState::Updating => tuples.set_state(id, TupleState::Dying),
            state => Err(NetworkError::corrupted(format!(
                "retract of tuple {:?} in state {:?}",
                id, state
            ))),
        }
    }

    /// Settles every queued tuple and reports the net changes in three
    /// passes: retracts, then updates, then inserts, each in first-seen order.
    ///
    /// `refresh` runs right before an update or insert is reported and may
    /// rewrite the tuple's facts; an update it returns `false` for is dropped.
    /// Aborted tuples are freed here. Retracted tuples end up `Dead` and are
    /// freed by the caller once downstream has seen the retract.
    pub fn propagate_with<V, F>(
        &mut self,
        tuples: &mut TupleArena<V>,
        changes: &mut Vec<(Change, TupleId)>,
        mut refresh: F,
    ) -> Result<()>
    where
        V: Fact,
        F: FnMut(&mut TupleArena<V>, TupleId) -> Result<bool>,
    {
        let dirty = std::mem::take(&mut self.dirty);
        let mut pending = Vec::with_capacity(dirty.len());
        for id in dirty {
            match tuples.state(id)? {
                TupleState::Dying => {
                    tuples.set_state(id, TupleState::Dead)?;
                    changes.push((Change::Retract, id));
                }
                TupleState::Aborting => tuples.free(id)?,
                _ => pending.push(id),
            }
        }
        for &id in &pending {
            if tuples.state(id)? == TupleState::Updating {
                tuples.set_state(id, TupleState::Ok)?;
                if refresh(tuples, id)? {
                    changes.push((Change::Update, id));
                }
            }
        }
        for &id in &pending {
            if tuples.state(id)? == TupleState::Creating {
                refresh(tuples, id)?;
                tuples.set_state(id, TupleState::Ok)?;
                changes.push((Change::Insert, id));
            }
        }
        Ok(())
    }

    pub fn propagate<V: Fact>(
        &mut self,
        tuples: &mut TupleArena<V>,
        changes: &mut Vec<(Change, TupleId)>,
    ) -> Result<()> {
        self.propagate_with(tuples, changes, |_, _| Ok(true))
    }
}
