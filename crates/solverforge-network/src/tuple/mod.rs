//! Tuples, their lifecycle state and their fixed-size stores.
//!
//! Every tuple is owned by the operator that created it. Other operators
//! reach their bookkeeping for a tuple through the store slots reserved for
//! them when the network was built; the store never grows afterwards.

mod store;


pub(crate) use store::StoreLayout;

use smallvec::SmallVec;

use crate::collector::Contribution;
use crate::error::{NetworkError, Result};
use crate::fact::{Fact, Facts};
use crate::index::IndexKeys;
use crate::node::NodeIndex;

/// Generation-checked handle to a tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TupleId {
    index: u32,
    generation: u32,
}

/// Lifecycle of a tuple.
///
/// `Creating -> Ok -> Updating -> Ok -> Dying -> Dead`; a tuple retracted
/// while still `Creating` becomes `Aborting` and dies without ever being
/// seen downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleState {
    Creating,
    Ok,
    Updating,
    Dying,
    Aborting,
    Dead,
}

impl TupleState {
    /// Not retracted yet.
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            TupleState::Creating | TupleState::Ok | TupleState::Updating
        )
    }

    /// Waiting in its owner's dirty queue.
    #[inline]
    pub fn is_dirty(self) -> bool {
        !matches!(self, TupleState::Ok | TupleState::Dead)
    }
}

/// One store slot.
#[derive(Debug, Clone, Default)]
pub(crate) enum Slot<V> {
    #[default]
    Empty,
    /// Cached index key of the tuple on one operator side.
    Keys(IndexKeys<V>),
    /// Id of an operator-private record.
    Handle(usize),
    /// Output tuple derived from this tuple.
    Link(TupleId),
    /// Undo tokens of a group accumulation, one per collector.
    Contributions(SmallVec<[Contribution<V>; 4]>),
}

impl<V> Slot<V> {
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    #[inline]
    pub fn handle(&self) -> Option<usize> {
        match self {
            Slot::Handle(id) => Some(*id),
            _ => None,
        }
    }

    #[inline]
    pub fn link(&self) -> Option<TupleId> {
        match self {
            Slot::Link(id) => Some(*id),
            _ => None,
        }
    }

    #[inline]
    pub fn keys(&self) -> Option<&IndexKeys<V>> {
        match self {
            Slot::Keys(keys) => Some(keys),
            _ => None,
        }
    }
}

pub(crate) struct Tuple<V> {
    pub facts: Facts<V>,
    pub state: TupleState,
    pub owner: NodeIndex,
    store: Box<[Slot<V>]>,
}

impl<V> Tuple<V> {
    #[cfg(test)]
    pub fn arity(&self) -> usize {
        self.facts.len()
    }
}

struct Entry<V> {
    generation: u32,
    tuple: Option<Tuple<V>>,
}

/// All tuples of one network.
pub(crate) struct TupleArena<V> {
    entries: Vec<Entry<V>>,
    free: Vec<u32>,
    store_sizes: Vec<usize>,
    live: usize,
}

impl<V: Fact> TupleArena<V> {
    /// `store_sizes[owner]` is the store length of tuples created by `owner`.
    pub fn new(store_sizes: Vec<usize>, capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            free: Vec::new(),
            store_sizes,
            live: 0,
        }
    }

    /// Creates a tuple in state `Creating`.
    pub fn create(&mut self, owner: NodeIndex, facts: Facts<V>) -> TupleId {
        let store = vec![Slot::Empty; self.store_sizes[owner]].into_boxed_slice();
        let tuple = Tuple {
            facts,
            state: TupleState::Creating,
            owner,
            store,
        };
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                let entry = &mut self.entries[index as usize];
                entry.tuple = Some(tuple);
                TupleId {
                    index,
                    generation: entry.generation,
                }
            }
            None => {
                let index = self.entries.len() as u32;
                self.entries.push(Entry {
                    generation: 0,
                    tuple: Some(tuple),
                });
                TupleId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    pub fn free(&mut self, id: TupleId) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id.index as usize)
            .filter(|entry| entry.generation == id.generation && entry.tuple.is_some())
            .ok_or_else(|| NetworkError::corrupted(format!("freeing unknown tuple {:?}", id)))?;
        entry.tuple = None;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Ok(())
    }

    #[cfg(test)]
    pub fn contains(&self, id: TupleId) -> bool {
        self.lookup(id).is_some()
    }

    #[inline]
    fn lookup(&self, id: TupleId) -> Option<&Tuple<V>> {
        self.entries
            .get(id.index as usize)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.tuple.as_ref())
    }

    #[inline]
    pub fn get(&self, id: TupleId) -> Result<&Tuple<V>> {
        self.lookup(id)
            .ok_or_else(|| NetworkError::corrupted(format!("tuple {:?} is gone", id)))
    }

    #[inline]
    pub fn get_mut(&mut self, id: TupleId) -> Result<&mut Tuple<V>> {
        self.entries
            .get_mut(id.index as usize)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.tuple.as_mut())
            .ok_or_else(|| NetworkError::corrupted(format!("tuple {:?} is gone", id)))
    }

    #[inline]
    pub fn facts(&self, id: TupleId) -> Result<&[V]> {
        Ok(&self.get(id)?.facts)
    }

    #[inline]
    pub fn state(&self, id: TupleId) -> Result<TupleState> {
        Ok(self.get(id)?.state)
    }

    #[inline]
    pub fn set_state(&mut self, id: TupleId, state: TupleState) -> Result<()> {
        self.get_mut(id)?.state = state;
        Ok(())
    }

    /// Reads slot `index`.
    ///
    /// # Panics
    /// Panics when `index` was never reserved for the tuple's owner.
    #[inline]
    pub fn slot(&self, id: TupleId, index: usize) -> Result<&Slot<V>> {
        Ok(&self.get(id)?.store[index])
    }

    #[inline]
    pub fn set_slot(&mut self, id: TupleId, index: usize, slot: Slot<V>) -> Result<()> {
        self.get_mut(id)?.store[index] = slot;
        Ok(())
    }

    /// Empties slot `index`, returning what it held.
    #[inline]
    pub fn take_slot(&mut self, id: TupleId, index: usize) -> Result<Slot<V>> {
        Ok(std::mem::take(&mut self.get_mut(id)?.store[index]))
    }

    /// Number of tuples not yet freed.
    #[inline]
    pub fn live(&self) -> usize {
        self.live
    }

    /// Tuples created by `owner`, in slot order.
    pub fn owned_by(&self, owner: NodeIndex) -> impl Iterator<Item = (TupleId, &Tuple<V>)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(move |(index, entry)| {
                let tuple = entry.tuple.as_ref().filter(|t| t.owner == owner)?;
                Some((
                    TupleId {
                        index: index as u32,
                        generation: entry.generation,
                    },
                    tuple,
                ))
            })
    }
}
