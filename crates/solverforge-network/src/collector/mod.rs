// Collectors for group-by operators.
//
// A collector extracts one contribution per source tuple and folds it into
// an accumulator. The contribution is the undo token: it is kept in the
// source tuple's store and handed back to `retract` exactly once.

mod count;
mod multiset;
mod sum;


use std::fmt;
use std::sync::Arc;

use crate::function::FunctionId;

pub use count::count;
pub use multiset::{count_distinct, max, min, to_list, to_set};
pub use sum::{average, sum};

// What one source tuple added to an accumulator.
#[derive(Debug, Clone, PartialEq)]
pub enum Contribution<V> {
    Unit,
    Int(i64),
    Fact(V),
}

// Extracts contributions and supplies fresh accumulators.
pub trait Collector<V>: Send + Sync {
    fn extract(&self, facts: &[V]) -> Contribution<V>;

    fn create_accumulator(&self) -> Box<dyn Accumulator<V>>;
}

// Mutable aggregation state of one group.
//
// `retract` receives a contribution previously passed to `accumulate`; once
// every contribution is retracted the accumulator is back in its initial
// state.
pub trait Accumulator<V>: Send {
    fn accumulate(&mut self, contribution: &Contribution<V>);

    fn retract(&mut self, contribution: &Contribution<V>);

    fn finish(&self) -> V;
}

// Identity of a collector for interning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectorId {
    pub kind: &'static str,
    pub input: Option<FunctionId>,
}

// A collector as handed to `group_by`, cloneable and carrying its identity.
pub struct SharedCollector<V> {
    id: CollectorId,
    collector: Arc<dyn Collector<V>>,
}

impl<V> SharedCollector<V> {
    // Wraps a user-defined collector under a fresh identity.
    pub fn new(collector: impl Collector<V> + 'static) -> Self {
        Self {
            id: CollectorId {
                kind: "custom",
                input: Some(FunctionId::fresh()),
            },
            collector: Arc::new(collector),
        }
    }

    pub(crate) fn with_id(
        kind: &'static str,
        input: Option<FunctionId>,
        collector: impl Collector<V> + 'static,
    ) -> Self {
        Self {
            id: CollectorId { kind, input },
            collector: Arc::new(collector),
        }
    }

    pub fn id(&self) -> CollectorId {
        self.id
    }

    #[inline]
    pub fn extract(&self, facts: &[V]) -> Contribution<V> {
        self.collector.extract(facts)
    }

    pub fn create_accumulator(&self) -> Box<dyn Accumulator<V>> {
        self.collector.create_accumulator()
    }
}

impl<V> Clone for SharedCollector<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            collector: Arc::clone(&self.collector),
        }
    }
}

impl<V> fmt::Debug for SharedCollector<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedCollector").field(&self.id).finish()
    }
}
