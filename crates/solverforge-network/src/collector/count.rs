//! Count collector.

use super::{Accumulator, Collector, Contribution, SharedCollector};
use crate::fact::Fact;

/// Counts the tuples of a group.
///
/// ```
/// use solverforge_network::collector::{count, Contribution};
/// use solverforge_network::Value;
///
/// let collector = count::<Value>();
/// let mut acc = collector.create_accumulator();
/// acc.accumulate(&Contribution::Unit);
/// acc.accumulate(&Contribution::Unit);
/// acc.retract(&Contribution::Unit);
/// assert_eq!(acc.finish(), Value::Int(1));
/// ```
pub fn count<V>() -> SharedCollector<V>
where
    V: Fact + From<i64>,
{
    SharedCollector::with_id("count", None, CountCollector)
}

struct CountCollector;

impl<V: Fact + From<i64>> Collector<V> for CountCollector {
    #[inline]
    fn extract(&self, _facts: &[V]) -> Contribution<V> {
        Contribution::Unit
    }

    fn create_accumulator(&self) -> Box<dyn Accumulator<V>> {
        Box::new(CountAccumulator { count: 0 })
    }
}

struct CountAccumulator {
    count: i64,
}

impl<V: Fact + From<i64>> Accumulator<V> for CountAccumulator {
    #[inline]
    fn accumulate(&mut self, _: &Contribution<V>) {
        self.count += 1;
    }

    #[inline]
    fn retract(&mut self, _: &Contribution<V>) {
        self.count -= 1;
    }

    fn finish(&self) -> V {
        V::from(self.count)
    }
}
