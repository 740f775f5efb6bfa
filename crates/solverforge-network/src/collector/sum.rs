// Sum and average over integer mappings.

use std::marker::PhantomData;

use super::{Accumulator, Collector, Contribution, SharedCollector};
use crate::fact::Fact;
use crate::function::FunctionId;

// Sums an integer mapped from each tuple.
//
// ```
// use solverforge_network::collector::sum;
// use solverforge_network::Value;
//
// let collector = sum(|facts: &[Value]| facts[0].as_int().unwrap_or(0));
// let mut acc = collector.create_accumulator();
// let five = collector.extract(&[Value::Int(5)]);
// acc.accumulate(&five);
// acc.accumulate(&collector.extract(&[Value::Int(3)]));
// acc.retract(&five);
// assert_eq!(acc.finish(), Value::Int(3));
// ```
pub fn sum<V, F>(mapper: F) -> SharedCollector<V>
where
    V: Fact + From<i64>,
    F: Fn(&[V]) -> i64 + Send + Sync + 'static,
{
    SharedCollector::with_id(
        "sum",
        Some(FunctionId::fresh()),
        IntCollector::<V, F, SumAccumulator> {
            mapper,
            _phantom: PhantomData,
        },
    )
}

// Arithmetic mean of an integer mapped from each tuple, as a float.
pub fn average<V, F>(mapper: F) -> SharedCollector<V>
where
    V: Fact + From<f64>,
    F: Fn(&[V]) -> i64 + Send + Sync + 'static,
{
    SharedCollector::with_id(
        "average",
        Some(FunctionId::fresh()),
        IntCollector::<V, F, AverageAccumulator> {
            mapper,
            _phantom: PhantomData,
        },
    )
}

struct IntCollector<V, F, A> {
    mapper: F,
    _phantom: PhantomData<fn(&[V]) -> A>,
}

impl<V, F, A> Collector<V> for IntCollector<V, F, A>
where
    V: Fact,
    F: Fn(&[V]) -> i64 + Send + Sync,
    A: Accumulator<V> + Default + 'static,
{
    #[inline]
    fn extract(&self, facts: &[V]) -> Contribution<V> {
        Contribution::Int((self.mapper)(facts))
    }

    fn create_accumulator(&self) -> Box<dyn Accumulator<V>> {
        Box::new(A::default())
    }
}

#[derive(Default)]
struct SumAccumulator {
    sum: i64,
}

impl<V: Fact + From<i64>> Accumulator<V> for SumAccumulator {
    #[inline]
    fn accumulate(&mut self, contribution: &Contribution<V>) {
        if let Contribution::Int(value) = contribution {
            self.sum = self.sum.wrapping_add(*value);
        }
    }

    #[inline]
    fn retract(&mut self, contribution: &Contribution<V>) {
        if let Contribution::Int(value) = contribution {
            self.sum = self.sum.wrapping_sub(*value);
        }
    }

    fn finish(&self) -> V {
        V::from(self.sum)
    }
}

// Integer sum keeps retraction exact; the division happens on finish only.
#[derive(Default)]
struct AverageAccumulator {
    sum: i128,
    count: i64,
}

impl<V: Fact + From<f64>> Accumulator<V> for AverageAccumulator {
    #[inline]
    fn accumulate(&mut self, contribution: &Contribution<V>) {
        if let Contribution::Int(value) = contribution {
            self.sum += i128::from(*value);
            self.count += 1;
        }
    }

    #[inline]
    fn retract(&mut self, contribution: &Contribution<V>) {
        if let Contribution::Int(value) = contribution {
            self.sum -= i128::from(*value);
            self.count -= 1;
        }
    }

    fn finish(&self) -> V {
        if self.count == 0 {
            V::from(0.0)
        } else {
            V::from(self.sum as f64 / self.count as f64)
        }
    }
}
