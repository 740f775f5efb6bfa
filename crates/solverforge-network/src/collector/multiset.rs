//! Collectors backed by a multiset of mapped facts.

use std::collections::BTreeMap;

use super::{Accumulator, Collector, Contribution, SharedCollector};
use crate::fact::Fact;
use crate::function::Mapping;

type Finisher<V> = fn(&BTreeMap<V, usize>) -> V;

/// Smallest mapped fact; `V::default()` for an empty group.
pub fn min<V>(mapping: impl Into<Mapping<V>>) -> SharedCollector<V>
where
    V: Fact + Default,
{
    multiset("min", mapping.into(), |items| {
        items.keys().next().cloned().unwrap_or_default()
    })
}

/// Largest mapped fact; `V::default()` for an empty group.
pub fn max<V>(mapping: impl Into<Mapping<V>>) -> SharedCollector<V>
where
    V: Fact + Default,
{
    multiset("max", mapping.into(), |items| {
        items.keys().next_back().cloned().unwrap_or_default()
    })
}

/// All mapped facts in ascending order, duplicates kept.
pub fn to_list<V>(mapping: impl Into<Mapping<V>>) -> SharedCollector<V>
where
    V: Fact + From<Vec<V>>,
{
    multiset("to_list", mapping.into(), |items| {
        V::from(
            items
                .iter()
                .flat_map(|(v, &n)| std::iter::repeat(v).take(n).cloned())
                .collect(),
        )
    })
}

/// Distinct mapped facts in ascending order.
pub fn to_set<V>(mapping: impl Into<Mapping<V>>) -> SharedCollector<V>
where
    V: Fact + From<Vec<V>>,
{
    multiset("to_set", mapping.into(), |items| {
        V::from(items.keys().cloned().collect::<Vec<_>>())
    })
}

/// Number of distinct mapped facts.
pub fn count_distinct<V>(mapping: impl Into<Mapping<V>>) -> SharedCollector<V>
where
    V: Fact + From<i64>,
{
    multiset("count_distinct", mapping.into(), |items| {
        V::from(items.len() as i64)
    })
}

fn multiset<V: Fact>(
    kind: &'static str,
    mapping: Mapping<V>,
    finisher: Finisher<V>,
) -> SharedCollector<V> {
    SharedCollector::with_id(kind, Some(mapping.id()), MultisetCollector { mapping, finisher })
}

struct MultisetCollector<V> {
    mapping: Mapping<V>,
    finisher: Finisher<V>,
}

impl<V: Fact> Collector<V> for MultisetCollector<V> {
    #[inline]
    fn extract(&self, facts: &[V]) -> Contribution<V> {
        Contribution::Fact(self.mapping.apply(facts))
    }

    fn create_accumulator(&self) -> Box<dyn Accumulator<V>> {
        Box::new(MultisetAccumulator {
            items: BTreeMap::new(),
            finisher: self.finisher,
        })
    }
}

struct MultisetAccumulator<V> {
    items: BTreeMap<V, usize>,
    finisher: Finisher<V>,
}

impl<V: Fact> Accumulator<V> for MultisetAccumulator<V> {
    fn accumulate(&mut self, contribution: &Contribution<V>) {
        if let Contribution::Fact(v) = contribution {
            *self.items.entry(v.clone()).or_insert(0) += 1;
        }
    }

    fn retract(&mut self, contribution: &Contribution<V>) {
        if let Contribution::Fact(v) = contribution {
            if let Some(n) = self.items.get_mut(v) {
                *n -= 1;
                if *n == 0 {
                    self.items.remove(v);
                }
            }
        }
    }

    fn finish(&self) -> V {
        (self.finisher)(&self.items)
    }
}
