//! Test fixtures shared by the crate's test modules.

use solverforge_config::NetworkConfig;
use solverforge_core::{ConstraintRef, Score, SimpleScore};

use crate::{Mapping, MatchWeigher, Network, NetworkBuilder, StreamId, Value};

/// A record fact: a list of fields.
pub fn record<I: IntoIterator<Item = Value>>(fields: I) -> Value {
    Value::List(fields.into_iter().collect())
}

/// Field `index` of the fact at `position`.
pub fn field(position: usize, index: usize) -> Mapping<Value> {
    Mapping::new(move |facts: &[Value]| facts[position].field(index).clone())
}

/// Integer facts of every tuple, for compact assertions.
pub fn ints(tuples: Vec<Vec<Value>>) -> Vec<Vec<i64>> {
    tuples
        .into_iter()
        .map(|facts| facts.iter().map(|f| f.as_int().unwrap_or(i64::MIN)).collect())
        .collect()
}

pub fn int_of(facts: &[Value]) -> i64 {
    facts[0].as_int().unwrap_or(0)
}

/// Penalizes every tuple of `stream` by one.
pub fn penalize_each<Sc: Score>(
    builder: &mut NetworkBuilder<Value, Sc>,
    stream: StreamId,
    name: &str,
    weight: Sc,
) {
    builder
        .penalize(stream, ConstraintRef::named(name), weight, MatchWeigher::one())
        .unwrap();
}

pub fn build(builder: NetworkBuilder<Value, SimpleScore>) -> Network<Value, SimpleScore> {
    builder.build(&tracked()).unwrap()
}

/// Default settings with match tracking on.
pub fn tracked() -> NetworkConfig {
    NetworkConfig::default().with_constraint_match_enabled(true)
}

/// Installs a test subscriber honouring `RUST_LOG`; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
