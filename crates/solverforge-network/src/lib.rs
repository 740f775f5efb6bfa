//! Incremental constraint-evaluation network for SolverForge.
//!
//! Constraints are described once as a graph of streams (filter, join,
//! exists, group-by, map, concat) ending in scorers. [`NetworkBuilder`]
//! interns the descriptions so constraints share common operators and builds
//! a [`Network`]. Afterwards only fact-level insert, update and retract calls
//! cross the boundary; [`Network::flush`] propagates the net changes through
//! the operators and returns the score delta.
//!
//! ```
//! use solverforge_config::NetworkConfig;
//! use solverforge_core::{ConstraintRef, HardSoftScore};
//! use solverforge_network::joiner::equal;
//! use solverforge_network::{Mapping, MatchWeigher, NetworkBuilder, Value};
//!
//! let mut builder = NetworkBuilder::<Value, HardSoftScore>::new();
//! let lessons = builder.for_each("lesson").unwrap();
//! let conflicts = builder
//!     .join(lessons, lessons, equal(Mapping::fact(0)))
//!     .unwrap();
//! builder
//!     .penalize(
//!         conflicts,
//!         ConstraintRef::named("Same slot"),
//!         HardSoftScore::ONE_HARD,
//!         MatchWeigher::one(),
//!     )
//!     .unwrap();
//! let mut network = builder.build(&NetworkConfig::default()).unwrap();
//!
//! network.insert(lessons, Value::Int(9)).unwrap();
//! // A lesson always pairs with itself.
//! assert_eq!(network.flush().unwrap(), HardSoftScore::of(-1, 0));
//! ```

pub mod analysis;
mod arena;
mod builder;
pub mod collector;
mod error;
mod fact;
mod function;
mod index;
pub mod joiner;
mod network;
mod node;
mod tuple;
mod value;
mod weight;

#[cfg(test)]
mod test_utils;

pub use analysis::{
    ConstraintAnalysis, ConstraintJustification, ConstraintMatch, ConstraintResult, Indictment,
    IndictmentMap, ScoreExplanation,
};
pub use builder::{NetworkBuilder, StreamId};
pub use error::{BuildError, NetworkError, Result};
pub use fact::{Fact, Facts, MAX_ARITY};
pub use function::{FunctionId, FunctionRole, Mapping, Predicate};
pub use index::{IndexError, IndexKey, IndexKeys};
pub use network::{FactHandle, Network};
pub use tuple::{TupleId, TupleState};
pub use value::Value;
pub use weight::MatchWeigher;
