//! Fact values carried by tuples.

use std::fmt::Debug;
use std::hash::Hash;

use smallvec::SmallVec;

/// Largest tuple arity an operator may produce.
pub const MAX_ARITY: usize = 4;

/// A value that can flow through the network.
///
/// Equality and hashing feed equality index nodes and group keys; the total
/// order feeds comparison index nodes and the sorted views of
/// [`Network::tuples`](crate::Network::tuples).
pub trait Fact: Clone + Eq + Hash + Ord + Debug + Send + Sync + 'static {}

impl<T> Fact for T where T: Clone + Eq + Hash + Ord + Debug + Send + Sync + 'static {}

/// The facts of one tuple, arity 1 to 4, stored inline.
pub type Facts<V> = SmallVec<[V; MAX_ARITY]>;
