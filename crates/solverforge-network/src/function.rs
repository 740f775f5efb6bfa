//! User functions with a build-time identity.
//!
//! A [`Predicate`] or [`Mapping`] keeps its [`FunctionId`] when cloned, so two
//! stream descriptions built from the same function value intern to the same
//! operator. Closures passed directly get a fresh id each time.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::NetworkError;
use crate::fact::Fact;

static NEXT_FUNCTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a user function, compared when descriptions are interned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FunctionId {
    /// Projection of the fact at this position.
    Fact(usize),
    User(u64),
}

impl FunctionId {
    pub(crate) fn fresh() -> Self {
        FunctionId::User(NEXT_FUNCTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A filter over the facts of one tuple.
pub struct Predicate<V> {
    id: FunctionId,
    function: Arc<dyn Fn(&[V]) -> bool + Send + Sync>,
}

impl<V> Predicate<V> {
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(&[V]) -> bool + Send + Sync + 'static,
    {
        Self {
            id: FunctionId::fresh(),
            function: Arc::new(function),
        }
    }

    #[inline]
    pub fn id(&self) -> FunctionId {
        self.id
    }

    #[inline]
    pub fn test(&self, facts: &[V]) -> bool {
        (self.function)(facts)
    }
}

impl<V> Clone for Predicate<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            function: Arc::clone(&self.function),
        }
    }
}

impl<V> fmt::Debug for Predicate<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.id).finish()
    }
}

impl<V, F> From<F> for Predicate<V>
where
    F: Fn(&[V]) -> bool + Send + Sync + 'static,
{
    fn from(function: F) -> Self {
        Predicate::new(function)
    }
}

/// Derives one fact from the facts of a tuple.
pub struct Mapping<V> {
    id: FunctionId,
    function: Arc<dyn Fn(&[V]) -> V + Send + Sync>,
}

impl<V: Clone + Send + Sync + 'static> Mapping<V> {
    pub fn new<F>(function: F) -> Self
    where
        F: Fn(&[V]) -> V + Send + Sync + 'static,
    {
        Self {
            id: FunctionId::fresh(),
            function: Arc::new(function),
        }
    }

    /// The fact at `index`, unchanged.
    ///
    /// All projections of the same position share one identity.
    pub fn fact(index: usize) -> Self {
        Self {
            id: FunctionId::Fact(index),
            function: Arc::new(move |facts: &[V]| facts[index].clone()),
        }
    }
}

impl<V> Mapping<V> {
    #[inline]
    pub fn id(&self) -> FunctionId {
        self.id
    }

    #[inline]
    pub fn apply(&self, facts: &[V]) -> V {
        (self.function)(facts)
    }
}

impl<V> Clone for Mapping<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            function: Arc::clone(&self.function),
        }
    }
}

impl<V> fmt::Debug for Mapping<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Mapping").field(&self.id).finish()
    }
}

impl<V, F> From<F> for Mapping<V>
where
    V: Clone + Send + Sync + 'static,
    F: Fn(&[V]) -> V + Send + Sync + 'static,
{
    fn from(function: F) -> Self {
        Mapping::new(function)
    }
}

/// What a user function was doing when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionRole {
    Predicate,
    Mapping,
    JoinKey,
    GroupKey,
    Collector,
    Padding,
    Weigher,
}

impl fmt::Display for FunctionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FunctionRole::Predicate => "predicate",
            FunctionRole::Mapping => "mapping",
            FunctionRole::JoinKey => "join key",
            FunctionRole::GroupKey => "group key",
            FunctionRole::Collector => "collector",
            FunctionRole::Padding => "padding",
            FunctionRole::Weigher => "match weigher",
        };
        f.write_str(name)
    }
}

/// Runs a user function, turning a panic into [`NetworkError::UserFunction`]
/// that names the operator and the offending facts.
pub(crate) fn guarded<V: Fact, T>(
    operator: &'static str,
    role: FunctionRole,
    facts: &[V],
    function: impl FnOnce() -> T,
) -> Result<T, NetworkError> {
    panic::catch_unwind(AssertUnwindSafe(function)).map_err(|payload| {
        NetworkError::UserFunction {
            operator,
            role,
            facts: format!("{:?}", facts),
            message: panic_message(payload.as_ref()),
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
