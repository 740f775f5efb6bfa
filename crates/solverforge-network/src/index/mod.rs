//! Multi-level indexing for join and exists operators.
//!
//! A query with the keys of a tuple from one side visits exactly the stored
//! tuples of the other side satisfying every join condition.

mod factory;
mod indexer;
mod keys;


use thiserror::Error;

pub(crate) use factory::IndexerFactory;
pub(crate) use indexer::{EntryId, Indexer};
pub(crate) use keys::KeyExtractor;
pub use keys::{IndexKey, IndexKeys};

/// Inconsistent index bookkeeping.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("index keys have {found} levels but {expected} are required")]
    LevelMismatch { expected: usize, found: usize },

    #[error("comparison level {depth} needs a single-value key")]
    CompositeComparisonKey { depth: usize },

    #[error("no index entry {0}")]
    UnknownEntry(usize),

    #[error("index entry {0} is not stored under the given keys")]
    MissingKey(usize),

    #[error("index node at depth {depth} does not match its level")]
    Shape { depth: usize },
}
