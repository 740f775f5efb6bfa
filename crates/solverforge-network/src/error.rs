//! Error types for building and running a network.

use thiserror::Error;

use solverforge_config::ConfigError;

use crate::builder::StreamId;
use crate::function::FunctionRole;
use crate::index::IndexError;
use crate::network::FactHandle;

/// A stream description or configuration the network cannot be built from.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unknown stream {0:?}")]
    UnknownStream(StreamId),

    #[error("{operation} would produce arity {arity}, outside 1..=4")]
    Arity {
        operation: &'static str,
        arity: usize,
    },

    #[error("invalid {operation}: {reason}")]
    Invalid {
        operation: &'static str,
        reason: String,
    },

    #[error("constraint '{0}' is registered twice")]
    DuplicateConstraint(String),

    #[error("weight override names unknown constraint '{0}'")]
    UnknownWeightOverride(String),

    #[error("network has no constraints")]
    NoConstraints,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A failure while feeding or flushing a network.
///
/// Everything except `InvalidHandle`, `UnknownSource` and
/// `MatchTrackingDisabled` is fatal: the network is poisoned and refuses
/// further work.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("{role} of {operator} failed on facts {facts}: {message}")]
    UserFunction {
        operator: &'static str,
        role: FunctionRole,
        facts: String,
        message: String,
    },

    #[error("incremental state corrupted: {0}")]
    Corrupted(String),

    #[error("score corruption: incremental {incremental} but recomputed {recomputed}{detail}")]
    ScoreCorruption {
        incremental: String,
        recomputed: String,
        detail: String,
    },

    #[error("fact handle {0:?} is stale or belongs to another source")]
    InvalidHandle(FactHandle),

    #[error("stream {0:?} is not a source")]
    UnknownSource(StreamId),

    #[error("constraint match tracking is disabled")]
    MatchTrackingDisabled,

    #[error("network is poisoned by an earlier fatal error")]
    Poisoned,
}

impl NetworkError {
    pub(crate) fn corrupted(message: impl Into<String>) -> Self {
        NetworkError::Corrupted(message.into())
    }

    /// Whether the network can keep going after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            NetworkError::InvalidHandle(_)
                | NetworkError::UnknownSource(_)
                | NetworkError::MatchTrackingDisabled
        )
    }
}

impl From<IndexError> for NetworkError {
    fn from(e: IndexError) -> Self {
        NetworkError::Corrupted(e.to_string())
    }
}

pub type Result<T, E = NetworkError> = std::result::Result<T, E>;
