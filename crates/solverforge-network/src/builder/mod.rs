//! Operator-description graph.
//!
//! Streams are described first and turned into operators by
//! [`NetworkBuilder::build`]. Every description is hash-consed: describing a
//! stream that already exists returns the existing [`StreamId`], so
//! constraints share their common operator prefixes.
//!
//! ```
//! use solverforge_config::NetworkConfig;
//! use solverforge_core::{ConstraintRef, SimpleScore};
//! use solverforge_network::joiner::equal;
//! use solverforge_network::{Mapping, MatchWeigher, NetworkBuilder, Value};
//!
//! let mut builder = NetworkBuilder::<Value, SimpleScore>::new();
//! let lessons = builder.for_each("lesson").unwrap();
//! let pairs = builder.join(lessons, lessons, equal(Mapping::fact(0))).unwrap();
//! // Fact projections are identified by position, so this is the same join.
//! assert_eq!(builder.join(lessons, lessons, equal(Mapping::fact(0))).unwrap(), pairs);
//! builder
//!     .penalize(pairs, ConstraintRef::named("Conflict"), SimpleScore::ONE, MatchWeigher::one())
//!     .unwrap();
//! let network = builder.build(&NetworkConfig::default()).unwrap();
//! assert_eq!(network.source("lesson"), Some(lessons));
//! ```


use std::collections::HashMap;

use smallvec::{smallvec, SmallVec};

use solverforge_config::NetworkConfig;
use solverforge_core::{ConstraintRef, ImpactType, ParseableScore, Score};

use crate::collector::{CollectorId, SharedCollector};
use crate::error::BuildError;
use crate::fact::{Fact, MAX_ARITY};
use crate::function::{FunctionId, Mapping, Predicate};
use crate::joiner::{Joiners, JoinerType};
use crate::network::Network;
use crate::weight::MatchWeigher;

/// Handle of a described stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub(crate) usize);

impl StreamId {
    pub fn index(self) -> usize {
        self.0
    }
}

pub(crate) enum StreamKind<V> {
    Source {
        name: String,
    },
    Filter {
        parent: StreamId,
        predicate: Predicate<V>,
    },
    Join {
        left: StreamId,
        right: StreamId,
        joiners: Joiners<V>,
    },
    Exists {
        left: StreamId,
        right: StreamId,
        joiners: Joiners<V>,
        should_exist: bool,
    },
    Group {
        parent: StreamId,
        keys: Vec<Mapping<V>>,
        collectors: Vec<SharedCollector<V>>,
    },
    Map {
        parent: StreamId,
        mappings: Vec<Mapping<V>>,
    },
    Concat {
        left: StreamId,
        right: StreamId,
        paddings: Vec<Mapping<V>>,
    },
}

impl<V> StreamKind<V> {
    pub fn parents(&self) -> SmallVec<[StreamId; 2]> {
        match self {
            StreamKind::Source { .. } => SmallVec::new(),
            StreamKind::Filter { parent, .. }
            | StreamKind::Group { parent, .. }
            | StreamKind::Map { parent, .. } => smallvec![*parent],
            StreamKind::Join { left, right, .. }
            | StreamKind::Exists { left, right, .. }
            | StreamKind::Concat { left, right, .. } => smallvec![*left, *right],
        }
    }
}

pub(crate) struct StreamDef<V> {
    pub kind: StreamKind<V>,
    pub arity: usize,
    /// Declared by the operator kind: the stream never holds two tuples
    /// with equal facts.
    pub distinct: bool,
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum StreamKey {
    Source(String),
    Filter(StreamId, FunctionId),
    Join(StreamId, StreamId, Vec<(JoinerType, FunctionId, FunctionId)>, Vec<FunctionId>),
    Exists(bool, StreamId, StreamId, Vec<(JoinerType, FunctionId, FunctionId)>, Vec<FunctionId>),
    Group(StreamId, Vec<FunctionId>, Vec<CollectorId>),
    Map(StreamId, Vec<FunctionId>),
    Concat(StreamId, StreamId, Vec<FunctionId>),
}

pub(crate) struct ConstraintDef<V, Sc> {
    pub constraint_ref: ConstraintRef,
    pub impact_type: ImpactType,
    pub weight: Sc,
    pub weigher: MatchWeigher<V>,
    pub stream: StreamId,
}

/// The finished description a network is built from. Kept by the network
/// to rebuild a from-scratch copy in asserted modes.
pub(crate) struct Blueprint<V, Sc> {
    pub streams: Vec<StreamDef<V>>,
    pub constraints: Vec<ConstraintDef<V, Sc>>,
}

impl<V, Sc> Blueprint<V, Sc> {
    pub fn stream(&self, id: StreamId) -> Result<&StreamDef<V>, BuildError> {
        self.streams.get(id.0).ok_or(BuildError::UnknownStream(id))
    }
}

/// Describes streams and constraints, then builds a [`Network`].
pub struct NetworkBuilder<V, Sc> {
    streams: Vec<StreamDef<V>>,
    interned: HashMap<StreamKey, StreamId>,
    constraints: Vec<ConstraintDef<V, Sc>>,
}

impl<V: Fact, Sc: Score> Default for NetworkBuilder<V, Sc> {
    fn default() -> Self {
        Self::new()
    }
}

fn check_arity(operation: &'static str, arity: usize) -> Result<usize, BuildError> {
    if (1..=MAX_ARITY).contains(&arity) {
        Ok(arity)
    } else {
        Err(BuildError::Arity { operation, arity })
    }
}

fn invalid(operation: &'static str, reason: impl Into<String>) -> BuildError {
    BuildError::Invalid {
        operation,
        reason: reason.into(),
    }
}

fn mapping_ids<V>(mappings: &[Mapping<V>]) -> Vec<FunctionId> {
    mappings.iter().map(Mapping::id).collect()
}

impl<V: Fact, Sc: Score> NetworkBuilder<V, Sc> {
    pub fn new() -> Self {
        Self {
            streams: Vec::new(),
            interned: HashMap::new(),
            constraints: Vec::new(),
        }
    }

    fn def(&self, id: StreamId) -> Result<&StreamDef<V>, BuildError> {
        self.streams.get(id.0).ok_or(BuildError::UnknownStream(id))
    }

    /// Arity of the tuples of `stream`.
    pub fn arity(&self, stream: StreamId) -> Result<usize, BuildError> {
        Ok(self.def(stream)?.arity)
    }

    /// Whether `stream` declares that it never holds duplicate tuples.
    pub fn is_distinct(&self, stream: StreamId) -> Result<bool, BuildError> {
        Ok(self.def(stream)?.distinct)
    }

    /// Number of distinct stream descriptions so far.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    fn intern(&mut self, key: StreamKey, make: impl FnOnce() -> StreamDef<V>) -> StreamId {
        if let Some(&id) = self.interned.get(&key) {
            return id;
        }
        let id = StreamId(self.streams.len());
        self.streams.push(make());
        self.interned.insert(key, id);
        id
    }

    /// Every fact inserted into the source `name`, as arity-1 tuples.
    pub fn for_each(&mut self, name: impl Into<String>) -> Result<StreamId, BuildError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(invalid("for_each", "source name is blank"));
        }
        Ok(self.intern(StreamKey::Source(name.clone()), || StreamDef {
            kind: StreamKind::Source { name },
            arity: 1,
            distinct: true,
        }))
    }

    pub fn filter(
        &mut self,
        stream: StreamId,
        predicate: impl Into<Predicate<V>>,
    ) -> Result<StreamId, BuildError> {
        let parent = self.def(stream)?;
        let (arity, distinct) = (parent.arity, parent.distinct);
        let predicate = predicate.into();
        Ok(self.intern(StreamKey::Filter(stream, predicate.id()), || StreamDef {
            kind: StreamKind::Filter {
                parent: stream,
                predicate,
            },
            arity,
            distinct,
        }))
    }

    /// Pairs of tuples satisfying `joiners`, facts of the left tuple first.
    pub fn join(
        &mut self,
        left: StreamId,
        right: StreamId,
        joiners: Joiners<V>,
    ) -> Result<StreamId, BuildError> {
        let (l, r) = (self.def(left)?, self.def(right)?);
        let arity = check_arity("join", l.arity + r.arity)?;
        let distinct = l.distinct && r.distinct;
        let key = StreamKey::Join(left, right, joiners.ids(), joiners.filter_ids());
        Ok(self.intern(key, || StreamDef {
            kind: StreamKind::Join {
                left,
                right,
                joiners,
            },
            arity,
            distinct,
        }))
    }

    /// Left tuples for which at least one right tuple satisfies `joiners`.
    pub fn if_exists(
        &mut self,
        left: StreamId,
        right: StreamId,
        joiners: Joiners<V>,
    ) -> Result<StreamId, BuildError> {
        self.exists(left, right, joiners, true)
    }

    /// Left tuples for which no right tuple satisfies `joiners`.
    pub fn if_not_exists(
        &mut self,
        left: StreamId,
        right: StreamId,
        joiners: Joiners<V>,
    ) -> Result<StreamId, BuildError> {
        self.exists(left, right, joiners, false)
    }

    fn exists(
        &mut self,
        left: StreamId,
        right: StreamId,
        joiners: Joiners<V>,
        should_exist: bool,
    ) -> Result<StreamId, BuildError> {
        let l = self.def(left)?;
        self.def(right)?;
        let (arity, distinct) = (l.arity, l.distinct);
        let key = StreamKey::Exists(
            should_exist,
            left,
            right,
            joiners.ids(),
            joiners.filter_ids(),
        );
        Ok(self.intern(key, || StreamDef {
            kind: StreamKind::Exists {
                left,
                right,
                joiners,
                should_exist,
            },
            arity,
            distinct,
        }))
    }

    /// One tuple per distinct key: the key facts followed by one result per
    /// collector.
    pub fn group_by(
        &mut self,
        stream: StreamId,
        keys: Vec<Mapping<V>>,
        collectors: Vec<SharedCollector<V>>,
    ) -> Result<StreamId, BuildError> {
        self.def(stream)?;
        if keys.len() > MAX_ARITY || collectors.len() > MAX_ARITY {
            return Err(invalid(
                "group_by",
                format!(
                    "{} keys and {} collectors, at most {} each",
                    keys.len(),
                    collectors.len(),
                    MAX_ARITY
                ),
            ));
        }
        if keys.is_empty() && collectors.is_empty() {
            return Err(invalid("group_by", "needs a key or a collector"));
        }
        let arity = check_arity("group_by", keys.len() + collectors.len())?;
        let key = StreamKey::Group(
            stream,
            mapping_ids(&keys),
            collectors.iter().map(SharedCollector::id).collect(),
        );
        Ok(self.intern(key, || StreamDef {
            kind: StreamKind::Group {
                parent: stream,
                keys,
                collectors,
            },
            arity,
            distinct: true,
        }))
    }

    /// `stream` itself when it already declares distinct tuples, otherwise a
    /// group-by keyed on every fact.
    pub fn distinct(&mut self, stream: StreamId) -> Result<StreamId, BuildError> {
        let def = self.def(stream)?;
        if def.distinct {
            return Ok(stream);
        }
        let keys = (0..def.arity).map(Mapping::fact).collect();
        self.group_by(stream, keys, Vec::new())
    }

    pub fn map(
        &mut self,
        stream: StreamId,
        mappings: Vec<Mapping<V>>,
    ) -> Result<StreamId, BuildError> {
        self.def(stream)?;
        let arity = check_arity("map", mappings.len())?;
        let key = StreamKey::Map(stream, mapping_ids(&mappings));
        Ok(self.intern(key, || StreamDef {
            kind: StreamKind::Map {
                parent: stream,
                mappings,
            },
            arity,
            distinct: false,
        }))
    }

    /// Union of two streams. Tuples of the shorter stream are extended with
    /// one fact per padding mapping, applied to that tuple's facts.
    pub fn concat(
        &mut self,
        left: StreamId,
        right: StreamId,
        paddings: Vec<Mapping<V>>,
    ) -> Result<StreamId, BuildError> {
        let (l, r) = (self.def(left)?.arity, self.def(right)?.arity);
        let gap = l.abs_diff(r);
        if paddings.len() != gap {
            return Err(invalid(
                "concat",
                format!(
                    "arities {} and {} need {} paddings, got {}",
                    l,
                    r,
                    gap,
                    paddings.len()
                ),
            ));
        }
        let arity = check_arity("concat", l.max(r))?;
        let key = StreamKey::Concat(left, right, mapping_ids(&paddings));
        Ok(self.intern(key, || StreamDef {
            kind: StreamKind::Concat {
                left,
                right,
                paddings,
            },
            arity,
            distinct: false,
        }))
    }

    pub fn penalize(
        &mut self,
        stream: StreamId,
        constraint_ref: ConstraintRef,
        weight: Sc,
        weigher: MatchWeigher<V>,
    ) -> Result<(), BuildError> {
        self.constraint(stream, constraint_ref, ImpactType::Penalty, weight, weigher)
    }

    pub fn reward(
        &mut self,
        stream: StreamId,
        constraint_ref: ConstraintRef,
        weight: Sc,
        weigher: MatchWeigher<V>,
    ) -> Result<(), BuildError> {
        self.constraint(stream, constraint_ref, ImpactType::Reward, weight, weigher)
    }

    fn constraint(
        &mut self,
        stream: StreamId,
        constraint_ref: ConstraintRef,
        impact_type: ImpactType,
        weight: Sc,
        weigher: MatchWeigher<V>,
    ) -> Result<(), BuildError> {
        self.def(stream)?;
        if self
            .constraints
            .iter()
            .any(|c| c.constraint_ref == constraint_ref)
        {
            return Err(BuildError::DuplicateConstraint(constraint_ref.full_name()));
        }
        self.constraints.push(ConstraintDef {
            constraint_ref,
            impact_type,
            weight,
            weigher,
            stream,
        });
        Ok(())
    }

    /// Resolves weight overrides and creates the operators.
    pub fn build(mut self, config: &NetworkConfig) -> Result<Network<V, Sc>, BuildError>
    where
        Sc: ParseableScore,
    {
        if self.constraints.is_empty() {
            return Err(BuildError::NoConstraints);
        }
        for (name, weight) in config.parsed_weights::<Sc>()? {
            let constraint = self
                .constraints
                .iter_mut()
                .find(|c| c.constraint_ref.matches(name))
                .ok_or_else(|| BuildError::UnknownWeightOverride(name.to_string()))?;
            constraint.weight = weight;
        }
        let blueprint = Blueprint {
            streams: self.streams,
            constraints: self.constraints,
        };
        Network::from_blueprint(std::sync::Arc::new(blueprint), config.clone())
    }
}
