//! The assembled network and its fact-level API.
//!
//! Facts enter through sources and are propagated on [`Network::flush`],
//! which walks the operators once in build order. Every operator's settled
//! changes are handed to its lifecycles: downstream operators, filter gates
//! and constraint scorers.

mod build;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{trace, warn};

use solverforge_config::{EnvironmentMode, NetworkConfig};
use solverforge_core::Score;

use crate::analysis::{
    is_hard, ConstraintAnalysis, ConstraintJustification, ConstraintMatch, ConstraintResult,
    IndictmentMap, ScoreExplanation,
};
use crate::builder::{Blueprint, StreamId};
use crate::error::{BuildError, NetworkError, Result};
use crate::fact::Fact;
use crate::function::Predicate;
use crate::node::{passes, Change, Lifecycle, Node, NodeIndex, ScorerNode};
use crate::tuple::{TupleArena, TupleId, TupleState};

/// Identifies one inserted fact until it is retracted and flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FactHandle {
    source: StreamId,
    tuple: TupleId,
}

impl FactHandle {
    /// The source stream the fact was inserted into.
    pub fn source(&self) -> StreamId {
        self.source
    }
}

/// Owner of a stream's tuples and the filters between owner and stream.
#[derive(Clone)]
struct Route<V> {
    owner: NodeIndex,
    filters: Vec<(StreamId, Predicate<V>)>,
}

/// Incremental score calculator over a set of constraints.
///
/// ```
/// use solverforge_config::NetworkConfig;
/// use solverforge_core::{ConstraintRef, SimpleScore};
/// use solverforge_network::{MatchWeigher, NetworkBuilder, Value};
///
/// let mut builder = NetworkBuilder::<Value, SimpleScore>::new();
/// let shifts = builder.for_each("shift").unwrap();
/// builder
///     .penalize(shifts, ConstraintRef::named("Shift"), SimpleScore::ONE, MatchWeigher::one())
///     .unwrap();
/// let mut network = builder.build(&NetworkConfig::default()).unwrap();
///
/// let handle = network.insert(shifts, Value::from("monday")).unwrap();
/// assert_eq!(network.flush().unwrap(), SimpleScore::of(-1));
/// network.retract(handle).unwrap();
/// assert_eq!(network.flush().unwrap(), SimpleScore::of(1));
/// assert_eq!(network.score(), SimpleScore::of(0));
/// ```
pub struct Network<V: Fact, Sc: Score> {
    blueprint: Arc<Blueprint<V, Sc>>,
    config: NetworkConfig,
    nodes: Vec<Box<dyn Node<V>>>,
    /// Per node: where its settled changes go.
    lifecycles: Vec<Vec<Lifecycle<V>>>,
    scorers: Vec<ScorerNode<V, Sc>>,
    /// Per stream; `None` for streams no constraint uses.
    routes: Vec<Option<Route<V>>>,
    sources: HashMap<StreamId, NodeIndex>,
    names: HashMap<String, StreamId>,
    tuples: TupleArena<V>,
    /// Score as of the last flush.
    score: Sc,
    changes: Vec<(Change, TupleId)>,
    poisoned: bool,
}

/// Hands one settled change to every lifecycle, gating through filters.
fn dispatch<V: Fact, Sc: Score>(
    nodes: &mut [Box<dyn Node<V>>],
    scorers: &mut [ScorerNode<V, Sc>],
    tuples: &mut TupleArena<V>,
    lifecycles: &[Lifecycle<V>],
    change: Change,
    tuple: TupleId,
) -> Result<()> {
    for lifecycle in lifecycles {
        match lifecycle {
            Lifecycle::Node { node, side } => {
                let node = &mut nodes[*node];
                match change {
                    Change::Insert => node.insert(*side, tuple, tuples)?,
                    Change::Update => node.update(*side, tuple, tuples)?,
                    Change::Retract => node.retract(*side, tuple, tuples)?,
                }
            }
            Lifecycle::Scorer(scorer) => {
                let scorer = &mut scorers[*scorer];
                match change {
                    Change::Insert => scorer.insert(tuple, tuples)?,
                    Change::Update => scorer.update(tuple, tuples)?,
                    Change::Retract => scorer.retract(tuple, tuples)?,
                }
            }
            Lifecycle::Conditional {
                predicate, next, ..
            } => {
                let gated = match change {
                    Change::Retract => Change::Retract,
                    Change::Insert | Change::Update => {
                        let facts = tuples.facts(tuple)?;
                        if passes("filter", std::slice::from_ref(predicate), facts)? {
                            change
                        } else if change == Change::Insert {
                            continue;
                        } else {
                            Change::Retract
                        }
                    }
                };
                dispatch(nodes, scorers, tuples, next, gated, tuple)?;
            }
        }
    }
    Ok(())
}

impl<V: Fact, Sc: Score> Network<V, Sc> {
    fn ensure_live(&self) -> Result<()> {
        if self.poisoned {
            Err(NetworkError::Poisoned)
        } else {
            Ok(())
        }
    }

    /// Poisons the network on a fatal error.
    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(error) = &result {
            if error.is_fatal() && !self.poisoned {
                self.poisoned = true;
                warn!(event = "poisoned", error = %error);
            }
        }
        result
    }

    /// Whether a fatal error made the network refuse further work.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// The source stream registered under `name`.
    pub fn source(&self, name: &str) -> Option<StreamId> {
        self.names.get(name).copied()
    }

    /// Queues `fact` for insertion; it is propagated on the next flush.
    pub fn insert(&mut self, source: StreamId, fact: V) -> Result<FactHandle> {
        self.ensure_live()?;
        let node = *self
            .sources
            .get(&source)
            .ok_or(NetworkError::UnknownSource(source))?;
        let Self { nodes, tuples, .. } = self;
        let result = match nodes[node].as_source_mut() {
            Some(s) => Ok(s.insert_fact(tuples, fact)),
            None => Err(NetworkError::corrupted(format!("node {} is not a source", node))),
        };
        let tuple = self.guard(result)?;
        Ok(FactHandle { source, tuple })
    }

    fn checked(&self, handle: FactHandle) -> Result<NodeIndex> {
        let node = *self
            .sources
            .get(&handle.source)
            .ok_or(NetworkError::InvalidHandle(handle))?;
        match self.nodes[node].as_source() {
            Some(source) if source.owns(&self.tuples, handle.tuple) => Ok(node),
            _ => Err(NetworkError::InvalidHandle(handle)),
        }
    }

    /// Replaces the fact behind `handle`.
    pub fn update(&mut self, handle: FactHandle, fact: V) -> Result<()> {
        self.ensure_live()?;
        let node = self.checked(handle)?;
        let Self { nodes, tuples, .. } = self;
        let result = match nodes[node].as_source_mut() {
            Some(source) => source.update_fact(tuples, handle.tuple, fact),
            None => Err(NetworkError::InvalidHandle(handle)),
        };
        self.guard(result)
    }

    /// Queues the fact behind `handle` for retraction. The handle is invalid
    /// from now on.
    pub fn retract(&mut self, handle: FactHandle) -> Result<()> {
        self.ensure_live()?;
        let node = self.checked(handle)?;
        let Self { nodes, tuples, .. } = self;
        let result = match nodes[node].as_source_mut() {
            Some(source) => source.retract_fact(tuples, handle.tuple),
            None => Err(NetworkError::InvalidHandle(handle)),
        };
        self.guard(result)
    }

    /// Propagates every pending change and returns the score delta since the
    /// previous flush.
    pub fn flush(&mut self) -> Result<Sc> {
        self.ensure_live()?;
        let result = self.flush_unguarded();
        self.guard(result)
    }

    fn flush_unguarded(&mut self) -> Result<Sc> {
        let propagated = self.propagate_all()?;
        let total = self
            .scorers
            .iter()
            .fold(Sc::zero(), |total, scorer| total + scorer.score());
        let delta = total - self.score;
        self.score = total;
        trace!(
            event = "flush",
            changes = propagated,
            live_tuples = self.tuples.live(),
            delta = %delta,
            score = %total,
        );
        if self.config.environment_mode.is_asserted() {
            self.assert_from_scratch()?;
        }
        Ok(delta)
    }

    fn propagate_all(&mut self) -> Result<usize> {
        let Self {
            nodes,
            lifecycles,
            scorers,
            tuples,
            changes,
            ..
        } = self;
        let mut propagated = 0;
        for index in 0..nodes.len() {
            changes.clear();
            nodes[index].propagate(tuples, changes)?;
            if changes.is_empty() {
                continue;
            }
            trace!(
                event = "propagate",
                node = index,
                operator = nodes[index].label(),
                changes = changes.len(),
            );
            propagated += changes.len();
            for &(change, tuple) in changes.iter() {
                dispatch(nodes, scorers, tuples, &lifecycles[index], change, tuple)?;
                if change == Change::Retract {
                    tuples.free(tuple)?;
                }
            }
        }
        Ok(propagated)
    }

    /// Rebuilds the network from the blueprint, feeds it the live source
    /// facts and compares the results.
    fn assert_from_scratch(&self) -> Result<()> {
        let config = self
            .config
            .clone()
            .with_environment_mode(EnvironmentMode::NonReproducible)
            .with_constraint_match_enabled(false);
        let mut scratch = Network::from_blueprint(Arc::clone(&self.blueprint), config)?;
        let mut sources: Vec<(StreamId, NodeIndex)> =
            self.sources.iter().map(|(&s, &n)| (s, n)).collect();
        sources.sort();
        for (stream, node) in sources {
            let facts = self.nodes[node]
                .as_source()
                .map(|source| source.live_facts(&self.tuples))
                .unwrap_or_default();
            for fact in facts {
                scratch.insert(stream, fact)?;
            }
        }
        scratch.flush()?;

        let mut detail = String::new();
        if self.config.environment_mode.is_fully_asserted() {
            for (ours, theirs) in self.scorers.iter().zip(&scratch.scorers) {
                if ours.match_count() != theirs.match_count() || ours.score() != theirs.score() {
                    detail = format!(
                        " ('{}': {} matches scoring {} incrementally, {} scoring {} recomputed)",
                        ours.constraint_ref(),
                        ours.match_count(),
                        ours.score(),
                        theirs.match_count(),
                        theirs.score(),
                    );
                    break;
                }
            }
        }
        if scratch.score != self.score || !detail.is_empty() {
            warn!(
                event = "score_corruption",
                incremental = %self.score,
                recomputed = %scratch.score,
            );
            return Err(NetworkError::ScoreCorruption {
                incremental: self.score.to_string(),
                recomputed: scratch.score.to_string(),
                detail,
            });
        }
        Ok(())
    }

    /// Score as of the last flush.
    pub fn score(&self) -> Sc {
        self.score
    }

    /// Facts of every propagated tuple of `stream`, sorted.
    pub fn tuples(&self, stream: StreamId) -> Result<Vec<Vec<V>>> {
        let route = self
            .routes
            .get(stream.0)
            .and_then(Option::as_ref)
            .ok_or(BuildError::UnknownStream(stream))?;
        let mut out = Vec::new();
        for (_, tuple) in self.tuples.owned_by(route.owner) {
            if tuple.state != TupleState::Ok {
                continue;
            }
            let mut visible = true;
            for (_, predicate) in &route.filters {
                if !passes("filter", std::slice::from_ref(predicate), &tuple.facts)? {
                    visible = false;
                    break;
                }
            }
            if visible {
                out.push(tuple.facts.to_vec());
            }
        }
        out.sort();
        Ok(out)
    }

    /// Number of tuples currently held by the network.
    pub fn live_tuples(&self) -> usize {
        self.tuples.live()
    }

    /// Score and match count per constraint, in registration order.
    pub fn constraint_results(&self) -> Vec<ConstraintResult<Sc>> {
        self.scorers
            .iter()
            .map(|scorer| ConstraintResult {
                constraint_ref: scorer.constraint_ref().clone(),
                weight: scorer.weight(),
                score: scorer.score(),
                match_count: scorer.match_count(),
                is_hard: is_hard(&scorer.weight()),
            })
            .collect()
    }

    /// Every constraint's matches with their justifications.
    pub fn explain(&self) -> Result<ScoreExplanation<V, Sc>> {
        if !self.config.constraint_match_enabled {
            return Err(NetworkError::MatchTrackingDisabled);
        }
        let constraint_analyses = self
            .scorers
            .iter()
            .map(|scorer| {
                let mut matches: Vec<ConstraintMatch<V, Sc>> = scorer
                    .matches()
                    .map(|(facts, score)| ConstraintMatch {
                        constraint_ref: scorer.constraint_ref().clone(),
                        score,
                        justification: ConstraintJustification::new(facts.to_vec()),
                    })
                    .collect();
                matches.sort_by(|a, b| a.justification.facts.cmp(&b.justification.facts));
                ConstraintAnalysis {
                    constraint_ref: scorer.constraint_ref().clone(),
                    weight: scorer.weight(),
                    score: scorer.score(),
                    matches,
                    is_hard: is_hard(&scorer.weight()),
                }
            })
            .collect();
        Ok(ScoreExplanation {
            score: self.score,
            constraint_analyses,
        })
    }

    /// Indicted facts with the matches they take part in.
    pub fn indictments(&self) -> Result<IndictmentMap<V, Sc>> {
        let explanation = self.explain()?;
        Ok(IndictmentMap::from_matches(
            explanation
                .constraint_analyses
                .into_iter()
                .flat_map(|analysis| analysis.matches)
                .collect(),
        ))
    }
}
