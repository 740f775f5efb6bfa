//! Turning a blueprint into operators.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use solverforge_config::NetworkConfig;
use solverforge_core::Score;

use super::{Network, Route};
use crate::builder::{Blueprint, StreamId, StreamKind};
use crate::error::BuildError;
use crate::fact::Fact;
use crate::function::Predicate;
use crate::node::{
    ConcatNode, ExistsNode, GroupNode, GroupSlots, InputSlots, JoinNode, Lifecycle, MapNode, Node,
    NodeIndex, ScorerNode, Side, SourceNode, GROUP_SLOT,
};
use crate::tuple::{StoreLayout, TupleArena};

/// Streams reachable from a constraint, plus every source.
fn active_streams<V, Sc>(blueprint: &Blueprint<V, Sc>) -> Result<Vec<bool>, BuildError> {
    let mut active = vec![false; blueprint.streams.len()];
    let mut stack: Vec<StreamId> = blueprint.constraints.iter().map(|c| c.stream).collect();
    stack.extend(
        blueprint
            .streams
            .iter()
            .enumerate()
            .filter(|(_, def)| matches!(def.kind, StreamKind::Source { .. }))
            .map(|(i, _)| StreamId(i)),
    );
    while let Some(id) = stack.pop() {
        let def = blueprint.stream(id)?;
        if std::mem::replace(&mut active[id.0], true) {
            continue;
        }
        stack.extend(def.kind.parents());
    }
    Ok(active)
}

fn route_of<V>(routes: &[Option<Route<V>>], stream: StreamId) -> Result<&Route<V>, BuildError> {
    routes
        .get(stream.0)
        .and_then(Option::as_ref)
        .ok_or(BuildError::UnknownStream(stream))
}

fn input_slots<V>(
    layout: &mut StoreLayout,
    routes: &[Option<Route<V>>],
    stream: StreamId,
) -> Result<InputSlots, BuildError> {
    let owner = route_of(routes, stream)?.owner;
    Ok(InputSlots {
        keys: layout.reserve(owner),
        record: layout.reserve(owner),
    })
}

/// Hangs `target` under the chain of filters, reusing the conditional
/// lifecycles other subscribers already created for the same filter streams.
fn attach<V>(lifecycles: &mut Vec<Lifecycle<V>>, filters: &[(StreamId, Predicate<V>)], target: Lifecycle<V>) {
    let Some(((stream, predicate), rest)) = filters.split_first() else {
        lifecycles.push(target);
        return;
    };
    let existing = lifecycles
        .iter()
        .position(|l| matches!(l, Lifecycle::Conditional { stream: s, .. } if s == stream));
    let index = existing.unwrap_or_else(|| {
        lifecycles.push(Lifecycle::Conditional {
            stream: *stream,
            predicate: predicate.clone(),
            next: Vec::new(),
        });
        lifecycles.len() - 1
    });
    if let Lifecycle::Conditional { next, .. } = &mut lifecycles[index] {
        attach(next, rest, target);
    }
}

impl<V: Fact, Sc: Score> Network<V, Sc> {
    pub(crate) fn from_blueprint(
        blueprint: Arc<Blueprint<V, Sc>>,
        config: NetworkConfig,
    ) -> Result<Self, BuildError> {
        let active = active_streams(&blueprint)?;

        // Every non-filter stream in use owns its tuples; ids follow stream order.
        let mut layout = StoreLayout::new();
        let mut owners: Vec<Option<NodeIndex>> = vec![None; blueprint.streams.len()];
        let mut node_count = 0;
        for (i, def) in blueprint.streams.iter().enumerate() {
            if !active[i] || matches!(def.kind, StreamKind::Filter { .. }) {
                continue;
            }
            let own_slots = match def.kind {
                StreamKind::Group { .. } => GROUP_SLOT + 1,
                _ => 0,
            };
            layout.add_owner(node_count, own_slots);
            owners[i] = Some(node_count);
            node_count += 1;
        }

        let mut routes: Vec<Option<Route<V>>> = Vec::with_capacity(blueprint.streams.len());
        for (i, def) in blueprint.streams.iter().enumerate() {
            let route = match &def.kind {
                _ if !active[i] => None,
                StreamKind::Filter { parent, predicate } => {
                    let mut route = route_of(&routes, *parent)?.clone();
                    route.filters.push((StreamId(i), predicate.clone()));
                    Some(route)
                }
                _ => owners[i].map(|owner| Route {
                    owner,
                    filters: Vec::new(),
                }),
            };
            routes.push(route);
        }

        let mut nodes: Vec<Box<dyn Node<V>>> = Vec::with_capacity(node_count);
        let mut subscriptions: Vec<(StreamId, Lifecycle<V>)> = Vec::new();
        let mut sources = HashMap::new();
        let mut names = HashMap::new();
        for (i, def) in blueprint.streams.iter().enumerate() {
            let Some(node) = owners[i] else {
                continue;
            };
            let stream = StreamId(i);
            let built: Box<dyn Node<V>> = match &def.kind {
                StreamKind::Source { name } => {
                    sources.insert(stream, node);
                    names.insert(name.clone(), stream);
                    Box::new(SourceNode::new(node, name.clone()))
                }
                StreamKind::Filter { .. } => continue,
                StreamKind::Join {
                    left,
                    right,
                    joiners,
                } => {
                    let l = input_slots(&mut layout, &routes, *left)?;
                    let r = input_slots(&mut layout, &routes, *right)?;
                    subscriptions.push((*left, Lifecycle::Node { node, side: Side::Left }));
                    subscriptions.push((*right, Lifecycle::Node { node, side: Side::Right }));
                    Box::new(JoinNode::new(node, joiners, l, r))
                }
                StreamKind::Exists {
                    left,
                    right,
                    joiners,
                    should_exist,
                } => {
                    let l = input_slots(&mut layout, &routes, *left)?;
                    let r = input_slots(&mut layout, &routes, *right)?;
                    subscriptions.push((*left, Lifecycle::Node { node, side: Side::Left }));
                    subscriptions.push((*right, Lifecycle::Node { node, side: Side::Right }));
                    Box::new(ExistsNode::new(node, *should_exist, joiners, l, r))
                }
                StreamKind::Group {
                    parent,
                    keys,
                    collectors,
                } => {
                    let owner = route_of(&routes, *parent)?.owner;
                    let slots = GroupSlots {
                        group: layout.reserve(owner),
                        contributions: layout.reserve(owner),
                    };
                    subscriptions.push((*parent, Lifecycle::Node { node, side: Side::Left }));
                    Box::new(GroupNode::new(node, keys.clone(), collectors.clone(), slots))
                }
                StreamKind::Map { parent, mappings } => {
                    let slot = layout.reserve(route_of(&routes, *parent)?.owner);
                    subscriptions.push((*parent, Lifecycle::Node { node, side: Side::Left }));
                    Box::new(MapNode::new(node, mappings.clone(), slot))
                }
                StreamKind::Concat {
                    left,
                    right,
                    paddings,
                } => {
                    let left_slot = layout.reserve(route_of(&routes, *left)?.owner);
                    let right_slot = layout.reserve(route_of(&routes, *right)?.owner);
                    let (left_arity, right_arity) =
                        (blueprint.stream(*left)?.arity, blueprint.stream(*right)?.arity);
                    let (left_padding, right_padding) = if left_arity < right_arity {
                        (paddings.clone(), Vec::new())
                    } else {
                        (Vec::new(), paddings.clone())
                    };
                    subscriptions.push((*left, Lifecycle::Node { node, side: Side::Left }));
                    subscriptions.push((*right, Lifecycle::Node { node, side: Side::Right }));
                    Box::new(ConcatNode::new(
                        node,
                        (left_slot, left_padding),
                        (right_slot, right_padding),
                    ))
                }
            };
            nodes.push(built);
        }

        let mut scorers = Vec::with_capacity(blueprint.constraints.len());
        for (i, constraint) in blueprint.constraints.iter().enumerate() {
            let slot = layout.reserve(route_of(&routes, constraint.stream)?.owner);
            subscriptions.push((constraint.stream, Lifecycle::Scorer(i)));
            scorers.push(ScorerNode::new(
                constraint.constraint_ref.clone(),
                constraint.impact_type,
                constraint.weight,
                constraint.weigher.clone(),
                slot,
                config.constraint_match_enabled,
            ));
        }

        let mut lifecycles: Vec<Vec<Lifecycle<V>>> = (0..node_count).map(|_| Vec::new()).collect();
        for (stream, target) in subscriptions {
            let route = route_of(&routes, stream)?;
            attach(&mut lifecycles[route.owner], &route.filters, target);
        }

        let sizes = layout.into_sizes(node_count);
        debug!(
            event = "build",
            streams = blueprint.streams.len(),
            nodes = node_count,
            sources = sources.len(),
            constraints = scorers.len(),
            slots = sizes.iter().sum::<usize>(),
            mode = ?config.environment_mode,
        );
        let tuples = TupleArena::new(sizes, config.initial_tuple_capacity);

        Ok(Self {
            blueprint,
            config,
            nodes,
            lifecycles,
            scorers,
            routes,
            sources,
            names,
            tuples,
            score: Sc::zero(),
            changes: Vec::new(),
            poisoned: false,
        })
    }
}
