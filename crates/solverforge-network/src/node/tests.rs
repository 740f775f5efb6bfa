// Operator tests driven directly against a tuple arena.

use smallvec::smallvec;

use super::*;
use crate::collector::{count, sum};
use crate::joiner::{equal, filtering, greater_than};
use crate::test_utils::int_of;
use crate::tuple::TupleState;
use crate::{Mapping, Value};

const LEFT: NodeIndex = 0;
const RIGHT: NodeIndex = 1;
const OUT: NodeIndex = 2;

/// Input owners get four slots each; outputs one.
fn arena() -> TupleArena<Value> {
    TupleArena::new(vec![4, 4, 1], 16)
}

fn input(tuples: &mut TupleArena<Value>, owner: NodeIndex, facts: &[Value]) -> TupleId {
    let id = tuples.create(owner, facts.iter().cloned().collect());
    tuples.set_state(id, TupleState::Ok).unwrap();
    id
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().map(|&i| Value::Int(i)).collect()
}

/// Propagates `node`, frees retracted outputs and returns the changes.
fn settle(node: &mut dyn Node<Value>, tuples: &mut TupleArena<Value>) -> Vec<(Change, Vec<Value>)> {
    let mut changes = Vec::new();
    node.propagate(tuples, &mut changes).unwrap();
    changes
        .into_iter()
        .map(|(change, id)| {
            let facts = tuples.facts(id).unwrap().to_vec();
            if change == Change::Retract {
                tuples.free(id).unwrap();
            }
            (change, facts)
        })
        .collect()
}

const SLOTS: InputSlots = InputSlots { keys: 0, record: 1 };

#[test]
fn test_equal_join_emits_only_matching_pairs() {
    let mut tuples = arena();
    let mut join = JoinNode::new(OUT, &equal(Mapping::fact(0)), SLOTS, SLOTS);
    let a = input(&mut tuples, LEFT, &ints(&[1]));
    let b = input(&mut tuples, LEFT, &ints(&[2]));
    let b2 = input(&mut tuples, RIGHT, &ints(&[2]));
    let c = input(&mut tuples, RIGHT, &ints(&[3]));
    for (side, t) in [(Side::Left, a), (Side::Left, b), (Side::Right, b2), (Side::Right, c)] {
        join.insert(side, t, &mut tuples).unwrap();
    }
    assert_eq!(
        settle(&mut join, &mut tuples),
        vec![(Change::Insert, ints(&[2, 2]))]
    );

    join.retract(Side::Right, b2, &mut tuples).unwrap();
    assert_eq!(
        settle(&mut join, &mut tuples),
        vec![(Change::Retract, ints(&[2, 2]))]
    );
    assert_eq!(join.pair_count(), 0);
    // Retracting a tuple the join never saw does nothing.
    join.retract(Side::Right, b2, &mut tuples).unwrap();
}

#[test]
fn test_comparison_join_uses_declared_direction() {
    let mut tuples = arena();
    // left.end > right.start
    let joiners = greater_than(Mapping::fact(0), Mapping::fact(0));
    let mut join = JoinNode::new(OUT, &joiners, SLOTS, SLOTS);
    let start = input(&mut tuples, RIGHT, &ints(&[5]));
    join.insert(Side::Right, start, &mut tuples).unwrap();
    for end in [3, 7, 10, 4] {
        let t = input(&mut tuples, LEFT, &ints(&[end]));
        join.insert(Side::Left, t, &mut tuples).unwrap();
    }
    let mut inserted: Vec<Vec<Value>> = settle(&mut join, &mut tuples)
        .into_iter()
        .map(|(_, facts)| facts)
        .collect();
    inserted.sort();
    assert_eq!(inserted, vec![ints(&[7, 5]), ints(&[10, 5])]);
}

#[test]
fn test_join_update_retests_filter() {
    let mut tuples = arena();
    // Left tuples are (key, enabled); the pair passes while enabled.
    let joiners = equal(Mapping::fact(0))
        .and(filtering(|facts: &[Value]| facts[1].as_bool().unwrap_or(false)));
    let mut join = JoinNode::new(OUT, &joiners, SLOTS, SLOTS);
    let l = input(&mut tuples, LEFT, &[Value::Int(1), Value::Bool(true)]);
    let r = input(&mut tuples, RIGHT, &ints(&[1]));
    join.insert(Side::Left, l, &mut tuples).unwrap();
    join.insert(Side::Right, r, &mut tuples).unwrap();
    assert_eq!(settle(&mut join, &mut tuples).len(), 1);

    tuples.get_mut(l).unwrap().facts = smallvec![Value::Int(1), Value::Bool(false)];
    join.update(Side::Left, l, &mut tuples).unwrap();
    assert_eq!(
        settle(&mut join, &mut tuples),
        vec![(Change::Retract, vec![Value::Int(1), Value::Bool(true), Value::Int(1)])]
    );
    assert_eq!(join.pair_count(), 0);

    tuples.get_mut(l).unwrap().facts = smallvec![Value::Int(1), Value::Bool(true)];
    join.update(Side::Left, l, &mut tuples).unwrap();
    assert_eq!(
        settle(&mut join, &mut tuples),
        vec![(Change::Insert, vec![Value::Int(1), Value::Bool(true), Value::Int(1)])]
    );
}

#[test]
fn test_join_key_change_moves_pairs() {
    let mut tuples = arena();
    let mut join = JoinNode::new(OUT, &equal(Mapping::fact(0)), SLOTS, SLOTS);
    let l = input(&mut tuples, LEFT, &ints(&[1]));
    let r1 = input(&mut tuples, RIGHT, &ints(&[1]));
    let r2 = input(&mut tuples, RIGHT, &ints(&[2]));
    for (side, t) in [(Side::Left, l), (Side::Right, r1), (Side::Right, r2)] {
        join.insert(side, t, &mut tuples).unwrap();
    }
    settle(&mut join, &mut tuples);

    tuples.get_mut(l).unwrap().facts = smallvec![Value::Int(2)];
    join.update(Side::Left, l, &mut tuples).unwrap();
    assert_eq!(
        settle(&mut join, &mut tuples),
        vec![
            (Change::Retract, ints(&[1, 1])),
            (Change::Insert, ints(&[2, 2])),
        ]
    );
}

#[test]
fn test_exists_flips_with_right_matches() {
    let mut tuples = arena();
    let mut exists = ExistsNode::new(OUT, true, &equal(Mapping::fact(0)), SLOTS, SLOTS);
    let p = input(&mut tuples, LEFT, &ints(&[7]));
    exists.insert(Side::Left, p, &mut tuples).unwrap();
    assert!(settle(&mut exists, &mut tuples).is_empty());

    let q = input(&mut tuples, RIGHT, &ints(&[7]));
    let q2 = input(&mut tuples, RIGHT, &ints(&[7]));
    exists.insert(Side::Right, q, &mut tuples).unwrap();
    exists.insert(Side::Right, q2, &mut tuples).unwrap();
    assert_eq!(
        settle(&mut exists, &mut tuples),
        vec![(Change::Insert, ints(&[7]))]
    );
    assert_eq!(exists.count_of(p), Some(2));

    exists.retract(Side::Right, q, &mut tuples).unwrap();
    assert!(settle(&mut exists, &mut tuples).is_empty());
    exists.retract(Side::Right, q2, &mut tuples).unwrap();
    assert_eq!(
        settle(&mut exists, &mut tuples),
        vec![(Change::Retract, ints(&[7]))]
    );
    assert_eq!(exists.count_of(p), Some(0));
}

#[test]
fn test_not_exists_with_filter_tracks_pairs() {
    let mut tuples = arena();
    let joiners = equal(Mapping::fact(0)).and(filtering(|facts: &[Value]| facts[0] != facts[1]));
    let mut missing = ExistsNode::new(OUT, false, &joiners, SLOTS, SLOTS);
    let p = input(&mut tuples, LEFT, &[Value::from("a")]);
    missing.insert(Side::Left, p, &mut tuples).unwrap();
    assert_eq!(settle(&mut missing, &mut tuples).len(), 1);

    // Equal keys, but the filter never passes for equal facts.
    let q = input(&mut tuples, RIGHT, &[Value::from("a")]);
    missing.insert(Side::Right, q, &mut tuples).unwrap();
    assert!(settle(&mut missing, &mut tuples).is_empty());
    assert_eq!(missing.count_of(p), Some(0));
    missing.retract(Side::Right, q, &mut tuples).unwrap();
    missing.retract(Side::Left, p, &mut tuples).unwrap();
    assert_eq!(
        settle(&mut missing, &mut tuples),
        vec![(Change::Retract, vec![Value::from("a")])]
    );
}

#[test]
fn test_exists_filtered_updates_keep_output_when_existence_holds() {
    let mut tuples = arena();
    let joiners = equal(Mapping::fact(0)).and(filtering(|_: &[Value]| true));
    let mut exists = ExistsNode::new(OUT, true, &joiners, SLOTS, SLOTS);
    let l = input(&mut tuples, LEFT, &ints(&[7, 1]));
    let r = input(&mut tuples, RIGHT, &ints(&[7, 1]));
    exists.insert(Side::Left, l, &mut tuples).unwrap();
    exists.insert(Side::Right, r, &mut tuples).unwrap();
    assert_eq!(
        settle(&mut exists, &mut tuples),
        vec![(Change::Insert, ints(&[7, 1]))]
    );

    // Same key, other column: re-tested, still one match.
    tuples.get_mut(r).unwrap().facts = smallvec![Value::Int(7), Value::Int(2)];
    exists.update(Side::Right, r, &mut tuples).unwrap();
    assert!(settle(&mut exists, &mut tuples).is_empty());
    assert_eq!(exists.count_of(l), Some(1));

    // The left moves to a key that also has a match.
    let r8 = input(&mut tuples, RIGHT, &ints(&[8, 1]));
    exists.insert(Side::Right, r8, &mut tuples).unwrap();
    assert!(settle(&mut exists, &mut tuples).is_empty());
    tuples.get_mut(l).unwrap().facts = smallvec![Value::Int(8), Value::Int(1)];
    exists.update(Side::Left, l, &mut tuples).unwrap();
    assert_eq!(
        settle(&mut exists, &mut tuples),
        vec![(Change::Update, ints(&[8, 1]))]
    );
    assert_eq!(exists.count_of(l), Some(1));

    // Moving the right away from the left's key still flips it.
    tuples.get_mut(r8).unwrap().facts = smallvec![Value::Int(9), Value::Int(1)];
    exists.update(Side::Right, r8, &mut tuples).unwrap();
    assert_eq!(
        settle(&mut exists, &mut tuples),
        vec![(Change::Retract, ints(&[8, 1]))]
    );
    assert_eq!(exists.count_of(l), Some(0));
}

#[test]
fn test_exists_key_changes_absorbed_into_count() {
    let mut tuples = arena();
    let mut exists = ExistsNode::new(OUT, true, &equal(Mapping::fact(0)), SLOTS, SLOTS);
    let l = input(&mut tuples, LEFT, &ints(&[7]));
    let a = input(&mut tuples, RIGHT, &ints(&[7]));
    let b = input(&mut tuples, RIGHT, &ints(&[7]));
    for (side, t) in [(Side::Left, l), (Side::Right, a), (Side::Right, b)] {
        exists.insert(side, t, &mut tuples).unwrap();
    }
    assert_eq!(settle(&mut exists, &mut tuples).len(), 1);

    tuples.get_mut(a).unwrap().facts = smallvec![Value::Int(8)];
    exists.update(Side::Right, a, &mut tuples).unwrap();
    assert!(settle(&mut exists, &mut tuples).is_empty());
    assert_eq!(exists.count_of(l), Some(1));

    tuples.get_mut(l).unwrap().facts = smallvec![Value::Int(8)];
    exists.update(Side::Left, l, &mut tuples).unwrap();
    assert_eq!(
        settle(&mut exists, &mut tuples),
        vec![(Change::Update, ints(&[8]))]
    );
    assert_eq!(exists.count_of(l), Some(1));

    // Both rights gone: the re-keyed index entry is the one removed.
    exists.retract(Side::Right, a, &mut tuples).unwrap();
    exists.retract(Side::Right, b, &mut tuples).unwrap();
    assert_eq!(
        settle(&mut exists, &mut tuples),
        vec![(Change::Retract, ints(&[8]))]
    );
    exists.retract(Side::Left, l, &mut tuples).unwrap();
    assert!(settle(&mut exists, &mut tuples).is_empty());
}

fn color_count() -> GroupNode<Value> {
    GroupNode::new(
        OUT,
        vec![Mapping::fact(0)],
        vec![count()],
        GroupSlots {
            group: 2,
            contributions: 3,
        },
    )
}

fn sorted(mut changes: Vec<(Change, Vec<Value>)>) -> Vec<(Change, Vec<Value>)> {
    changes.sort_by(|a, b| a.1.cmp(&b.1));
    changes
}

#[test]
fn test_group_count_follows_key_changes() {
    let mut tuples = arena();
    let mut group = color_count();
    let red = Value::from("red");
    let blue = Value::from("blue");
    let x = input(&mut tuples, LEFT, &[red.clone()]);
    let y = input(&mut tuples, LEFT, &[red.clone()]);
    let z = input(&mut tuples, LEFT, &[blue.clone()]);
    for t in [x, y, z] {
        group.insert(Side::Left, t, &mut tuples).unwrap();
    }
    assert_eq!(
        sorted(settle(&mut group, &mut tuples)),
        vec![
            (Change::Insert, vec![blue.clone(), Value::Int(1)]),
            (Change::Insert, vec![red.clone(), Value::Int(2)]),
        ]
    );

    tuples.get_mut(z).unwrap().facts = smallvec![red.clone()];
    group.update(Side::Left, z, &mut tuples).unwrap();
    assert_eq!(
        settle(&mut group, &mut tuples),
        vec![
            (Change::Retract, vec![blue, Value::Int(1)]),
            (Change::Update, vec![red, Value::Int(3)]),
        ]
    );
    assert_eq!(group.group_count(), 1);
}

#[test]
fn test_group_returns_to_empty_and_drops_unchanged_updates() {
    let mut tuples = arena();
    let mut group = GroupNode::new(
        OUT,
        vec![Mapping::new(|facts: &[Value]| Value::Int(int_of(facts) % 2))],
        vec![sum(int_of)],
        GroupSlots {
            group: 2,
            contributions: 3,
        },
    );
    let a = input(&mut tuples, LEFT, &ints(&[2]));
    let b = input(&mut tuples, LEFT, &ints(&[4]));
    group.insert(Side::Left, a, &mut tuples).unwrap();
    group.insert(Side::Left, b, &mut tuples).unwrap();
    assert_eq!(
        settle(&mut group, &mut tuples),
        vec![(Change::Insert, ints(&[0, 6]))]
    );

    // 2 -> 4 and 4 -> 2 leave the sum alone.
    tuples.get_mut(a).unwrap().facts = smallvec![Value::Int(4)];
    tuples.get_mut(b).unwrap().facts = smallvec![Value::Int(2)];
    group.update(Side::Left, a, &mut tuples).unwrap();
    group.update(Side::Left, b, &mut tuples).unwrap();
    assert!(settle(&mut group, &mut tuples).is_empty());

    group.retract(Side::Left, a, &mut tuples).unwrap();
    group.retract(Side::Left, b, &mut tuples).unwrap();
    assert_eq!(
        settle(&mut group, &mut tuples),
        vec![(Change::Retract, ints(&[0, 6]))]
    );
    assert_eq!(group.group_count(), 0);
    for t in [a, b] {
        assert!(tuples.slot(t, 2).unwrap().is_empty());
        assert!(tuples.slot(t, 3).unwrap().is_empty());
    }
}

#[test]
fn test_map_skips_unchanged_projection() {
    let mut tuples = arena();
    let parity = Mapping::new(|facts: &[Value]| Value::Int(int_of(facts) % 2));
    let mut map = MapNode::new(OUT, vec![parity], 0);
    let t = input(&mut tuples, LEFT, &ints(&[3]));
    map.insert(Side::Left, t, &mut tuples).unwrap();
    assert_eq!(settle(&mut map, &mut tuples), vec![(Change::Insert, ints(&[1]))]);

    tuples.get_mut(t).unwrap().facts = smallvec![Value::Int(5)];
    map.update(Side::Left, t, &mut tuples).unwrap();
    assert!(settle(&mut map, &mut tuples).is_empty());

    tuples.get_mut(t).unwrap().facts = smallvec![Value::Int(6)];
    map.update(Side::Left, t, &mut tuples).unwrap();
    assert_eq!(settle(&mut map, &mut tuples), vec![(Change::Update, ints(&[0]))]);
}

#[test]
fn test_concat_pads_shorter_side() {
    let mut tuples = arena();
    let pad = Mapping::new(|facts: &[Value]| {
        Value::Int(facts[0].as_int().unwrap_or(0) + facts[1].as_int().unwrap_or(0))
    });
    let mut concat = ConcatNode::new(OUT, (0, vec![pad]), (0, Vec::new()));
    let pair = input(&mut tuples, LEFT, &ints(&[1, 2]));
    let triple = input(&mut tuples, RIGHT, &ints(&[3, 4, 5]));
    concat.insert(Side::Left, pair, &mut tuples).unwrap();
    concat.insert(Side::Right, triple, &mut tuples).unwrap();
    assert_eq!(
        settle(&mut concat, &mut tuples),
        vec![
            (Change::Insert, ints(&[1, 2, 3])),
            (Change::Insert, ints(&[3, 4, 5])),
        ]
    );
}

#[test]
fn test_insert_then_retract_in_one_tick_is_invisible() {
    let mut tuples = arena();
    let mut map = MapNode::new(OUT, vec![Mapping::fact(0)], 0);
    let t = input(&mut tuples, LEFT, &ints(&[1]));
    map.insert(Side::Left, t, &mut tuples).unwrap();
    map.retract(Side::Left, t, &mut tuples).unwrap();
    assert!(settle(&mut map, &mut tuples).is_empty());
    assert_eq!(tuples.live(), 1);
    assert_eq!(tuples.owned_by(OUT).count(), 0);
}

#[test]
fn test_queue_reports_retracts_then_updates_then_inserts() {
    let mut tuples = arena();
    let mut queue = PropagationQueue::new(OUT);
    let kept = queue.insert(&mut tuples, smallvec![Value::Int(1)]);
    let dropped = queue.insert(&mut tuples, smallvec![Value::Int(2)]);
    let mut changes = Vec::new();
    queue.propagate(&mut tuples, &mut changes).unwrap();
    assert_eq!(changes.len(), 2);

    changes.clear();
    let fresh = queue.insert(&mut tuples, smallvec![Value::Int(3)]);
    queue.update(&mut tuples, kept).unwrap();
    queue.update(&mut tuples, kept).unwrap();
    queue.retract(&mut tuples, dropped).unwrap();
    queue.propagate(&mut tuples, &mut changes).unwrap();
    assert_eq!(
        changes,
        vec![
            (Change::Retract, dropped),
            (Change::Update, kept),
            (Change::Insert, fresh),
        ]
    );
    assert_eq!(tuples.state(dropped).unwrap(), TupleState::Dead);
    assert!(queue.is_empty());
}

#[test]
fn test_queue_rejects_transitions_of_dead_tuples() {
    let mut tuples = arena();
    let mut queue = PropagationQueue::new(OUT);
    let t = queue.insert(&mut tuples, smallvec![Value::Int(1)]);
    let mut changes = Vec::new();
    queue.propagate(&mut tuples, &mut changes).unwrap();
    queue.retract(&mut tuples, t).unwrap();
    queue.propagate(&mut tuples, &mut changes).unwrap();
    assert!(matches!(
        queue.update(&mut tuples, t),
        Err(crate::NetworkError::Corrupted(_))
    ));
}
