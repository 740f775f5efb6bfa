// End-to-end tests of built networks.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use solverforge_config::{EnvironmentMode, NetworkConfig};
use solverforge_core::{ConstraintRef, HardSoftScore, SimpleScore};

use super::*;
use crate::collector::{count, sum, to_list};
use crate::joiner::{equal, equal_bi, filtering, greater_than, less_than, Joiners};
use crate::test_utils::{build, field, init_tracing, int_of, ints, penalize_each, record, tracked};
use crate::{FunctionRole, Mapping, MatchWeigher, NetworkBuilder, Value};

fn lesson(id: i64, room: i64, slot: i64) -> Value {
    record([Value::Int(id), Value::Int(room), Value::Int(slot)])
}

fn id_of(fact: &Value) -> i64 {
    fact.field(0).as_int().unwrap_or(-1)
}

#[test]
fn test_equal_join_matches_only_shared_ids() {
    init_tracing();
    let mut b = NetworkBuilder::<Value, SimpleScore>::new();
    let lefts = b.for_each("left").unwrap();
    let rights = b.for_each("right").unwrap();
    let pairs = b.join(lefts, rights, equal(Mapping::fact(0))).unwrap();
    penalize_each(&mut b, pairs, "Shared id", SimpleScore::ONE);
    let mut network = build(b);

    let a = network.insert(lefts, Value::from("A")).unwrap();
    let b_left = network.insert(lefts, Value::from("B")).unwrap();
    let b_right = network.insert(rights, Value::from("B")).unwrap();
    network.insert(rights, Value::from("C")).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(-1));
    assert_eq!(
        network.tuples(pairs).unwrap(),
        vec![vec![Value::from("B"), Value::from("B")]]
    );

    network.retract(b_left).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(1));
    assert!(network.tuples(pairs).unwrap().is_empty());

    // Same outcome when the match is broken from the right.
    network.insert(lefts, Value::from("B")).unwrap();
    network.flush().unwrap();
    assert_eq!(network.tuples(pairs).unwrap().len(), 1);
    network.retract(b_right).unwrap();
    network.flush().unwrap();
    assert!(network.tuples(pairs).unwrap().is_empty());
    assert_eq!(network.score(), SimpleScore::of(0));

    network.update(a, Value::from("C")).unwrap();
    network.flush().unwrap();
    assert_eq!(
        network.tuples(pairs).unwrap(),
        vec![vec![Value::from("C"), Value::from("C")]]
    );
}

#[test]
fn test_group_count_by_color() {
    let mut b = NetworkBuilder::<Value, SimpleScore>::new();
    let things = b.for_each("thing").unwrap();
    let colors = b.group_by(things, vec![field(0, 1)], vec![count()]).unwrap();
    penalize_each(&mut b, colors, "Colors", SimpleScore::ONE);
    let mut network = build(b);

    let thing = |name: &str, color: &str| record([Value::from(name), Value::from(color)]);
    network.insert(things, thing("x", "red")).unwrap();
    network.insert(things, thing("y", "red")).unwrap();
    let z = network.insert(things, thing("z", "blue")).unwrap();
    network.flush().unwrap();
    assert_eq!(
        network.tuples(colors).unwrap(),
        vec![
            vec![Value::from("blue"), Value::Int(1)],
            vec![Value::from("red"), Value::Int(2)],
        ]
    );

    network.update(z, thing("z", "red")).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(1));
    assert_eq!(
        network.tuples(colors).unwrap(),
        vec![vec![Value::from("red"), Value::Int(3)]]
    );
}

#[test]
fn test_greater_than_join() {
    let mut b = NetworkBuilder::<Value, SimpleScore>::new();
    let ends = b.for_each("end").unwrap();
    let starts = b.for_each("start").unwrap();
    let after = b
        .join(ends, starts, greater_than(Mapping::fact(0), Mapping::fact(0)))
        .unwrap();
    penalize_each(&mut b, after, "After", SimpleScore::ONE);
    let mut network = build(b);

    network.insert(starts, Value::Int(5)).unwrap();
    for end in [3, 7, 10] {
        network.insert(ends, Value::Int(end)).unwrap();
    }
    network.flush().unwrap();
    assert_eq!(ints(network.tuples(after).unwrap()), vec![vec![7, 5], vec![10, 5]]);

    network.insert(ends, Value::Int(4)).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(0));
    network.insert(ends, Value::Int(6)).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(-1));
    assert_eq!(network.constraint_results()[0].match_count, 3);
}

#[test]
fn test_exists_follows_matching_right_facts() {
    let mut b = NetworkBuilder::<Value, SimpleScore>::new();
    let people = b.for_each("person").unwrap();
    let rooms = b.for_each("booking").unwrap();
    let booked = b
        .if_exists(people, rooms, equal_bi(field(0, 1), field(0, 0)))
        .unwrap();
    penalize_each(&mut b, booked, "Booked", SimpleScore::ONE);
    let mut network = build(b);

    let p = record([Value::from("p"), Value::Int(101)]);
    network.insert(people, p.clone()).unwrap();
    network.flush().unwrap();
    assert!(network.tuples(booked).unwrap().is_empty());

    let q = network.insert(rooms, record([Value::Int(101)])).unwrap();
    network.insert(rooms, record([Value::Int(101)])).unwrap();
    network.insert(rooms, record([Value::Int(202)])).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(-1));
    assert_eq!(network.tuples(booked).unwrap(), vec![vec![p.clone()]]);

    network.retract(q).unwrap();
    network.flush().unwrap();
    assert_eq!(network.tuples(booked).unwrap(), vec![vec![p]]);
}

#[test]
fn test_exists_flips_back_when_last_match_leaves() {
    let mut b = NetworkBuilder::<Value, SimpleScore>::new();
    let people = b.for_each("person").unwrap();
    let rooms = b.for_each("booking").unwrap();
    let booked = b.if_exists(people, rooms, equal(Mapping::fact(0))).unwrap();
    let unbooked = b.if_not_exists(people, rooms, equal(Mapping::fact(0))).unwrap();
    penalize_each(&mut b, booked, "Booked", SimpleScore::ONE);
    penalize_each(&mut b, unbooked, "Unbooked", SimpleScore::of(10));
    let mut network = build(b);

    network.insert(people, Value::Int(1)).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(-10));
    let q = network.insert(rooms, Value::Int(1)).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(9));
    assert_eq!(ints(network.tuples(booked).unwrap()), vec![vec![1]]);
    assert!(network.tuples(unbooked).unwrap().is_empty());
    network.retract(q).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(-9));
    assert!(network.tuples(booked).unwrap().is_empty());
}

#[test]
fn test_concat_pads_the_shorter_stream() {
    let mut b = NetworkBuilder::<Value, SimpleScore>::new();
    let a = b.for_each("a").unwrap();
    let c = b.for_each("c").unwrap();
    let plus = |n: i64| Mapping::new(move |facts: &[Value]| Value::Int(int_of(facts) + n));
    let pairs = b.map(a, vec![Mapping::fact(0), plus(1)]).unwrap();
    let triples = b.map(c, vec![Mapping::fact(0), plus(1), plus(2)]).unwrap();
    let pad = Mapping::new(|facts: &[Value]| {
        Value::Int(facts[0].as_int().unwrap_or(0) + facts[1].as_int().unwrap_or(0))
    });
    let both = b.concat(pairs, triples, vec![pad]).unwrap();
    penalize_each(&mut b, both, "Both", SimpleScore::ONE);
    let mut network = build(b);

    network.insert(a, Value::Int(1)).unwrap();
    network.insert(c, Value::Int(3)).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(-2));
    assert_eq!(
        ints(network.tuples(both).unwrap()),
        vec![vec![1, 2, 3], vec![3, 4, 5]]
    );
}

#[test]
fn test_weigher_impact_is_undone_on_retract() {
    let mut b = NetworkBuilder::<Value, SimpleScore>::new();
    let shifts = b.for_each("shift").unwrap();
    b.penalize(
        shifts,
        ConstraintRef::named("Long shift"),
        SimpleScore::ONE,
        MatchWeigher::int(|_| 5),
    )
    .unwrap();
    let mut network = build(b);

    let shift = network.insert(shifts, Value::from("night")).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(-5));
    network.retract(shift).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(5));
    assert_eq!(network.score(), SimpleScore::of(0));
    assert_eq!(network.flush().unwrap(), SimpleScore::of(0));
}

#[test]
fn test_extreme_impacts_saturate_instead_of_overflowing() {
    let mut b = NetworkBuilder::<Value, SimpleScore>::new();
    let shifts = b.for_each("shift").unwrap();
    b.penalize(
        shifts,
        ConstraintRef::named("Unbounded"),
        SimpleScore::ONE,
        MatchWeigher::long(|_: &[Value]| i64::MAX),
    )
    .unwrap();
    let mut network = build(b);

    network.insert(shifts, Value::from("day")).unwrap();
    network.insert(shifts, Value::from("night")).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(i64::MIN));
    assert_eq!(network.score(), SimpleScore::of(i64::MIN));
}

#[test]
fn test_filter_gates_updates() {
    let mut b = NetworkBuilder::<Value, SimpleScore>::new();
    let lessons = b.for_each("lesson").unwrap();
    let early = b
        .filter(lessons, |facts: &[Value]| facts[0].field(2) == &Value::Int(0))
        .unwrap();
    let early_rooms = b.map(early, vec![field(0, 1)]).unwrap();
    penalize_each(&mut b, early, "Early", SimpleScore::ONE);
    penalize_each(&mut b, early_rooms, "Early room", SimpleScore::of(10));
    let mut network = build(b);

    let l = network.insert(lessons, lesson(1, 7, 1)).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(0));
    network.update(l, lesson(1, 7, 0)).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(-11));
    assert_eq!(ints(network.tuples(early_rooms).unwrap()), vec![vec![7]]);
    network.update(l, lesson(1, 8, 0)).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(0));
    assert_eq!(ints(network.tuples(early_rooms).unwrap()), vec![vec![8]]);
    network.update(l, lesson(1, 8, 2)).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(11));
    assert!(network.tuples(early).unwrap().is_empty());
    assert_eq!(network.tuples(lessons).unwrap().len(), 1);
}

#[test]
fn test_changes_within_one_flush_net_out() {
    let mut b = NetworkBuilder::<Value, SimpleScore>::new();
    let lessons = b.for_each("lesson").unwrap();
    penalize_each(&mut b, lessons, "Each", SimpleScore::ONE);
    let mut network = build(b);

    let l = network.insert(lessons, lesson(1, 1, 1)).unwrap();
    network.update(l, lesson(1, 2, 2)).unwrap();
    network.retract(l).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(0));
    assert_eq!(network.live_tuples(), 0);
    assert!(matches!(
        network.update(l, lesson(1, 3, 3)),
        Err(NetworkError::InvalidHandle(_))
    ));
}

#[test]
fn test_shared_join_is_built_once() {
    let mut b = NetworkBuilder::<Value, SimpleScore>::new();
    let lessons = b.for_each("lesson").unwrap();
    let by_room = b.join(lessons, lessons, equal(field(0, 1))).unwrap();
    let again = b.join(lessons, lessons, equal(field(0, 1))).unwrap();
    assert_ne!(by_room, again);
    let room = field(0, 1);
    let first = b.join(lessons, lessons, equal(room.clone())).unwrap();
    let second = b.join(lessons, lessons, equal(room)).unwrap();
    assert_eq!(first, second);
    penalize_each(&mut b, first, "Hard", SimpleScore::of(2));
    penalize_each(&mut b, second, "Soft", SimpleScore::ONE);
    let mut network = build(b);

    network.insert(lessons, lesson(1, 1, 1)).unwrap();
    network.insert(lessons, lesson(2, 1, 2)).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(-12));
    // Two facts and four ordered pairs, including each lesson with itself.
    assert_eq!(network.live_tuples(), 6);
    let results = network.constraint_results();
    assert_eq!(results[0].match_count, 4);
    assert_eq!(results[1].match_count, 4);
}

#[test]
fn test_handles_are_checked() {
    let mut b = NetworkBuilder::<Value, SimpleScore>::new();
    let lessons = b.for_each("lesson").unwrap();
    let rooms = b.for_each("room").unwrap();
    let mapped = b.map(lessons, vec![Mapping::fact(0)]).unwrap();
    penalize_each(&mut b, mapped, "Each", SimpleScore::ONE);
    let mut network = build(b);

    let l = network.insert(lessons, lesson(1, 1, 1)).unwrap();
    assert!(matches!(
        network.insert(mapped, lesson(2, 1, 1)),
        Err(NetworkError::UnknownSource(_))
    ));
    let foreign = FactHandle {
        source: rooms,
        tuple: l.tuple,
    };
    assert!(matches!(
        network.retract(foreign),
        Err(NetworkError::InvalidHandle(_))
    ));
    network.retract(l).unwrap();
    assert!(matches!(network.retract(l), Err(NetworkError::InvalidHandle(_))));
    network.flush().unwrap();
    assert!(matches!(network.retract(l), Err(NetworkError::InvalidHandle(_))));
    assert!(!network.is_poisoned());
    assert_eq!(l.source(), lessons);
}

#[test]
fn test_failing_user_function_poisons_network() {
    let mut b = NetworkBuilder::<Value, SimpleScore>::new();
    let lessons = b.for_each("lesson").unwrap();
    let checked = b
        .filter(lessons, |facts: &[Value]| {
            if id_of(&facts[0]) == 13 {
                panic!("unlucky lesson");
            }
            true
        })
        .unwrap();
    penalize_each(&mut b, checked, "Each", SimpleScore::ONE);
    let mut network = build(b);

    network.insert(lessons, lesson(1, 1, 1)).unwrap();
    network.flush().unwrap();
    network.insert(lessons, lesson(13, 1, 1)).unwrap();
    match network.flush() {
        Err(NetworkError::UserFunction {
            operator,
            role,
            facts,
            message,
        }) => {
            assert_eq!(operator, "filter");
            assert_eq!(role, FunctionRole::Predicate);
            assert!(facts.contains("13"));
            assert_eq!(message, "unlucky lesson");
        }
        other => panic!("expected a user function error, got {:?}", other.map(|_| ())),
    }
    assert!(network.is_poisoned());
    assert!(matches!(
        network.insert(lessons, lesson(2, 1, 1)),
        Err(NetworkError::Poisoned)
    ));
    assert!(matches!(network.flush(), Err(NetworkError::Poisoned)));
}

#[test]
fn test_asserted_flush_detects_stale_impacts() {
    let weight = Arc::new(AtomicI64::new(1));
    let mut b = NetworkBuilder::<Value, SimpleScore>::new();
    let lessons = b.for_each("lesson").unwrap();
    let read = Arc::clone(&weight);
    b.penalize(
        lessons,
        ConstraintRef::named("Drifting"),
        SimpleScore::ONE,
        MatchWeigher::long(move |_| read.load(Ordering::SeqCst)),
    )
    .unwrap();
    let config = NetworkConfig::default().with_environment_mode(EnvironmentMode::FastAssert);
    let mut network = b.build(&config).unwrap();

    network.insert(lessons, lesson(1, 1, 1)).unwrap();
    assert_eq!(network.flush().unwrap(), SimpleScore::of(-1));
    weight.store(3, Ordering::SeqCst);
    network.insert(lessons, lesson(2, 1, 1)).unwrap();
    match network.flush() {
        Err(NetworkError::ScoreCorruption {
            incremental,
            recomputed,
            ..
        }) => {
            assert_eq!(incremental, "-4");
            assert_eq!(recomputed, "-6");
        }
        other => panic!("expected score corruption, got {:?}", other),
    }
    assert!(network.is_poisoned());
}

#[test]
fn test_full_assert_compares_match_counts() {
    let keep = Arc::new(AtomicUsize::new(1));
    let mut b = NetworkBuilder::<Value, SimpleScore>::new();
    let lessons = b.for_each("lesson").unwrap();
    let read = Arc::clone(&keep);
    let kept = b
        .filter(lessons, move |_: &[Value]| read.load(Ordering::SeqCst) == 1)
        .unwrap();
    b.penalize(kept, ConstraintRef::named("Kept"), SimpleScore::ONE, MatchWeigher::one())
        .unwrap();
    let config = NetworkConfig::default().with_environment_mode(EnvironmentMode::FullAssert);
    let mut network = b.build(&config).unwrap();

    network.insert(lessons, lesson(1, 1, 1)).unwrap();
    network.flush().unwrap();
    keep.store(0, Ordering::SeqCst);
    network.insert(lessons, lesson(2, 1, 1)).unwrap();
    match network.flush() {
        Err(NetworkError::ScoreCorruption { detail, .. }) => {
            assert!(detail.contains("Kept"), "{}", detail);
        }
        other => panic!("expected score corruption, got {:?}", other),
    }
}

#[test]
fn test_explain_and_indictments() {
    let mut b = NetworkBuilder::<Value, HardSoftScore>::new();
    let lessons = b.for_each("lesson").unwrap();
    let conflicts = b
        .join(
            lessons,
            lessons,
            equal(field(0, 1))
                .and(equal(field(0, 2)))
                .and(filtering(|facts: &[Value]| id_of(&facts[0]) < id_of(&facts[1]))),
        )
        .unwrap();
    b.penalize(
        conflicts,
        ConstraintRef::new("school", "Room conflict"),
        HardSoftScore::ONE_HARD,
        MatchWeigher::one(),
    )
    .unwrap();
    b.reward(
        lessons,
        ConstraintRef::named("Taught"),
        HardSoftScore::ONE_SOFT,
        MatchWeigher::one(),
    )
    .unwrap();
    let mut network = b.build(&tracked()).unwrap();

    let (x, y, z) = (lesson(1, 5, 0), lesson(2, 5, 0), lesson(3, 5, 0));
    for l in [&x, &y, &z] {
        network.insert(lessons, l.clone()).unwrap();
    }
    network.insert(lessons, lesson(4, 6, 0)).unwrap();
    assert_eq!(network.flush().unwrap(), HardSoftScore::of(-3, 4));

    let explanation = network.explain().unwrap();
    assert_eq!(explanation.score, HardSoftScore::of(-3, 4));
    let conflict = explanation.analysis("school/Room conflict").unwrap();
    assert_eq!(conflict.match_count(), 3);
    assert!(conflict.is_hard);
    assert_eq!(conflict.matches[0].justification.facts, vec![x.clone(), y.clone()]);
    assert_eq!(explanation.total_match_count(), 7);
    assert_eq!(explanation.non_zero_constraints().len(), 2);

    let indictments = network.indictments().unwrap();
    let of_x = indictments.get(&x).unwrap();
    assert_eq!(of_x.score, HardSoftScore::of(-2, 1));
    assert_eq!(of_x.match_count(), 3);
    assert_eq!(of_x.constraint_count(), 2);
    assert_eq!(indictments.len(), 4);
    assert_eq!(indictments.worst_facts()[0], &x);
}

#[test]
fn test_match_tracking_must_be_enabled() {
    let mut b = NetworkBuilder::<Value, SimpleScore>::new();
    let lessons = b.for_each("lesson").unwrap();
    penalize_each(&mut b, lessons, "Each", SimpleScore::ONE);
    let mut network = b.build(&NetworkConfig::default()).unwrap();
    network.insert(lessons, lesson(1, 1, 1)).unwrap();
    network.flush().unwrap();
    assert!(matches!(network.explain(), Err(NetworkError::MatchTrackingDisabled)));
    assert!(matches!(
        network.indictments(),
        Err(NetworkError::MatchTrackingDisabled)
    ));
    assert!(!network.is_poisoned());
    assert_eq!(network.constraint_results()[0].match_count, 1);
}

/// Streams of the timetabling model, for comparing networks.
struct Model {
    lessons: StreamId,
    inspected: Vec<StreamId>,
}

fn timetabling(config: &NetworkConfig) -> (Network<Value, HardSoftScore>, Model) {
    let slot_of = |facts: &[Value]| facts[0].field(2).as_int().unwrap_or(0);
    let mut b = NetworkBuilder::<Value, HardSoftScore>::new();
    let lessons = b.for_each("lesson").unwrap();

    let conflicts = b
        .join(
            lessons,
            lessons,
            equal(field(0, 1))
                .and(equal(field(0, 2)))
                .and(filtering(|facts: &[Value]| id_of(&facts[0]) < id_of(&facts[1]))),
        )
        .unwrap();
    b.penalize(
        conflicts,
        ConstraintRef::named("Room conflict"),
        HardSoftScore::ONE_HARD,
        MatchWeigher::one(),
    )
    .unwrap();

    let load = b
        .group_by(
            lessons,
            vec![field(0, 1)],
            vec![count(), sum(slot_of), to_list(field(0, 0))],
        )
        .unwrap();
    b.penalize(
        load,
        ConstraintRef::named("Room load"),
        HardSoftScore::ONE_SOFT,
        MatchWeigher::long(|facts: &[Value]| facts[1].as_int().unwrap_or(0)),
    )
    .unwrap();

    let alone = b
        .if_not_exists(
            lessons,
            lessons,
            equal(field(0, 2)).and(filtering(|facts: &[Value]| id_of(&facts[0]) != id_of(&facts[1]))),
        )
        .unwrap();
    b.reward(
        alone,
        ConstraintRef::named("Alone in slot"),
        HardSoftScore::ONE_SOFT,
        MatchWeigher::one(),
    )
    .unwrap();

    let gaps = b
        .join(
            lessons,
            lessons,
            equal(field(0, 1)).and(less_than(field(0, 2), field(0, 2))),
        )
        .unwrap();
    b.penalize(
        gaps,
        ConstraintRef::named("Room gap"),
        HardSoftScore::ONE_SOFT,
        MatchWeigher::long(|facts: &[Value]| {
            let slot = |f: &Value| f.field(2).as_int().unwrap_or(0);
            slot(&facts[1]) - slot(&facts[0])
        }),
    )
    .unwrap();

    let first = b
        .filter(lessons, |facts: &[Value]| facts[0].field(2) == &Value::Int(0))
        .unwrap();
    let last = b
        .filter(lessons, |facts: &[Value]| facts[0].field(2) == &Value::Int(3))
        .unwrap();
    let first_rooms = b.map(first, vec![field(0, 1)]).unwrap();
    let last_rooms = b.map(last, vec![field(0, 1)]).unwrap();
    let edge = b.concat(first_rooms, last_rooms, Vec::new()).unwrap();
    let edge_rooms = b.distinct(edge).unwrap();
    penalize_each(&mut b, edge_rooms, "Edge room", HardSoftScore::ONE_SOFT);

    let busy = b
        .if_exists(lessons, conflicts, equal_bi(field(0, 0), field(0, 0)))
        .unwrap();
    penalize_each(&mut b, busy, "Busy", HardSoftScore::of_soft(2));

    let network = b.build(config).unwrap();
    let inspected = vec![lessons, conflicts, load, alone, gaps, first, edge, edge_rooms, busy];
    (network, Model { lessons, inspected })
}

fn snapshot(network: &Network<Value, HardSoftScore>, model: &Model) -> Vec<Vec<Vec<Value>>> {
    model
        .inspected
        .iter()
        .map(|&s| network.tuples(s).unwrap())
        .collect()
}

#[test]
fn test_incremental_matches_from_scratch() {
    init_tracing();
    let config = NetworkConfig::default().with_environment_mode(EnvironmentMode::FullAssert);
    let (mut network, model) = timetabling(&config);
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut live: BTreeMap<i64, (FactHandle, Value)> = BTreeMap::new();
    let mut next_id = 0;

    for _ in 0..60 {
        for _ in 0..rng.random_range(1..6) {
            let roll = rng.random_range(0..10);
            let fact = lesson(next_id, rng.random_range(0..3), rng.random_range(0..4));
            if roll < 4 || live.is_empty() {
                let handle = network.insert(model.lessons, fact.clone()).unwrap();
                live.insert(next_id, (handle, fact));
                next_id += 1;
            } else {
                let ids: Vec<i64> = live.keys().copied().collect();
                let id = ids[rng.random_range(0..ids.len())];
                if roll < 8 {
                    let moved = lesson(id, rng.random_range(0..3), rng.random_range(0..4));
                    let handle = live[&id].0;
                    network.update(handle, moved.clone()).unwrap();
                    live.insert(id, (handle, moved));
                } else if let Some((handle, _)) = live.remove(&id) {
                    network.retract(handle).unwrap();
                }
            }
        }
        network.flush().unwrap();

        let (mut scratch, scratch_model) = timetabling(&NetworkConfig::default());
        for (_, fact) in live.values() {
            scratch.insert(scratch_model.lessons, fact.clone()).unwrap();
        }
        scratch.flush().unwrap();
        assert_eq!(network.score(), scratch.score());
        assert_eq!(snapshot(&network, &model), snapshot(&scratch, &scratch_model));
    }

    for (handle, _) in std::mem::take(&mut live).into_values() {
        network.retract(handle).unwrap();
    }
    network.flush().unwrap();
    assert_eq!(network.score(), HardSoftScore::ZERO);
    assert_eq!(network.live_tuples(), 0);
}

#[test]
fn test_insert_then_retract_restores_state() {
    let (mut network, model) = timetabling(&NetworkConfig::default());
    for (id, room, slot) in [(0, 0, 0), (1, 0, 0), (2, 1, 3), (3, 0, 2)] {
        network.insert(model.lessons, lesson(id, room, slot)).unwrap();
    }
    network.flush().unwrap();
    let before = (snapshot(&network, &model), network.score(), network.live_tuples());

    let extra = network.insert(model.lessons, lesson(9, 0, 3)).unwrap();
    network.flush().unwrap();
    assert_ne!(network.live_tuples(), before.2);
    network.retract(extra).unwrap();
    network.flush().unwrap();
    assert_eq!(
        (snapshot(&network, &model), network.score(), network.live_tuples()),
        before
    );
}

#[test]
fn test_comparison_join_without_equal_keys() {
    let mut b = NetworkBuilder::<Value, SimpleScore>::new();
    let numbers = b.for_each("n").unwrap();
    let ordered = b
        .join(numbers, numbers, less_than(Mapping::fact(0), Mapping::fact(0)))
        .unwrap();
    let none = b.join(numbers, numbers, Joiners::none()).unwrap();
    penalize_each(&mut b, ordered, "Ordered", SimpleScore::ONE);
    penalize_each(&mut b, none, "All", SimpleScore::ZERO);
    let mut network = build(b);
    let handles: Vec<FactHandle> = [3, 1, 2]
        .into_iter()
        .map(|n| network.insert(numbers, Value::Int(n)).unwrap())
        .collect();
    network.flush().unwrap();
    assert_eq!(
        ints(network.tuples(ordered).unwrap()),
        vec![vec![1, 2], vec![1, 3], vec![2, 3]]
    );
    assert_eq!(network.tuples(none).unwrap().len(), 9);

    network.update(handles[0], Value::Int(0)).unwrap();
    network.flush().unwrap();
    assert_eq!(
        ints(network.tuples(ordered).unwrap()),
        vec![vec![0, 1], vec![0, 2], vec![1, 2]]
    );
}
