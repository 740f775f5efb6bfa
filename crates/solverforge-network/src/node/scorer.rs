use solverforge_core::{ConstraintRef, ImpactType, Score};

use crate::arena::Arena;
use crate::error::Result;
use crate::fact::{Fact, Facts};
use crate::function::{guarded, FunctionRole};
use crate::tuple::{Slot, TupleArena, TupleId};
use crate::weight::MatchWeigher;

struct Impact<V, Sc> {
    score: Sc,
    facts: Option<Facts<V>>,
}

/// Terminal operator of one constraint.
///
/// Every live tuple holds a handle to the impact it contributed; undoing the
/// impact subtracts exactly that score again.
pub(crate) struct ScorerNode<V, Sc> {
    constraint_ref: ConstraintRef,
    impact_type: ImpactType,
    weight: Sc,
    weigher: MatchWeigher<V>,
    slot: usize,
    track_matches: bool,
    impacts: Arena<Impact<V, Sc>>,
    score: Sc,
}

impl<V: Fact, Sc: Score> ScorerNode<V, Sc> {
    pub fn new(
        constraint_ref: ConstraintRef,
        impact_type: ImpactType,
        weight: Sc,
        weigher: MatchWeigher<V>,
        slot: usize,
        track_matches: bool,
    ) -> Self {
        Self {
            constraint_ref,
            impact_type,
            weight,
            weigher,
            slot,
            track_matches,
            impacts: Arena::new(),
            score: Sc::zero(),
        }
    }

    fn label(&self) -> &'static str {
        match self.impact_type {
            ImpactType::Penalty => "penalize",
            ImpactType::Reward => "reward",
        }
    }

    fn impact_of(&self, facts: &[V]) -> Result<Sc> {
        let scaled = guarded(self.label(), FunctionRole::Weigher, facts, || {
            self.weigher.impact(self.weight, facts)
        })?;
        Ok(self.impact_type.apply(scaled))
    }

    fn snapshot(&self, facts: &[V]) -> Option<Facts<V>> {
        self.track_matches.then(|| facts.iter().cloned().collect())
    }

    pub fn insert(&mut self, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let facts = tuples.facts(tuple)?;
        let score = self.impact_of(facts)?;
        let facts = self.snapshot(facts);
        let impact = self.impacts.insert(Impact { score, facts });
        self.score = self.score + score;
        tuples.set_slot(tuple, self.slot, Slot::Handle(impact))
    }

    pub fn update(&mut self, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let Some(impact) = tuples.slot(tuple, self.slot)?.handle() else {
            return self.insert(tuple, tuples);
        };
        let facts = tuples.facts(tuple)?;
        let score = self.impact_of(facts)?;
        let snapshot = self.snapshot(facts);
        if let Some(old) = self.impacts.get_mut(impact) {
            self.score = self.score - old.score + score;
            old.score = score;
            old.facts = snapshot;
        }
        Ok(())
    }

    pub fn retract(&mut self, tuple: TupleId, tuples: &mut TupleArena<V>) -> Result<()> {
        let Some(impact) = tuples.take_slot(tuple, self.slot)?.handle() else {
            return Ok(());
        };
        if let Some(old) = self.impacts.remove(impact) {
            self.score = self.score - old.score;
        }
        Ok(())
    }

    pub fn constraint_ref(&self) -> &ConstraintRef {
        &self.constraint_ref
    }

    pub fn weight(&self) -> Sc {
        self.weight
    }

    pub fn score(&self) -> Sc {
        self.score
    }

    pub fn match_count(&self) -> usize {
        self.impacts.len()
    }

    /// Facts and score of every match; empty unless matches are tracked.
    pub fn matches(&self) -> impl Iterator<Item = (&[V], Sc)> {
        self.impacts
            .iter()
            .filter_map(|(_, impact)| impact.facts.as_deref().map(|facts| (facts, impact.score)))
    }
}
