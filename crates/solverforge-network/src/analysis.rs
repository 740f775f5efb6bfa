//! Score analysis types for detailed constraint tracking.
//!
//! Built from a network with constraint match tracking enabled: which facts
//! take part in each match, a per-constraint score explanation, and the
//! facts indicted by the matches they appear in.

use std::collections::HashMap;
use std::fmt::Debug;

use solverforge_core::{ConstraintRef, Score, ScoreLevel};

use crate::fact::Fact;

/// Why a constraint matched: the facts of the matching tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintJustification<V> {
    pub facts: Vec<V>,
    /// Human-readable description of the match.
    pub description: String,
}

impl<V: Debug> ConstraintJustification<V> {
    /// Creates a justification, describing the facts by their `Debug` form.
    pub fn new(facts: Vec<V>) -> Self {
        let description = if facts.is_empty() {
            "No facts".to_string()
        } else {
            facts
                .iter()
                .map(|f| format!("{:?}", f))
                .collect::<Vec<_>>()
                .join(", ")
        };
        Self { facts, description }
    }
}

/// One match of a constraint and its score impact.
#[derive(Debug, Clone)]
pub struct ConstraintMatch<V, Sc: Score> {
    pub constraint_ref: ConstraintRef,
    pub score: Sc,
    pub justification: ConstraintJustification<V>,
}

/// Score and match count of one constraint, available without tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintResult<Sc: Score> {
    pub constraint_ref: ConstraintRef,
    /// Constraint weight (score per match before the match weigher).
    pub weight: Sc,
    pub score: Sc,
    pub match_count: usize,
    pub is_hard: bool,
}

pub(crate) fn is_hard<Sc: Score>(weight: &Sc) -> bool {
    weight.dominant_level() == Some(ScoreLevel::Hard)
}

/// Per-constraint breakdown in a score explanation.
#[derive(Debug, Clone)]
pub struct ConstraintAnalysis<V, Sc: Score> {
    pub constraint_ref: ConstraintRef,
    pub weight: Sc,
    /// Total score from this constraint.
    pub score: Sc,
    pub matches: Vec<ConstraintMatch<V, Sc>>,
    pub is_hard: bool,
}

impl<V, Sc: Score> ConstraintAnalysis<V, Sc> {
    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    pub fn name(&self) -> &str {
        &self.constraint_ref.name
    }
}

/// Complete score explanation with per-constraint breakdown.
#[derive(Debug, Clone)]
pub struct ScoreExplanation<V, Sc: Score> {
    pub score: Sc,
    pub constraint_analyses: Vec<ConstraintAnalysis<V, Sc>>,
}

impl<V, Sc: Score> ScoreExplanation<V, Sc> {
    /// Returns the total match count across all constraints.
    pub fn total_match_count(&self) -> usize {
        self.constraint_analyses.iter().map(|a| a.match_count()).sum()
    }

    /// Returns constraints with non-zero scores.
    pub fn non_zero_constraints(&self) -> Vec<&ConstraintAnalysis<V, Sc>> {
        self.constraint_analyses
            .iter()
            .filter(|a| !a.score.is_zero())
            .collect()
    }

    pub fn all_matches(&self) -> Vec<&ConstraintMatch<V, Sc>> {
        self.constraint_analyses
            .iter()
            .flat_map(|a| &a.matches)
            .collect()
    }

    pub fn analysis(&self, name: &str) -> Option<&ConstraintAnalysis<V, Sc>> {
        self.constraint_analyses
            .iter()
            .find(|a| a.constraint_ref.matches(name))
    }
}

/// How a single fact impacts the score.
#[derive(Debug, Clone)]
pub struct Indictment<V, Sc: Score> {
    pub fact: V,
    /// Total score of the matches this fact takes part in.
    pub score: Sc,
    pub constraint_matches: HashMap<ConstraintRef, Vec<ConstraintMatch<V, Sc>>>,
}

impl<V: Clone, Sc: Score> Indictment<V, Sc> {
    pub fn new(fact: V) -> Self {
        Self {
            fact,
            score: Sc::zero(),
            constraint_matches: HashMap::new(),
        }
    }

    pub fn add_match(&mut self, constraint_match: ConstraintMatch<V, Sc>) {
        self.score = self.score + constraint_match.score;
        self.constraint_matches
            .entry(constraint_match.constraint_ref.clone())
            .or_default()
            .push(constraint_match);
    }

    pub fn match_count(&self) -> usize {
        self.constraint_matches.values().map(Vec::len).sum()
    }

    pub fn violated_constraints(&self) -> Vec<&ConstraintRef> {
        self.constraint_matches.keys().collect()
    }

    pub fn constraint_count(&self) -> usize {
        self.constraint_matches.len()
    }
}

/// Indictments keyed by fact.
#[derive(Debug, Clone)]
pub struct IndictmentMap<V, Sc: Score> {
    pub indictments: HashMap<V, Indictment<V, Sc>>,
}

impl<V: Fact, Sc: Score> IndictmentMap<V, Sc> {
    pub fn new() -> Self {
        Self {
            indictments: HashMap::new(),
        }
    }

    /// Indicts every distinct fact of every match once per match.
    pub fn from_matches(matches: Vec<ConstraintMatch<V, Sc>>) -> Self {
        let mut map = Self::new();
        for m in matches {
            let mut facts: Vec<&V> = m.justification.facts.iter().collect();
            facts.sort();
            facts.dedup();
            for fact in facts {
                map.indictments
                    .entry(fact.clone())
                    .or_insert_with(|| Indictment::new(fact.clone()))
                    .add_match(m.clone());
            }
        }
        map
    }

    pub fn get(&self, fact: &V) -> Option<&Indictment<V, Sc>> {
        self.indictments.get(fact)
    }

    pub fn facts(&self) -> impl Iterator<Item = &V> {
        self.indictments.keys()
    }

    /// Facts sorted by worst score impact first, ties by fact order.
    pub fn worst_facts(&self) -> Vec<&V> {
        let mut facts: Vec<&V> = self.indictments.keys().collect();
        facts.sort_by(|a, b| {
            self.indictments[*a]
                .score
                .cmp(&self.indictments[*b].score)
                .then_with(|| a.cmp(b))
        });
        facts
    }

    pub fn len(&self) -> usize {
        self.indictments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indictments.is_empty()
    }
}

impl<V: Fact, Sc: Score> Default for IndictmentMap<V, Sc> {
    fn default() -> Self {
        Self::new()
    }
}
