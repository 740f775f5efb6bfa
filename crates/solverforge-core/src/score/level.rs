/// Priority class of a score level, returned by
/// [`Score::level_label`](super::Score::level_label).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreLevel {
    /// Must be satisfied for feasibility.
    Hard,
    Medium,
    /// Optimization objective.
    Soft,
}
