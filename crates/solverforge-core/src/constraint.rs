//! Constraint identification and impact polarity.

use std::fmt;

use crate::score::Score;

/// Identifies a constraint inside a network.
///
/// Two constraints registered under the same reference are a configuration
/// error; the package is optional.
///
/// ```
/// use solverforge_core::ConstraintRef;
///
/// let cr = ConstraintRef::new("timetabling", "Room conflict");
/// assert_eq!(cr.full_name(), "timetabling/Room conflict");
/// assert_eq!(ConstraintRef::named("Speaker gap").full_name(), "Speaker gap");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintRef {
    pub package: String,
    pub name: String,
}

impl ConstraintRef {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }

    /// A reference without package.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new("", name)
    }

    /// Returns `package/name`, or just `name` when the package is empty.
    pub fn full_name(&self) -> String {
        self.to_string()
    }

    /// True when `key` equals either the bare name or the full name.
    pub fn matches(&self, key: &str) -> bool {
        self.name == key || self.full_name() == key
    }
}

impl fmt::Display for ConstraintRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.package.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}/{}", self.package, self.name)
        }
    }
}

/// Whether a constraint match lowers or raises the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImpactType {
    Penalty,
    Reward,
}

impl ImpactType {
    /// Applies the polarity to a positive impact.
    #[inline]
    pub fn apply<Sc: Score>(self, impact: Sc) -> Sc {
        match self {
            ImpactType::Penalty => -impact,
            ImpactType::Reward => impact,
        }
    }
}
