// src/solver/explain.rs

//! Unsatisfiability explanations
//!
//! When the solver exhausts its search it must say why. An `Explanation`
//! carries at least one witness: a pair of constraints on one package name
//! with an empty intersection, a requested remove that is a hard dependency
//! of a kept package, a constraint nothing in any repository satisfies, or
//! an exhausted search budget.

use crate::version::VersionConstraint;
use std::fmt;

/// Where a constraint on a package name came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintOrigin {
    /// Named directly in the user's request
    Requested,
    /// Declared by a chosen package (`name-version`)
    Dependency { of: String },
    /// Declared by a package that stays installed
    Installed { package: String },
}

impl fmt::Display for ConstraintOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintOrigin::Requested => write!(f, "requested"),
            ConstraintOrigin::Dependency { of } => write!(f, "required by {}", of),
            ConstraintOrigin::Installed { package } => {
                write!(f, "required by installed {}", package)
            }
        }
    }
}

/// One constraint on one package name, with its provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintRef {
    pub name: String,
    pub constraint: VersionConstraint,
    pub origin: ConstraintOrigin,
}

impl fmt::Display for ConstraintRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.name, self.constraint, self.origin)
    }
}

/// A concrete reason no assignment exists
#[derive(Debug, Clone)]
pub enum Witness {
    /// Two constraints on the same name that no version satisfies together
    EmptyIntersection {
        name: String,
        first: ConstraintRef,
        second: ConstraintRef,
    },
    /// A requested remove that a present package hard-depends on
    RemoveRequired {
        removed: String,
        constraint: VersionConstraint,
        required_by: String,
    },
    /// No repository offers a version satisfying the constraint
    NoCandidate { constraint: ConstraintRef },
    /// Two chosen packages declare each other as conflicting
    DeclaredConflict {
        package: String,
        conflicts_with: String,
    },
    /// The backtrack budget was exhausted before the search completed
    BudgetExceeded { budget: u64 },
}

impl fmt::Display for Witness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Witness::EmptyIntersection { name, first, second } => write!(
                f,
                "no version of '{}' satisfies both {} ({}) and {} ({})",
                name, first.constraint, first.origin, second.constraint, second.origin
            ),
            Witness::RemoveRequired {
                removed,
                constraint,
                required_by,
            } => write!(
                f,
                "'{}' cannot be removed: {} depends on it ({})",
                removed, required_by, constraint
            ),
            Witness::NoCandidate { constraint } => write!(
                f,
                "no available version of '{}' satisfies {} ({})",
                constraint.name, constraint.constraint, constraint.origin
            ),
            Witness::DeclaredConflict {
                package,
                conflicts_with,
            } => write!(f, "{} conflicts with {}", package, conflicts_with),
            Witness::BudgetExceeded { budget } => {
                write!(f, "search budget of {} steps exhausted", budget)
            }
        }
    }
}

/// The reasons returned with `Error::Unsatisfiable`. Never empty.
#[derive(Debug, Clone)]
pub struct Explanation {
    pub witnesses: Vec<Witness>,
}

impl Explanation {
    pub fn new(witnesses: Vec<Witness>) -> Self {
        debug_assert!(!witnesses.is_empty());
        Self { witnesses }
    }

    pub fn single(witness: Witness) -> Self {
        Self {
            witnesses: vec![witness],
        }
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.witnesses.iter().map(|w| w.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}
