// src/version.rs

//! Version and version-constraint handling
//!
//! Versions are semver (`semver::Version`) with lenient parsing: `1` and
//! `1.2` are padded to three components. Constraints are conjunctions of
//! comparators rather than `semver::VersionReq` because the solver needs a
//! decidable emptiness check on constraint intersections to produce witness
//! conflicts.

use crate::error::{Error, Result};
use semver::Version;
use std::fmt;
use std::str::FromStr;

/// Parse a version string, padding missing components with zeros
/// (`1.2` -> `1.2.0`).
pub fn parse_version(s: &str) -> Result<Version> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::ParseError("empty version string".to_string()));
    }

    if let Ok(v) = Version::parse(s) {
        return Ok(v);
    }

    // Lenient path: count numeric components before any pre-release/build
    // suffix and pad to three.
    let (core, suffix) = match s.find(['-', '+']) {
        Some(idx) => (&s[..idx], &s[idx..]),
        None => (s, ""),
    };
    let dots = core.matches('.').count();
    let padded = match dots {
        0 => format!("{core}.0.0{suffix}"),
        1 => format!("{core}.0{suffix}"),
        _ => s.to_string(),
    };

    Version::parse(&padded).map_err(|e| Error::ParseError(format!("invalid version '{s}': {e}")))
}

/// Comparison operator of a single comparator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Exact,
    NotEqual,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    /// `^`: same major (or same minor when major is 0)
    Compatible,
    /// `~`: same major.minor
    Tilde,
}

/// A single predicate over versions, e.g. `>=1.2.0`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub op: Op,
    pub version: Version,
}

impl Comparator {
    /// Exclusive upper bound implied by `^` and `~` operators
    fn range_upper(&self) -> Option<Version> {
        match self.op {
            Op::Compatible => {
                let v = &self.version;
                Some(if v.major > 0 {
                    Version::new(v.major + 1, 0, 0)
                } else if v.minor > 0 {
                    Version::new(0, v.minor + 1, 0)
                } else {
                    Version::new(0, 0, v.patch + 1)
                })
            }
            Op::Tilde => Some(Version::new(self.version.major, self.version.minor + 1, 0)),
            _ => None,
        }
    }

    pub fn matches(&self, v: &Version) -> bool {
        match self.op {
            Op::Exact => v == &self.version,
            Op::NotEqual => v != &self.version,
            Op::Greater => v > &self.version,
            Op::GreaterEq => v >= &self.version,
            Op::Less => v < &self.version,
            Op::LessEq => v <= &self.version,
            Op::Compatible | Op::Tilde => {
                v >= &self.version
                    && self.range_upper().map(|upper| v < &upper).unwrap_or(false)
            }
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            Op::Exact => "==",
            Op::NotEqual => "!=",
            Op::Greater => ">",
            Op::GreaterEq => ">=",
            Op::Less => "<",
            Op::LessEq => "<=",
            Op::Compatible => "^",
            Op::Tilde => "~",
        };
        write!(f, "{}{}", op, self.version)
    }
}

/// A conjunction of comparators over versions of one package name.
///
/// An empty comparator list matches every version (`*`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionConstraint {
    comparators: Vec<Comparator>,
}

/// Inclusive/exclusive endpoint used by the intersection check
#[derive(Debug, Clone, PartialEq, Eq)]
struct Bound {
    version: Version,
    inclusive: bool,
}

impl VersionConstraint {
    /// Constraint matching any version
    pub fn any() -> Self {
        Self::default()
    }

    /// Constraint matching exactly one version
    pub fn exact(version: Version) -> Self {
        Self {
            comparators: vec![Comparator {
                op: Op::Exact,
                version,
            }],
        }
    }

    pub fn is_any(&self) -> bool {
        self.comparators.is_empty()
    }

    /// True if `version` satisfies every comparator
    pub fn satisfies(&self, version: &Version) -> bool {
        self.comparators.iter().all(|c| c.matches(version))
    }

    /// Conjunction of two constraints
    pub fn intersect(&self, other: &Self) -> Self {
        let mut comparators = self.comparators.clone();
        comparators.extend(other.comparators.iter().cloned());
        Self { comparators }
    }

    /// True if some version could satisfy both constraints.
    ///
    /// Exact comparators are checked against every other comparator;
    /// otherwise the intersection of lower/upper bounds decides. `!=`
    /// comparators only participate through exact matches, which is
    /// sufficient for conflict witnessing over dense version ranges.
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        let merged = self.intersect(other);
        !merged.is_empty()
    }

    /// True if no version can satisfy this conjunction
    pub fn is_empty(&self) -> bool {
        // Any exact pin decides the whole conjunction.
        for c in &self.comparators {
            if c.op == Op::Exact {
                return !self.satisfies(&c.version);
            }
        }

        let mut lower: Option<Bound> = None;
        let mut upper: Option<Bound> = None;

        for c in &self.comparators {
            match c.op {
                Op::Greater | Op::GreaterEq => {
                    let b = Bound {
                        version: c.version.clone(),
                        inclusive: c.op == Op::GreaterEq,
                    };
                    lower = Some(max_lower(lower, b));
                }
                Op::Less | Op::LessEq => {
                    let b = Bound {
                        version: c.version.clone(),
                        inclusive: c.op == Op::LessEq,
                    };
                    upper = Some(min_upper(upper, b));
                }
                Op::Compatible | Op::Tilde => {
                    let low = Bound {
                        version: c.version.clone(),
                        inclusive: true,
                    };
                    lower = Some(max_lower(lower, low));
                    if let Some(up) = c.range_upper() {
                        let high = Bound {
                            version: up,
                            inclusive: false,
                        };
                        upper = Some(min_upper(upper, high));
                    }
                }
                Op::Exact | Op::NotEqual => {}
            }
        }

        match (lower, upper) {
            (Some(lo), Some(hi)) => {
                lo.version > hi.version
                    || (lo.version == hi.version && !(lo.inclusive && hi.inclusive))
            }
            _ => false,
        }
    }
}

fn max_lower(current: Option<Bound>, candidate: Bound) -> Bound {
    match current {
        None => candidate,
        Some(b) => {
            if candidate.version > b.version
                || (candidate.version == b.version && !candidate.inclusive)
            {
                candidate
            } else {
                b
            }
        }
    }
}

fn min_upper(current: Option<Bound>, candidate: Bound) -> Bound {
    match current {
        None => candidate,
        Some(b) => {
            if candidate.version < b.version
                || (candidate.version == b.version && !candidate.inclusive)
            {
                candidate
            } else {
                b
            }
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "*" || s.eq_ignore_ascii_case("any") {
            return Ok(Self::any());
        }

        let mut comparators = Vec::new();
        for token in s.split(',') {
            let token = token.trim();
            if token.is_empty() || token == "*" {
                continue;
            }

            let (op, rest) = if let Some(rest) = token.strip_prefix("==") {
                (Op::Exact, rest)
            } else if let Some(rest) = token.strip_prefix("!=") {
                (Op::NotEqual, rest)
            } else if let Some(rest) = token.strip_prefix(">=") {
                (Op::GreaterEq, rest)
            } else if let Some(rest) = token.strip_prefix("<=") {
                (Op::LessEq, rest)
            } else if let Some(rest) = token.strip_prefix('>') {
                (Op::Greater, rest)
            } else if let Some(rest) = token.strip_prefix('<') {
                (Op::Less, rest)
            } else if let Some(rest) = token.strip_prefix('^') {
                (Op::Compatible, rest)
            } else if let Some(rest) = token.strip_prefix('~') {
                (Op::Tilde, rest)
            } else if let Some(rest) = token.strip_prefix('=') {
                (Op::Exact, rest)
            } else {
                (Op::Exact, token)
            };

            comparators.push(Comparator {
                op,
                version: parse_version(rest)?,
            });
        }

        Ok(Self { comparators })
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.comparators.is_empty() {
            return write!(f, "*");
        }
        let parts: Vec<String> = self.comparators.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl serde::Serialize for VersionConstraint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for VersionConstraint {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse a requirement string like `lib >=1.0, <2.0` or just `lib`
/// into a name and constraint.
pub fn parse_requirement(s: &str) -> Result<(String, VersionConstraint)> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::ParseError("empty requirement string".to_string()));
    }

    match s.find(|c: char| c.is_whitespace() || "<>=!^~".contains(c)) {
        Some(idx) if idx > 0 => {
            let name = s[..idx].to_string();
            let constraint = s[idx..].parse()?;
            Ok((name, constraint))
        }
        _ => Ok((s.to_string(), VersionConstraint::any())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        parse_version(s).unwrap()
    }

    fn c(s: &str) -> VersionConstraint {
        s.parse().unwrap()
    }

    #[test]
    fn test_lenient_version_parsing() {
        assert_eq!(v("1"), Version::new(1, 0, 0));
        assert_eq!(v("1.2"), Version::new(1, 2, 0));
        assert_eq!(v("1.2.3"), Version::new(1, 2, 3));
        assert!(parse_version("").is_err());
        assert!(parse_version("not-a-version").is_err());
    }

    #[test]
    fn test_basic_comparators() {
        assert!(c(">=2.0").satisfies(&v("2.1")));
        assert!(!c(">=2.0").satisfies(&v("1.9")));
        assert!(c("==1.2.3").satisfies(&v("1.2.3")));
        assert!(!c("==1.2.3").satisfies(&v("1.2.4")));
        assert!(c("<2.0").satisfies(&v("1.9.9")));
        assert!(c("!=1.5").satisfies(&v("1.6")));
        assert!(!c("!=1.5").satisfies(&v("1.5")));
    }

    #[test]
    fn test_caret_and_tilde() {
        assert!(c("^1.0").satisfies(&v("1.2")));
        assert!(c("^1.0").satisfies(&v("1.9.9")));
        assert!(!c("^1.0").satisfies(&v("2.0")));
        assert!(c("^0.2.1").satisfies(&v("0.2.9")));
        assert!(!c("^0.2.1").satisfies(&v("0.3.0")));
        assert!(c("~1.2.0").satisfies(&v("1.2.9")));
        assert!(!c("~1.2.0").satisfies(&v("1.3.0")));
    }

    #[test]
    fn test_conjunction() {
        let range = c(">=1.0, <2.0");
        assert!(range.satisfies(&v("1.5")));
        assert!(!range.satisfies(&v("2.0")));
        assert!(!range.satisfies(&v("0.9")));
    }

    #[test]
    fn test_any_constraint() {
        assert!(c("*").satisfies(&v("0.0.1")));
        assert!(c("*").is_any());
        assert!(VersionConstraint::any().satisfies(&v("99.0")));
    }

    #[test]
    fn test_intersection_emptiness() {
        assert!(c(">=2.0").is_compatible_with(&c("<3.0")));
        assert!(!c(">=2.0").is_compatible_with(&c("<2.0")));
        assert!(!c(">2.0").is_compatible_with(&c("<=2.0")));
        assert!(c(">=2.0").is_compatible_with(&c("<=2.0")));
        assert!(!c("==1.0").is_compatible_with(&c(">=2.0")));
        assert!(c("==2.5").is_compatible_with(&c(">=2.0, <3.0")));
        assert!(!c("^1.0").is_compatible_with(&c(">=2.0")));
        assert!(c("^1.0").is_compatible_with(&c(">=1.5")));
    }

    #[test]
    fn test_parse_requirement() {
        let (name, constraint) = parse_requirement("lib >=1.0, <2.0").unwrap();
        assert_eq!(name, "lib");
        assert!(constraint.satisfies(&v("1.5")));

        let (name, constraint) = parse_requirement("lib^1.0").unwrap();
        assert_eq!(name, "lib");
        assert!(constraint.satisfies(&v("1.9")));

        let (name, constraint) = parse_requirement("standalone").unwrap();
        assert_eq!(name, "standalone");
        assert!(constraint.is_any());
    }

    #[test]
    fn test_constraint_display_roundtrip() {
        for s in ["*", ">=1.0.0", ">=1.0.0, <2.0.0", "^1.2.0", "==3.0.0"] {
            let parsed = c(s);
            assert_eq!(parsed, c(&parsed.to_string()));
        }
    }
}
