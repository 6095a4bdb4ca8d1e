// src/solver/engine.rs

//! Backtracking search over version choices
//!
//! One assignment per package name, candidates ordered installed-first
//! (minimal change) then newest-first (deterministic tie-break). Failed
//! partial states are memoized so diamond dependencies do not revisit the
//! same dead ends, and a configurable step budget bounds the search.

use crate::error::{Error, Result};
use crate::solver::explain::{ConstraintOrigin, ConstraintRef, Explanation, Witness};
use crate::solver::{InstalledView, Request, TargetPackage, TargetSet};
use crate::store::MetadataStore;
use crate::version::VersionConstraint;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use tracing::{debug, trace};

/// Resolve `request` against `installed`, choosing exact versions from
/// `store`. Kept installed packages participate so the result is closed
/// under dependencies.
pub fn solve(
    store: &MetadataStore,
    installed: &BTreeMap<String, InstalledView>,
    request: &Request,
    budget: u64,
) -> Result<TargetSet> {
    let remove: BTreeSet<String> = request.remove.iter().cloned().collect();

    // A name cannot be both installed and removed in one request.
    for (name, constraint) in &request.install {
        if remove.contains(name) {
            return Err(Error::Unsatisfiable(Explanation::single(
                Witness::RemoveRequired {
                    removed: name.clone(),
                    constraint: constraint.clone(),
                    required_by: "the request itself".to_string(),
                },
            )));
        }
    }

    let mut constraints: HashMap<String, Vec<ConstraintRef>> = HashMap::new();
    let mut goals: Vec<String> = Vec::new();

    for (name, constraint) in &request.install {
        constraints.entry(name.clone()).or_default().push(ConstraintRef {
            name: name.clone(),
            constraint: constraint.clone(),
            origin: ConstraintOrigin::Requested,
        });
        goals.push(name.clone());
    }

    // Installed packages not being removed stay present.
    for name in installed.keys() {
        if !remove.contains(name) {
            goals.push(name.clone());
        }
    }

    let mut search = Search {
        store,
        installed,
        remove,
        prefer_newest: request.prefer_newest,
        budget,
        steps: 0,
        budget_exhausted: false,
        memo: HashSet::new(),
        witnesses: Vec::new(),
    };

    let mut assignments: BTreeMap<String, TargetPackage> = BTreeMap::new();
    if search.run(&mut assignments, &mut constraints, &mut goals) {
        debug!("Solved: {} packages in target set", assignments.len());
        return Ok(TargetSet {
            packages: assignments,
        });
    }

    if search.budget_exhausted {
        return Err(Error::Unsatisfiable(Explanation::single(
            Witness::BudgetExceeded { budget },
        )));
    }

    let witnesses = if search.witnesses.is_empty() {
        // Unreachable in practice; every dead end records a witness.
        vec![Witness::BudgetExceeded { budget }]
    } else {
        search.witnesses
    };
    Err(Error::Unsatisfiable(Explanation::new(witnesses)))
}

struct Search<'a> {
    store: &'a MetadataStore,
    installed: &'a BTreeMap<String, InstalledView>,
    remove: BTreeSet<String>,
    prefer_newest: bool,
    budget: u64,
    steps: u64,
    budget_exhausted: bool,
    memo: HashSet<u64>,
    witnesses: Vec<Witness>,
}

impl Search<'_> {
    fn run(
        &mut self,
        assignments: &mut BTreeMap<String, TargetPackage>,
        constraints: &mut HashMap<String, Vec<ConstraintRef>>,
        goals: &mut Vec<String>,
    ) -> bool {
        if self.budget_exhausted {
            return false;
        }

        // Next unassigned goal; all assigned means every requirement is met.
        let name = match goals.iter().find(|g| !assignments.contains_key(*g)) {
            Some(name) => name.clone(),
            None => return true,
        };

        let refs: Vec<ConstraintRef> = constraints.get(&name).cloned().unwrap_or_default();

        // A goal in the remove set means something present requires it.
        if self.remove.contains(&name) {
            if let Some(r) = refs.first() {
                self.witness(Witness::RemoveRequired {
                    removed: name.clone(),
                    constraint: r.constraint.clone(),
                    required_by: origin_label(&r.origin),
                });
            }
            return false;
        }

        let key = self.state_key(&name, assignments);
        if self.memo.contains(&key) {
            trace!("Memoized dead end for '{}'", name);
            return false;
        }

        let merged = refs
            .iter()
            .fold(VersionConstraint::any(), |acc, r| acc.intersect(&r.constraint));

        if merged.is_empty() {
            if let Some((first, second)) = incompatible_pair(&refs) {
                self.witness(Witness::EmptyIntersection {
                    name: name.clone(),
                    first,
                    second,
                });
            }
            self.memo.insert(key);
            return false;
        }

        let candidates = self.candidates(&name, &merged);
        if candidates.is_empty() {
            let strongest = refs
                .iter()
                .find(|r| !r.constraint.is_any())
                .or(refs.first())
                .cloned()
                .unwrap_or(ConstraintRef {
                    name: name.clone(),
                    constraint: merged.clone(),
                    origin: ConstraintOrigin::Requested,
                });
            self.witness(Witness::NoCandidate {
                constraint: strongest,
            });
            self.memo.insert(key);
            return false;
        }

        for candidate in candidates {
            self.steps += 1;
            if self.steps > self.budget {
                self.budget_exhausted = true;
                return false;
            }

            let is_keep = matches!(candidate, TargetPackage::Keep(_));
            let ident = format!("{}-{}", candidate.name(), candidate.version());

            if !self.check_candidate(&name, &candidate, &ident, assignments) {
                // A kept installed package whose dependency is being
                // removed fails outright: switching its version to dodge
                // the removal would be a silent change.
                if is_keep && self.keep_blocked_by_remove(&candidate) {
                    self.memo.insert(key);
                    return false;
                }
                continue;
            }

            // Apply the choice, recording what must be undone on backtrack.
            let goals_len = goals.len();
            let mut touched: Vec<String> = Vec::new();
            for dep in candidate.depends() {
                let origin = if is_keep {
                    ConstraintOrigin::Installed {
                        package: ident.clone(),
                    }
                } else {
                    ConstraintOrigin::Dependency { of: ident.clone() }
                };
                constraints
                    .entry(dep.name.clone())
                    .or_default()
                    .push(ConstraintRef {
                        name: dep.name.clone(),
                        constraint: dep.constraint.clone(),
                        origin,
                    });
                touched.push(dep.name.clone());
                if !dep.optional {
                    goals.push(dep.name.clone());
                }
            }
            assignments.insert(name.clone(), candidate);

            if self.run(assignments, constraints, goals) {
                return true;
            }

            // Undo
            assignments.remove(&name);
            goals.truncate(goals_len);
            for dep_name in touched {
                if let Some(entry) = constraints.get_mut(&dep_name) {
                    entry.pop();
                }
            }

            if self.budget_exhausted {
                return false;
            }
        }

        self.memo.insert(key);
        false
    }

    /// Candidate choices for `name` under `merged`. The installed version
    /// goes first (minimal change) with repository versions newest-first
    /// behind it; in prefer-newest mode the installed version slots into
    /// its position in the descending order instead, so newer repository
    /// versions win but downgrades still lose to keeping.
    fn candidates(&self, name: &str, merged: &VersionConstraint) -> Vec<TargetPackage> {
        let mut out = Vec::new();

        let view = self.installed.get(name);
        let installed_version = view.map(|v| &v.version);
        let keep = view.filter(|v| merged.satisfies(&v.version));

        let mut keep_pending = keep;
        if !self.prefer_newest {
            if let Some(view) = keep_pending.take() {
                out.push(TargetPackage::Keep(view.clone()));
            }
        }

        for meta in self.store.candidates(name) {
            if Some(&meta.version) == installed_version {
                continue;
            }
            if let Some(view) = keep_pending {
                if meta.version < view.version {
                    out.push(TargetPackage::Keep(view.clone()));
                    keep_pending = None;
                }
            }
            if merged.satisfies(&meta.version) {
                out.push(TargetPackage::FromRepo(meta.clone()));
            }
        }
        if let Some(view) = keep_pending {
            out.push(TargetPackage::Keep(view.clone()));
        }

        out
    }

    /// Check declared conflicts and removed hard dependencies for one
    /// candidate against the current partial assignment.
    fn check_candidate(
        &mut self,
        name: &str,
        candidate: &TargetPackage,
        ident: &str,
        assignments: &BTreeMap<String, TargetPackage>,
    ) -> bool {
        // Candidate declares a conflict with something already chosen.
        for req in candidate.conflicts() {
            if let Some(assigned) = assignments.get(&req.name) {
                if req.constraint.satisfies(assigned.version()) {
                    self.witness(Witness::DeclaredConflict {
                        package: ident.to_string(),
                        conflicts_with: format!("{}-{}", assigned.name(), assigned.version()),
                    });
                    return false;
                }
            }
        }

        // Something already chosen declares a conflict with the candidate.
        for (_, assigned) in assignments.iter() {
            for req in assigned.conflicts() {
                if req.name == name && req.constraint.satisfies(candidate.version()) {
                    self.witness(Witness::DeclaredConflict {
                        package: format!("{}-{}", assigned.name(), assigned.version()),
                        conflicts_with: ident.to_string(),
                    });
                    return false;
                }
            }
        }

        for dep in candidate.depends() {
            if dep.optional {
                continue;
            }
            // Hard dependency on a name the request removes.
            if self.remove.contains(&dep.name) {
                self.witness(Witness::RemoveRequired {
                    removed: dep.name.clone(),
                    constraint: dep.constraint.clone(),
                    required_by: ident.to_string(),
                });
                return false;
            }
            // Hard dependency incompatible with an already-chosen version.
            if let Some(assigned) = assignments.get(&dep.name) {
                if !dep.constraint.satisfies(assigned.version()) {
                    self.witness(Witness::EmptyIntersection {
                        name: dep.name.clone(),
                        first: ConstraintRef {
                            name: dep.name.clone(),
                            constraint: dep.constraint.clone(),
                            origin: ConstraintOrigin::Dependency {
                                of: ident.to_string(),
                            },
                        },
                        second: ConstraintRef {
                            name: dep.name.clone(),
                            constraint: VersionConstraint::exact(assigned.version().clone()),
                            origin: ConstraintOrigin::Dependency {
                                of: format!("{}-{}", assigned.name(), assigned.version()),
                            },
                        },
                    });
                    return false;
                }
            }
        }

        true
    }

    fn keep_blocked_by_remove(&self, candidate: &TargetPackage) -> bool {
        candidate
            .depends()
            .iter()
            .any(|dep| !dep.optional && self.remove.contains(&dep.name))
    }

    fn state_key(&self, goal: &str, assignments: &BTreeMap<String, TargetPackage>) -> u64 {
        let mut hasher = DefaultHasher::new();
        goal.hash(&mut hasher);
        for (name, pkg) in assignments {
            name.hash(&mut hasher);
            pkg.version().to_string().hash(&mut hasher);
        }
        hasher.finish()
    }

    fn witness(&mut self, witness: Witness) {
        // Bounded; only the earliest dead ends matter for diagnostics.
        if self.witnesses.len() < 8 {
            self.witnesses.push(witness);
        }
    }
}

fn origin_label(origin: &ConstraintOrigin) -> String {
    match origin {
        ConstraintOrigin::Requested => "the request itself".to_string(),
        ConstraintOrigin::Dependency { of } | ConstraintOrigin::Installed { package: of } => {
            of.clone()
        }
    }
}

/// Find a pair of constraints whose intersection is empty
fn incompatible_pair(refs: &[ConstraintRef]) -> Option<(ConstraintRef, ConstraintRef)> {
    for i in 0..refs.len() {
        for j in (i + 1)..refs.len() {
            if !refs[i].constraint.is_compatible_with(&refs[j].constraint) {
                return Some((refs[i].clone(), refs[j].clone()));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{PackageMeta, Requirement};
    use crate::version::parse_version;
    use semver::Version;

    fn meta(name: &str, version: &str) -> PackageMeta {
        crate::store::tests::meta(name, version, "main")
    }

    fn with_deps(mut m: PackageMeta, deps: &[&str]) -> PackageMeta {
        m.depends = deps
            .iter()
            .map(|spec| {
                let (name, constraint) = crate::version::parse_requirement(spec).unwrap();
                Requirement {
                    name,
                    constraint,
                    optional: false,
                }
            })
            .collect();
        m
    }

    fn with_conflicts(mut m: PackageMeta, conflicts: &[&str]) -> PackageMeta {
        m.conflicts = conflicts
            .iter()
            .map(|spec| {
                let (name, constraint) = crate::version::parse_requirement(spec).unwrap();
                Requirement {
                    name,
                    constraint,
                    optional: false,
                }
            })
            .collect();
        m
    }

    fn installed_from(metas: &[&PackageMeta]) -> BTreeMap<String, InstalledView> {
        metas
            .iter()
            .map(|m| {
                (
                    m.name.clone(),
                    InstalledView {
                        name: m.name.clone(),
                        version: m.version.clone(),
                        depends: m.depends.clone(),
                        conflicts: m.conflicts.clone(),
                    },
                )
            })
            .collect()
    }

    fn c(s: &str) -> VersionConstraint {
        s.parse().unwrap()
    }

    #[test]
    fn test_install_pulls_in_dependency() {
        // installed = {}, request = install("app", ">=2.0"),
        // app@2.1 depends on lib@^1.0, lib@1.2 available
        let store = MetadataStore::from_packages(vec![
            with_deps(meta("app", "2.1"), &["lib ^1.0"]),
            meta("lib", "1.2"),
        ]);
        let installed = BTreeMap::new();

        let request = Request::new().install("app", c(">=2.0"));
        let target = solve(&store, &installed, &request, 10_000).unwrap();

        assert_eq!(target.len(), 2);
        assert_eq!(target.version_of("app"), Some(&Version::new(2, 1, 0)));
        assert_eq!(target.version_of("lib"), Some(&Version::new(1, 2, 0)));
    }

    #[test]
    fn test_remove_of_hard_dependency_fails() {
        // installed = {app@2.1, lib@1.2}, remove("lib") while app requires lib
        let app = with_deps(meta("app", "2.1"), &["lib ^1.0"]);
        let lib = meta("lib", "1.2");
        let store = MetadataStore::from_packages(vec![app.clone(), lib.clone()]);
        let installed = installed_from(&[&app, &lib]);

        let request = Request::new().remove("lib");
        let err = solve(&store, &installed, &request, 10_000).unwrap_err();

        let Error::Unsatisfiable(explanation) = err else {
            panic!("expected Unsatisfiable, got {err:?}");
        };
        assert!(!explanation.witnesses.is_empty());
        assert!(explanation.witnesses.iter().any(|w| matches!(
            w,
            Witness::RemoveRequired { removed, required_by, .. }
                if removed == "lib" && required_by.starts_with("app")
        )));
    }

    #[test]
    fn test_prefers_newest_satisfying_version() {
        let store = MetadataStore::from_packages(vec![
            meta("lib", "1.0"),
            meta("lib", "1.5"),
            meta("lib", "2.0"),
        ]);
        let installed = BTreeMap::new();

        let request = Request::new().install("lib", c("<2.0"));
        let target = solve(&store, &installed, &request, 10_000).unwrap();
        assert_eq!(target.version_of("lib"), Some(&Version::new(1, 5, 0)));
    }

    #[test]
    fn test_prefers_installed_version_over_upgrade() {
        // lib@1.2 installed and still satisfying; 1.9 available but not needed
        let lib12 = meta("lib", "1.2");
        let store = MetadataStore::from_packages(vec![lib12.clone(), meta("lib", "1.9")]);
        let installed = installed_from(&[&lib12]);

        let request = Request::new().install("lib", c("^1.0"));
        let target = solve(&store, &installed, &request, 10_000).unwrap();

        assert_eq!(target.version_of("lib"), Some(&Version::new(1, 2, 0)));
        assert!(matches!(
            target.packages.get("lib"),
            Some(TargetPackage::Keep(_))
        ));
    }

    #[test]
    fn test_prefer_newest_upgrades_installed() {
        let lib12 = meta("lib", "1.2");
        let store = MetadataStore::from_packages(vec![lib12.clone(), meta("lib", "1.9")]);
        let installed = installed_from(&[&lib12]);

        let request = Request::new().install("lib", c("^1.0")).prefer_newest();
        let target = solve(&store, &installed, &request, 10_000).unwrap();

        assert_eq!(target.version_of("lib"), Some(&Version::new(1, 9, 0)));
        assert!(matches!(
            target.packages.get("lib"),
            Some(TargetPackage::FromRepo(_))
        ));
    }

    #[test]
    fn test_prefer_newest_keeps_installed_over_downgrade() {
        // Only older versions are published; keeping beats downgrading.
        let lib19 = meta("lib", "1.9");
        let store = MetadataStore::from_packages(vec![meta("lib", "1.2")]);
        let installed = installed_from(&[&lib19]);

        let request = Request::new().install("lib", c("^1.0")).prefer_newest();
        let target = solve(&store, &installed, &request, 10_000).unwrap();

        assert_eq!(target.version_of("lib"), Some(&Version::new(1, 9, 0)));
        assert!(matches!(
            target.packages.get("lib"),
            Some(TargetPackage::Keep(_))
        ));
    }

    #[test]
    fn test_upgrades_installed_when_constraint_forces_it() {
        // new app needs lib >=2.0; installed lib@1.2 must move
        let lib12 = meta("lib", "1.2");
        let store = MetadataStore::from_packages(vec![
            lib12.clone(),
            meta("lib", "2.3"),
            with_deps(meta("app", "1.0"), &["lib >=2.0"]),
        ]);
        let installed = installed_from(&[&lib12]);

        let request = Request::new().install("app", c("*"));
        let target = solve(&store, &installed, &request, 10_000).unwrap();

        assert_eq!(target.version_of("lib"), Some(&Version::new(2, 3, 0)));
        assert!(matches!(
            target.packages.get("lib"),
            Some(TargetPackage::FromRepo(_))
        ));
    }

    #[test]
    fn test_conflicting_constraints_yield_witness_with_both() {
        // a needs shared >=2.0, b needs shared <2.0
        let store = MetadataStore::from_packages(vec![
            with_deps(meta("a", "1.0"), &["shared >=2.0"]),
            with_deps(meta("b", "1.0"), &["shared <2.0"]),
            meta("shared", "1.0"),
            meta("shared", "2.0"),
        ]);
        let installed = BTreeMap::new();

        let request = Request::new().install("a", c("*")).install("b", c("*"));
        let err = solve(&store, &installed, &request, 10_000).unwrap_err();

        let Error::Unsatisfiable(explanation) = err else {
            panic!("expected Unsatisfiable");
        };
        let found = explanation.witnesses.iter().any(|w| {
            matches!(w, Witness::EmptyIntersection { name, .. } if name == "shared")
        });
        assert!(found, "witness should reference the shared dependency: {explanation}");
    }

    #[test]
    fn test_declared_conflict_detected() {
        let store = MetadataStore::from_packages(vec![
            with_conflicts(meta("postfix", "3.0"), &["sendmail"]),
            meta("sendmail", "8.0"),
        ]);
        let installed = BTreeMap::new();

        let request = Request::new()
            .install("postfix", c("*"))
            .install("sendmail", c("*"));
        let err = solve(&store, &installed, &request, 10_000).unwrap_err();

        let Error::Unsatisfiable(explanation) = err else {
            panic!("expected Unsatisfiable");
        };
        assert!(explanation
            .witnesses
            .iter()
            .any(|w| matches!(w, Witness::DeclaredConflict { .. })));
    }

    #[test]
    fn test_backtracks_to_older_version_on_conflict() {
        // newest lib@2.0 conflicts with pinned app requirement; lib@1.5 works
        let store = MetadataStore::from_packages(vec![
            with_deps(meta("app", "1.0"), &["lib *", "helper *"]),
            meta("lib", "2.0"),
            meta("lib", "1.5"),
            with_deps(meta("helper", "1.0"), &["lib <2.0"]),
        ]);
        let installed = BTreeMap::new();

        let request = Request::new().install("app", c("*"));
        let target = solve(&store, &installed, &request, 10_000).unwrap();
        assert_eq!(target.version_of("lib"), Some(&Version::new(1, 5, 0)));
    }

    #[test]
    fn test_diamond_dependency_resolves_once() {
        // a -> {b, c}, b -> shared ^1.0, c -> shared ^1.0
        let store = MetadataStore::from_packages(vec![
            with_deps(meta("a", "1.0"), &["b *", "c *"]),
            with_deps(meta("b", "1.0"), &["shared ^1.0"]),
            with_deps(meta("c", "1.0"), &["shared ^1.0"]),
            meta("shared", "1.4"),
        ]);
        let installed = BTreeMap::new();

        let request = Request::new().install("a", c("*"));
        let target = solve(&store, &installed, &request, 10_000).unwrap();
        assert_eq!(target.len(), 4);
        assert_eq!(target.version_of("shared"), Some(&Version::new(1, 4, 0)));
    }

    #[test]
    fn test_dependency_cycle_is_not_an_error() {
        // glibc-style mutual dependency at solve time
        let store = MetadataStore::from_packages(vec![
            with_deps(meta("ping", "1.0"), &["pong *"]),
            with_deps(meta("pong", "1.0"), &["ping *"]),
        ]);
        let installed = BTreeMap::new();

        let request = Request::new().install("ping", c("*"));
        let target = solve(&store, &installed, &request, 10_000).unwrap();
        assert_eq!(target.len(), 2);
    }

    #[test]
    fn test_missing_package_reports_no_candidate() {
        let store = MetadataStore::from_packages(vec![meta("lib", "1.0")]);
        let installed = BTreeMap::new();

        let request = Request::new().install("ghost", c(">=1.0"));
        let err = solve(&store, &installed, &request, 10_000).unwrap_err();

        let Error::Unsatisfiable(explanation) = err else {
            panic!("expected Unsatisfiable");
        };
        assert!(explanation.witnesses.iter().any(|w| matches!(
            w,
            Witness::NoCandidate { constraint } if constraint.name == "ghost"
        )));
    }

    #[test]
    fn test_remove_leaf_package_succeeds() {
        let app = with_deps(meta("app", "2.1"), &["lib ^1.0"]);
        let lib = meta("lib", "1.2");
        let store = MetadataStore::from_packages(vec![app.clone(), lib.clone()]);
        let installed = installed_from(&[&app, &lib]);

        let request = Request::new().remove("app");
        let target = solve(&store, &installed, &request, 10_000).unwrap();

        assert!(!target.contains("app"));
        // lib stays (no autoremove)
        assert!(target.contains("lib"));
    }

    #[test]
    fn test_install_and_remove_same_name_is_unsatisfiable() {
        let store = MetadataStore::from_packages(vec![meta("lib", "1.0")]);
        let installed = BTreeMap::new();

        let request = Request::new().install("lib", c("*")).remove("lib");
        let err = solve(&store, &installed, &request, 10_000).unwrap_err();
        assert!(matches!(err, Error::Unsatisfiable(_)));
    }

    #[test]
    fn test_budget_exhaustion_is_reported() {
        // Deep chain with a contradiction at the bottom forces backtracking
        // through every version pair; a tiny budget gives up first.
        let mut packages = Vec::new();
        for i in 0..6 {
            for v in ["1.0", "1.1", "1.2"] {
                let name = format!("p{i}");
                let dep = format!("p{} *", i + 1);
                packages.push(with_deps(
                    crate::store::tests::meta(&name, v, "main"),
                    &[dep.as_str()],
                ));
            }
        }
        // Bottom of the chain requires a version that does not exist.
        packages.push(with_deps(meta("p6", "1.0"), &["absent >=9.0"]));
        let store = MetadataStore::from_packages(packages);
        let installed = BTreeMap::new();

        let request = Request::new().install("p0", c("*"));
        let err = solve(&store, &installed, &request, 3).unwrap_err();

        let Error::Unsatisfiable(explanation) = err else {
            panic!("expected Unsatisfiable");
        };
        assert!(explanation
            .witnesses
            .iter()
            .any(|w| matches!(w, Witness::BudgetExceeded { .. })));
    }

    #[test]
    fn test_optional_dependency_does_not_force_install() {
        let mut app = meta("app", "1.0");
        app.depends = vec![Requirement {
            name: "extras".to_string(),
            constraint: c("^1.0"),
            optional: true,
        }];
        let store = MetadataStore::from_packages(vec![app]);
        let installed = BTreeMap::new();

        let request = Request::new().install("app", c("*"));
        let target = solve(&store, &installed, &request, 10_000).unwrap();

        assert!(target.contains("app"));
        assert!(!target.contains("extras"));
    }

    #[test]
    fn test_idempotent_replan_after_commit() {
        // Post-commit installed set equals the target; re-solving the same
        // request keeps everything.
        let app = with_deps(meta("app", "2.1"), &["lib ^1.0"]);
        let lib = meta("lib", "1.2");
        let store = MetadataStore::from_packages(vec![app.clone(), lib.clone()]);
        let installed = installed_from(&[&app, &lib]);

        let request = Request::new().install("app", c(">=2.0"));
        let target = solve(&store, &installed, &request, 10_000).unwrap();

        for (name, pkg) in target.iter() {
            assert!(
                matches!(pkg, TargetPackage::Keep(_)),
                "{name} should be kept as-is"
            );
        }
    }

    #[test]
    fn test_lenient_versions_from_fixture() {
        assert_eq!(parse_version("2.1").unwrap(), Version::new(2, 1, 0));
    }
}
