// src/plan.rs

//! Transaction planner
//!
//! Orders the diff between the installed set and a resolved target set
//! into install/remove/replace steps: installs run dependencies-first,
//! removals run dependents-first (leaves last), and a replace keeps the
//! old version's files in place until the new version's are staged.
//!
//! Graphs are walked with an explicit stack and three-color marking, never
//! by recursion through package references.

use crate::error::{Error, Result};
use crate::repository::PackageMeta;
use crate::solver::{InstalledView, TargetPackage, TargetSet};
use semver::Version;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

/// One unit of work in a transaction
#[derive(Debug, Clone)]
pub enum Step {
    Install(PackageMeta),
    Remove { name: String, version: Version },
    Replace { old_version: Version, new: PackageMeta },
}

impl Step {
    pub fn name(&self) -> &str {
        match self {
            Step::Install(meta) => &meta.name,
            Step::Remove { name, .. } => name,
            Step::Replace { new, .. } => &new.name,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Install(meta) => write!(f, "install {}", meta.ident()),
            Step::Remove { name, version } => write!(f, "remove {}-{}", name, version),
            Step::Replace { old_version, new } => {
                write!(f, "replace {}-{} with {}", new.name, old_version, new.ident())
            }
        }
    }
}

/// Ordered step sequence produced by the planner. Ephemeral - persisted
/// only as the executor's write-ahead journal.
#[derive(Debug, Clone, Default)]
pub struct TransactionPlan {
    pub steps: Vec<Step>,
}

impl TransactionPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

impl fmt::Display for TransactionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "nothing to do");
        }
        let parts: Vec<String> = self.steps.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// DFS node state for the three-color walks below
#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    White,
    Gray,
    Black,
}

/// Compute the ordered step sequence turning `installed` into `target`
pub fn plan(
    installed: &BTreeMap<String, InstalledView>,
    target: &TargetSet,
) -> Result<TransactionPlan> {
    let mut steps = Vec::new();

    // Removals first, dependents before dependencies.
    let removed: BTreeMap<&String, &InstalledView> = installed
        .iter()
        .filter(|(name, _)| !target.contains(name))
        .collect();
    for name in removal_order(&removed) {
        let view = removed[&name];
        steps.push(Step::Remove {
            name: name.clone(),
            version: view.version.clone(),
        });
    }

    // Then installs and replaces, dependencies before dependents.
    let incoming: BTreeMap<&String, &PackageMeta> = target
        .iter()
        .filter_map(|(name, pkg)| match pkg {
            TargetPackage::FromRepo(meta) => Some((name, meta)),
            TargetPackage::Keep(_) => None,
        })
        .collect();

    detect_hard_cycle(&incoming, installed)?;

    for name in install_order(&incoming) {
        let meta = incoming[&name];
        match installed.get(&name) {
            Some(old) => steps.push(Step::Replace {
                old_version: old.version.clone(),
                new: meta.clone(),
            }),
            None => steps.push(Step::Install(meta.clone())),
        }
    }

    debug!("Planned {} step(s)", steps.len());
    Ok(TransactionPlan { steps })
}

/// Order removed packages so every package precedes its dependencies
/// (leaves of the reverse-dependency graph go last). Cycles among removed
/// packages are allowed - any order within the cycle is valid.
fn removal_order(removed: &BTreeMap<&String, &InstalledView>) -> Vec<String> {
    // Post-order emits dependencies first; reversed, dependents come first.
    let adjacency: HashMap<&str, Vec<&str>> = removed
        .iter()
        .map(|(name, view)| {
            let deps: Vec<&str> = view
                .depends
                .iter()
                .filter(|d| removed.contains_key(&d.name))
                .map(|d| d.name.as_str())
                .collect();
            (name.as_str(), deps)
        })
        .collect();

    let mut order = postorder(&adjacency);
    order.reverse();
    order
}

/// Order incoming packages dependencies-first. Back edges (cycles already
/// rejected or broken by a pre-existing version) are skipped.
fn install_order(incoming: &BTreeMap<&String, &PackageMeta>) -> Vec<String> {
    let adjacency: HashMap<&str, Vec<&str>> = incoming
        .iter()
        .map(|(name, meta)| {
            let deps: Vec<&str> = meta
                .depends
                .iter()
                .filter(|d| !d.optional && incoming.contains_key(&d.name))
                .map(|d| d.name.as_str())
                .collect();
            (name.as_str(), deps)
        })
        .collect();

    postorder(&adjacency)
}

/// Iterative post-order DFS over `adjacency`, deterministic (keys sorted),
/// tolerant of cycles (back edges ignored).
fn postorder(adjacency: &HashMap<&str, Vec<&str>>) -> Vec<String> {
    let mut marks: HashMap<&str, Mark> = adjacency.keys().map(|k| (*k, Mark::White)).collect();
    let mut order = Vec::new();

    let mut roots: Vec<&str> = adjacency.keys().copied().collect();
    roots.sort();

    for root in roots {
        if marks[root] != Mark::White {
            continue;
        }
        // Explicit stack of (node, next child index)
        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
        marks.insert(root, Mark::Gray);

        while let Some((node, child_idx)) = stack.pop() {
            let children = &adjacency[node];
            if child_idx < children.len() {
                stack.push((node, child_idx + 1));
                let child = children[child_idx];
                if marks.get(child) == Some(&Mark::White) {
                    marks.insert(child, Mark::Gray);
                    stack.push((child, 0));
                }
            } else {
                marks.insert(node, Mark::Black);
                order.push(node.to_string());
            }
        }
    }

    order
}

/// Reject a dependency cycle among packages being newly installed when no
/// pre-existing installed version can break it. An edge into a replace
/// whose old installed version satisfies the dependent's constraint is not
/// a hard edge: the old version covers the window.
fn detect_hard_cycle(
    incoming: &BTreeMap<&String, &PackageMeta>,
    installed: &BTreeMap<String, InstalledView>,
) -> Result<()> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for (name, meta) in incoming {
        let mut edges = Vec::new();
        for dep in &meta.depends {
            if dep.optional || !incoming.contains_key(&dep.name) {
                continue;
            }
            if let Some(old) = installed.get(&dep.name) {
                if dep.constraint.satisfies(&old.version) {
                    continue;
                }
            }
            edges.push(dep.name.as_str());
        }
        adjacency.insert(name.as_str(), edges);
    }

    // Three-color DFS; a gray child is a back edge, i.e. a hard cycle.
    let mut marks: HashMap<&str, Mark> = adjacency.keys().map(|k| (*k, Mark::White)).collect();
    let mut roots: Vec<&str> = adjacency.keys().copied().collect();
    roots.sort();

    for root in roots {
        if marks[root] != Mark::White {
            continue;
        }
        let mut stack: Vec<(&str, usize)> = vec![(root, 0)];
        marks.insert(root, Mark::Gray);

        while let Some((node, child_idx)) = stack.pop() {
            let children = &adjacency[node];
            if child_idx < children.len() {
                stack.push((node, child_idx + 1));
                let child = children[child_idx];
                match marks.get(child) {
                    Some(Mark::White) => {
                        marks.insert(child, Mark::Gray);
                        stack.push((child, 0));
                    }
                    Some(Mark::Gray) => {
                        // Cycle members are the gray nodes on the stack from
                        // the back edge's target onward.
                        let mut cycle: Vec<String> = stack
                            .iter()
                            .map(|(n, _)| n.to_string())
                            .skip_while(|n| n.as_str() != child)
                            .collect();
                        cycle.push(child.to_string());
                        return Err(Error::CyclicHardDependency(cycle));
                    }
                    _ => {}
                }
            } else {
                marks.insert(node, Mark::Black);
            }
        }
    }

    Ok(())
}
