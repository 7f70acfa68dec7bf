//! core::graph
//!
//! The branch forest derived from upstream tracking configuration.
//!
//! # Architecture
//!
//! - Nodes are local branches
//! - Edges point from a branch to its local upstream (parent pointer)
//! - Roots are branches with no local upstream (trunk, or branches that
//!   track a remote) and are never rebased
//!
//! # Determinism
//!
//! Sibling order is the order in which branches were enumerated, recorded
//! explicitly in `order` rather than inherited from a map's iteration order.
//! Two scans of identical repository state yield identical children lists.
//!
//! # Invariants
//!
//! - A forest is acyclic; [`BranchForest::find_cycle`] is checked by the
//!   builder before the forest is handed to the planner

use super::types::BranchName;
use std::collections::{HashMap, HashSet};

/// In-memory forest of local branches.
#[derive(Debug, Default, Clone)]
pub struct BranchForest {
    /// Every branch, in enumeration order.
    order: Vec<BranchName>,
    /// Local upstream of each non-root branch.
    upstreams: HashMap<BranchName, BranchName>,
    /// Children of each branch, in enumeration order of the child.
    children: HashMap<BranchName, Vec<BranchName>>,
}

impl BranchForest {
    /// Create an empty forest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a branch. Registration order fixes sibling order.
    pub fn add_branch(&mut self, branch: BranchName) {
        if !self.contains(&branch) {
            self.children.entry(branch.clone()).or_default();
            self.order.push(branch);
        }
    }

    /// Record that `child` tracks `parent`.
    ///
    /// Both ends are registered if they were not already.
    pub fn add_edge(&mut self, child: BranchName, parent: BranchName) {
        self.add_branch(parent.clone());
        self.add_branch(child.clone());
        if let Some(previous) = self.upstreams.insert(child.clone(), parent.clone()) {
            if let Some(siblings) = self.children.get_mut(&previous) {
                siblings.retain(|c| c != &child);
            }
        }
        let siblings = self.children.entry(parent).or_default();
        siblings.push(child);
        let position: HashMap<&BranchName, usize> =
            self.order.iter().enumerate().map(|(i, b)| (b, i)).collect();
        siblings.sort_by_key(|b| position.get(b).copied().unwrap_or(usize::MAX));
    }

    pub fn contains(&self, branch: &BranchName) -> bool {
        self.children.contains_key(branch)
    }

    /// Local upstream of a branch, if it has one.
    pub fn upstream(&self, branch: &BranchName) -> Option<&BranchName> {
        self.upstreams.get(branch)
    }

    /// Children of a branch in discovery order.
    pub fn children(&self, branch: &BranchName) -> &[BranchName] {
        self.children.get(branch).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_root(&self, branch: &BranchName) -> bool {
        self.contains(branch) && !self.upstreams.contains_key(branch)
    }

    /// All branches in enumeration order.
    pub fn branches(&self) -> impl Iterator<Item = &BranchName> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Find a cycle in the upstream relation.
    ///
    /// Walks upstream links from every branch (in enumeration order) and
    /// returns the members of the first cycle found, starting at the node
    /// that was revisited.
    pub fn find_cycle(&self) -> Option<Vec<BranchName>> {
        let mut cleared: HashSet<&BranchName> = HashSet::new();

        for start in &self.order {
            let mut path: Vec<&BranchName> = Vec::new();
            let mut on_path: HashSet<&BranchName> = HashSet::new();
            let mut current = Some(start);

            while let Some(branch) = current {
                if cleared.contains(branch) {
                    break;
                }
                if !on_path.insert(branch) {
                    let first = path.iter().position(|b| *b == branch).unwrap_or(0);
                    return Some(path[first..].iter().map(|b| (*b).clone()).collect());
                }
                path.push(branch);
                current = self.upstreams.get(branch);
            }

            cleared.extend(path);
        }

        None
    }

    /// Descendants of `branch` in depth-first preorder, siblings in
    /// discovery order. `branch` itself is not included.
    ///
    /// ```
    /// use git_rbr::core::graph::BranchForest;
    /// use git_rbr::core::types::BranchName;
    ///
    /// let b = |s: &str| BranchName::new(s).unwrap();
    /// let mut forest = BranchForest::new();
    /// forest.add_edge(b("a"), b("main"));
    /// forest.add_edge(b("b"), b("a"));
    /// forest.add_edge(b("c"), b("main"));
    ///
    /// assert_eq!(forest.descendants(&b("main")), vec![b("a"), b("b"), b("c")]);
    /// ```
    pub fn descendants(&self, branch: &BranchName) -> Vec<BranchName> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<&BranchName> = self.children(branch).iter().rev().collect();

        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            result.push(current.clone());
            stack.extend(self.children(current).iter().rev());
        }

        result
    }

    /// Ancestors from immediate upstream to root.
    ///
    /// Stops early if the upstream chain loops.
    pub fn ancestors(&self, branch: &BranchName) -> Vec<BranchName> {
        let mut result = Vec::new();
        let mut seen = HashSet::from([branch]);
        let mut current = self.upstream(branch);

        while let Some(parent) = current {
            if !seen.insert(parent) {
                break;
            }
            result.push(parent.clone());
            current = self.upstream(parent);
        }

        result
    }
}
