//! engine::plan
//!
//! Traversal Planner.
//!
//! # Ordering
//!
//! The plan is the starting branch (unless it is a root) followed by its
//! descendants in depth-first preorder. Every node therefore comes after
//! its upstream, and siblings keep the order in which the builder
//! enumerated them, so identical repository state always yields an
//! identical plan.
//!
//! # Invariants
//!
//! - The planner does not perform I/O
//! - Ancestors of the starting branch and unrelated branches are excluded
//! - Roots are never planned

use crate::core::ops::BranchNode;
use crate::core::types::BranchName;

use super::build::BranchGraph;
use super::RbrError;

/// Order `start` and its descendants for rebasing.
///
/// # Example
///
/// ```
/// use git_rbr::core::types::BranchName;
/// use git_rbr::engine::{build::build, plan::plan};
/// use git_rbr::git::MockVcs;
///
/// let vcs = MockVcs::new();
/// vcs.commit("main", "init");
/// vcs.create_branch("a", "main");
/// vcs.create_branch("b", "a");
///
/// let graph = build(&vcs, &[]).unwrap();
/// let order: Vec<String> = plan(&graph, &BranchName::new("a").unwrap())
///     .unwrap()
///     .into_iter()
///     .map(|node| node.name.to_string())
///     .collect();
/// assert_eq!(order, vec!["a", "b"]);
/// ```
pub fn plan(graph: &BranchGraph, start: &BranchName) -> Result<Vec<BranchNode>, RbrError> {
    if !graph.forest.contains(start) {
        return Err(RbrError::Config(format!("branch '{start}' does not exist")));
    }
    if let Some(cycle) = graph.forest.find_cycle() {
        return Err(RbrError::Cycle(cycle));
    }

    let mut order = Vec::new();
    if !graph.forest.is_root(start) {
        order.push(start.clone());
    }
    order.extend(graph.forest.descendants(start));

    order
        .into_iter()
        .map(|name| {
            let upstream = graph
                .forest
                .upstream(&name)
                .cloned()
                .ok_or_else(|| RbrError::Config(format!("'{name}' has no upstream")))?;
            let original_tip = graph.tip(&name)?.clone();
            let upstream_base = graph.tip(&upstream)?.clone();
            Ok(BranchNode::new(name, upstream, original_tip, upstream_base))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::build::build;
    use crate::git::MockVcs;

    fn b(s: &str) -> BranchName {
        BranchName::new(s).unwrap()
    }

    fn names(nodes: &[BranchNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    /// main <- a <- {b <- d, c}; main <- x
    fn tree() -> BranchGraph {
        let vcs = MockVcs::new();
        vcs.commit("main", "init");
        vcs.create_branch("a", "main");
        vcs.create_branch("b", "a");
        vcs.create_branch("c", "a");
        vcs.create_branch("d", "b");
        vcs.create_branch("x", "main");
        build(&vcs, &[]).unwrap()
    }

    #[test]
    fn starting_branch_and_descendants_in_preorder() {
        let nodes = plan(&tree(), &b("a")).unwrap();
        assert_eq!(names(&nodes), vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn root_start_is_not_planned() {
        let nodes = plan(&tree(), &b("main")).unwrap();
        assert_eq!(names(&nodes), vec!["a", "b", "d", "c", "x"]);
    }

    #[test]
    fn ancestors_and_unrelated_are_excluded() {
        let nodes = plan(&tree(), &b("b")).unwrap();
        assert_eq!(names(&nodes), vec!["b", "d"]);
    }

    #[test]
    fn nodes_record_upstream_and_tips() {
        let graph = tree();
        let nodes = plan(&graph, &b("b")).unwrap();
        let node = &nodes[0];
        assert_eq!(node.upstream, b("a"));
        assert_eq!(&node.original_tip, graph.tip(&b("b")).unwrap());
        assert_eq!(&node.upstream_base, graph.tip(&b("a")).unwrap());
        assert!(node.planned_upstream_tip.is_none());
    }

    #[test]
    fn leaf_start_plans_itself() {
        let nodes = plan(&tree(), &b("d")).unwrap();
        assert_eq!(names(&nodes), vec!["d"]);
    }

    #[test]
    fn unknown_start_is_config_error() {
        assert!(matches!(
            plan(&tree(), &b("nope")),
            Err(RbrError::Config(_))
        ));
    }

    #[test]
    fn identical_input_gives_identical_plan() {
        let first = plan(&tree(), &b("main")).unwrap();
        let second = plan(&tree(), &b("main")).unwrap();
        assert_eq!(first, second);
    }
}
