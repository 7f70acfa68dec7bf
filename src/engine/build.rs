//! engine::build
//!
//! Branch Graph Builder: turns tracking configuration into a [`BranchForest`].
//!
//! # Roots
//!
//! A branch is a root, and is never scheduled for rebase, when it
//! - has no tracking configuration,
//! - tracks a remote-tracking branch, or
//! - is listed in the configured `trunk`.
//!
//! # Errors
//!
//! Inconsistent tracking configuration anywhere in the repository is a
//! [`RbrError::Config`]; an upstream loop anywhere is a [`RbrError::Cycle`].
//! Both are raised before anything is mutated. The builder is read-only.

use std::collections::HashMap;

use crate::core::graph::BranchForest;
use crate::core::types::{BranchName, Oid};
use crate::git::{GitError, Upstream, Vcs};

use super::RbrError;

/// The forest plus the tip of every branch at scan time.
#[derive(Debug, Clone, Default)]
pub struct BranchGraph {
    pub forest: BranchForest,
    pub tips: HashMap<BranchName, Oid>,
}

impl BranchGraph {
    pub fn tip(&self, branch: &BranchName) -> Result<&Oid, RbrError> {
        self.tips
            .get(branch)
            .ok_or_else(|| RbrError::Config(format!("branch '{branch}' does not exist")))
    }
}

/// Scan every local branch and its upstream.
pub fn build<V: Vcs + ?Sized>(vcs: &V, trunk: &[BranchName]) -> Result<BranchGraph, RbrError> {
    let branches = vcs.list_branches()?;
    let mut graph = BranchGraph::default();

    for branch in &branches {
        graph.forest.add_branch(branch.clone());
        graph.tips.insert(branch.clone(), vcs.tip(branch)?);
    }

    for branch in &branches {
        if trunk.contains(branch) {
            tracing::trace!(%branch, "trunk branch");
            continue;
        }

        let upstream = vcs.tracking_upstream(branch).map_err(|e| match e {
            GitError::TrackingConfig { .. } => RbrError::Config(e.to_string()),
            other => RbrError::Git(other),
        })?;

        match upstream {
            Upstream::Local(parent) => {
                if !graph.tips.contains_key(&parent) {
                    return Err(RbrError::Config(format!(
                        "'{branch}' tracks '{parent}', which is not a local branch"
                    )));
                }
                tracing::trace!(%branch, %parent, "local upstream");
                graph.forest.add_edge(branch.clone(), parent);
            }
            Upstream::Remote { remote, merge } => {
                tracing::trace!(%branch, %remote, %merge, "remote upstream, treated as root");
            }
            Upstream::None => {}
        }
    }

    if let Some(cycle) = graph.forest.find_cycle() {
        return Err(RbrError::Cycle(cycle));
    }

    tracing::debug!(branches = graph.forest.len(), "built branch graph");
    Ok(graph)
}
