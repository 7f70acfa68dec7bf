//! engine::step
//!
//! Step Executor: one branch, one call to the rebase primitive.
//!
//! # Onto resolution
//!
//! A branch is rebased onto its upstream's *new* tip when the upstream was
//! rebased earlier in this session and is `Done`, otherwise onto the
//! upstream's tip as of session start. Only commits not reachable from the
//! upstream's session-start tip are replayed.
//!
//! # Invariants
//!
//! - At most one branch ref is mutated per step
//! - A branch already containing its onto tip is marked `Done` without
//!   invoking the primitive, which makes re-executing an interrupted step
//!   safe

use crate::core::ops::{NodeStatus, RebaseSession};
use crate::core::types::Oid;
use crate::git::{RebaseOutcome, Vcs};

use super::RbrError;

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// The branch now points at this commit.
    Success(Oid),
    /// The primitive stopped while replaying `at`.
    Conflict { at: Option<Oid> },
}

/// How to conclude a stopped replay step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// Commit the user's resolution.
    Continue,
    /// Drop the stopped commit.
    Skip,
}

/// The tip the current node should be rebased onto.
pub fn resolve_onto(session: &RebaseSession) -> Option<Oid> {
    let node = session.current()?;
    let onto = match session.node(&node.upstream) {
        Some(upstream) if upstream.status == NodeStatus::Done => upstream.final_tip().clone(),
        _ => node.upstream_base.clone(),
    };
    Some(onto)
}

/// Mark the current node in progress and record its onto tip.
pub fn begin(session: &mut RebaseSession) {
    let onto = resolve_onto(session);
    if let Some(node) = session.current_mut() {
        node.status = NodeStatus::InProgress;
        node.planned_upstream_tip = onto;
    }
}

/// Rebase the current node.
///
/// # Errors
///
/// [`RbrError::Primitive`] when the primitive fails without a conflict.
pub fn execute<V: Vcs + ?Sized>(vcs: &V, session: &mut RebaseSession) -> Result<StepResult, RbrError> {
    let onto = resolve_onto(session)
        .ok_or_else(|| RbrError::Config("session has no current branch".to_string()))?;
    let Some(node) = session.current().cloned() else {
        return Err(RbrError::Config("session has no current branch".to_string()));
    };

    let tip = vcs.tip(&node.name).map_err(RbrError::Primitive)?;
    if vcs.is_ancestor(&onto, &tip).map_err(RbrError::Primitive)? {
        tracing::debug!(branch = %node.name, onto = %onto.short(12), "already up to date");
        record(session, StepResult::Success(tip.clone()));
        return Ok(StepResult::Success(tip));
    }

    if tracing::enabled!(tracing::Level::DEBUG) {
        let commits = vcs
            .unique_commits(&node.name, &node.upstream_base)
            .map_err(RbrError::Primitive)?;
        tracing::debug!(
            branch = %node.name,
            onto = %onto.short(12),
            commits = commits.len(),
            "rebasing"
        );
    }

    let outcome = vcs
        .rebase(&node.name, &onto, &node.upstream_base)
        .map_err(RbrError::Primitive)?;
    let result = into_step(outcome);
    record(session, result.clone());
    Ok(result)
}

/// Conclude the replay step the primitive stopped on.
pub fn conclude<V: Vcs + ?Sized>(
    vcs: &V,
    session: &mut RebaseSession,
    mode: Resume,
) -> Result<StepResult, RbrError> {
    let outcome = match mode {
        Resume::Continue => vcs.continue_rebase(),
        Resume::Skip => vcs.skip_current_step(),
    }
    .map_err(RbrError::Primitive)?;

    let result = into_step(outcome);
    record(session, result.clone());
    Ok(result)
}

fn into_step(outcome: RebaseOutcome) -> StepResult {
    match outcome {
        RebaseOutcome::Success(tip) => StepResult::Success(tip),
        RebaseOutcome::Conflict { at } => StepResult::Conflict { at },
    }
}

fn record(session: &mut RebaseSession, result: StepResult) {
    if let Some(node) = session.current_mut() {
        match result {
            StepResult::Success(tip) => {
                node.status = NodeStatus::Done;
                node.new_tip = Some(tip);
            }
            StepResult::Conflict { .. } => node.status = NodeStatus::Conflicted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BranchName;
    use crate::engine::{build::build, plan::plan};
    use crate::git::MockVcs;

    fn b(s: &str) -> BranchName {
        BranchName::new(s).unwrap()
    }

    /// main <- a <- b, main and a both advanced.
    fn setup() -> (MockVcs, RebaseSession) {
        let vcs = MockVcs::new();
        vcs.commit("main", "main");
        vcs.create_branch("a", "main");
        vcs.commit("a", "a");
        vcs.create_branch("b", "a");
        vcs.commit("b", "b");
        vcs.commit("main", "main2");
        vcs.commit("a", "a2");

        let graph = build(&vcs, &[]).unwrap();
        let session = RebaseSession::new(plan(&graph, &b("a")).unwrap(), Some(b("a")));
        (vcs, session)
    }

    #[test]
    fn first_node_uses_session_start_tip() {
        let (vcs, session) = setup();
        assert_eq!(resolve_onto(&session), Some(vcs.tip_of("main")));
    }

    #[test]
    fn later_node_uses_rebased_upstream() {
        let (vcs, mut session) = setup();
        begin(&mut session);
        let StepResult::Success(new_a) = execute(&vcs, &mut session).unwrap() else {
            panic!("expected success");
        };
        session.advance();

        assert_eq!(resolve_onto(&session), Some(new_a.clone()));
        begin(&mut session);
        assert_eq!(session.current().unwrap().planned_upstream_tip, Some(new_a));
        assert_eq!(session.current().unwrap().status, NodeStatus::InProgress);

        execute(&vcs, &mut session).unwrap();
        assert_eq!(
            vcs.subjects("b"),
            vec!["main", "main2", "a", "a2", "b"]
        );
    }

    #[test]
    fn already_atop_skips_primitive() {
        let vcs = MockVcs::new();
        vcs.commit("main", "main");
        vcs.create_branch("a", "main");
        vcs.commit("a", "a");
        let graph = build(&vcs, &[]).unwrap();
        let mut session = RebaseSession::new(plan(&graph, &b("a")).unwrap(), None);

        begin(&mut session);
        let result = execute(&vcs, &mut session).unwrap();

        assert_eq!(result, StepResult::Success(vcs.tip_of("a")));
        assert_eq!(vcs.rebase_count(), 0);
        assert_eq!(session.current().unwrap().status, NodeStatus::Done);
    }

    #[test]
    fn conflict_marks_node() {
        let (vcs, mut session) = setup();
        vcs.conflict_on("a2");

        begin(&mut session);
        let result = execute(&vcs, &mut session).unwrap();

        assert!(matches!(result, StepResult::Conflict { at: Some(_) }));
        assert_eq!(session.current().unwrap().status, NodeStatus::Conflicted);
        assert!(session.current().unwrap().new_tip.is_none());
    }

    #[test]
    fn conclude_skip_finishes_node() {
        let (vcs, mut session) = setup();
        vcs.conflict_on("a2");
        begin(&mut session);
        execute(&vcs, &mut session).unwrap();

        let result = conclude(&vcs, &mut session, Resume::Skip).unwrap();
        assert!(matches!(result, StepResult::Success(_)));
        assert_eq!(vcs.subjects("a"), vec!["main", "main2", "a"]);
        assert_eq!(session.current().unwrap().status, NodeStatus::Done);
    }

    #[test]
    fn primitive_failure_is_reported() {
        let (vcs, mut session) = setup();
        vcs.fail_next_rebase();
        begin(&mut session);

        assert!(matches!(
            execute(&vcs, &mut session),
            Err(RbrError::Primitive(_))
        ));
        assert_eq!(session.current().unwrap().status, NodeStatus::InProgress);
    }
}
