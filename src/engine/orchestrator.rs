//! engine::orchestrator
//!
//! The session state machine.
//!
//! ```text
//!   Idle --fresh run--> Running --conflict--> Suspended
//!    ^                     |                      |
//!    |                  plan done       --continue / --skip
//!    |                     |                      |
//!    +---------------------+<------ Running <-----+
//!    |
//!    +------------------- --abort (from Suspended or Running)
//! ```
//!
//! The session file is the only thing carrying state between invocations.
//! It is checkpointed before every primitive call and after every step, so
//! an interrupted process can always be resumed or aborted.
//!
//! # Two levels of state
//!
//! While suspended, the primitive normally has its own rebase stopped. On
//! resume the primitive's state decides what happens:
//! - rebase in progress: conclude it (`--continue` / `--skip`)
//! - idle: the step never started or already finished; `--continue`
//!   re-executes it, `--skip` refuses

use crate::core::ops::{BranchNode, NodeStatus, RebaseSession, RepoLock, SessionStore};
use crate::core::types::{BranchName, Oid};
use crate::git::Vcs;

use super::build::{build, BranchGraph};
use super::plan::plan;
use super::step::{self, Resume, StepResult};
use super::RbrError;

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Start a new session from `branch`, or from the checked-out branch.
    Start { branch: Option<BranchName> },
    Continue,
    Skip,
    Abort,
}

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every planned branch is atop its upstream; the session is cleared.
    Completed { rebased: Vec<BranchName> },
    /// Nothing needed rebasing; no session was created.
    UpToDate,
    /// Suspended on a conflict; the session is on disk.
    Conflicted {
        branch: BranchName,
        at: Option<Oid>,
        position: usize,
        total: usize,
    },
    /// Every branch was reset to its original tip; the session is cleared.
    Aborted { restored: usize },
}

/// Drives sessions against one repository.
#[derive(Debug)]
pub struct Orchestrator<'a, V: Vcs + ?Sized> {
    vcs: &'a V,
    store: SessionStore,
    trunk: Vec<BranchName>,
    restore_head: bool,
}

impl<'a, V: Vcs + ?Sized> Orchestrator<'a, V> {
    pub fn new(vcs: &'a V, store: SessionStore) -> Self {
        Self {
            vcs,
            store,
            trunk: Vec::new(),
            restore_head: true,
        }
    }

    /// Branches always treated as roots.
    pub fn with_trunk(mut self, trunk: Vec<BranchName>) -> Self {
        self.trunk = trunk;
        self
    }

    /// Check the original branch out again when a session ends.
    pub fn with_restore_head(mut self, restore_head: bool) -> Self {
        self.restore_head = restore_head;
        self
    }

    /// Perform `action` while holding the repository lock.
    pub fn run(&self, action: Action) -> Result<RunOutcome, RbrError> {
        let _lock = RepoLock::acquire(self.store.paths())?;
        tracing::debug!(?action, "acquired repository lock");

        match action {
            Action::Start { branch } => self.start(branch),
            Action::Continue => self.resume(Resume::Continue),
            Action::Skip => self.resume(Resume::Skip),
            Action::Abort => self.abort(),
        }
    }

    fn start(&self, branch: Option<BranchName>) -> Result<RunOutcome, RbrError> {
        if let Some(existing) = self.store.load()? {
            return Err(RbrError::SessionExists {
                started: existing.created_at,
            });
        }
        self.preflight()?;

        let head = self.vcs.current_branch()?;
        let start = branch.or_else(|| head.clone()).ok_or_else(|| {
            RbrError::Config("HEAD is detached; name the branch to start from".to_string())
        })?;

        let graph = build(self.vcs, &self.trunk)?;
        let nodes = plan(&graph, &start)?;
        tracing::debug!(
            start = %start,
            plan = ?nodes.iter().map(|n| n.name.as_str()).collect::<Vec<_>>(),
            "planned"
        );

        if self.already_up_to_date(&graph, &nodes)? {
            tracing::info!("all branches already up to date");
            return Ok(RunOutcome::UpToDate);
        }

        let session = RebaseSession::new(nodes, head);
        self.store.save(&session)?;
        tracing::info!(session = %session.session_id, branches = session.plan.len(), "session started");

        self.drive(session)
    }

    /// Refuse to start on top of someone else's work in progress.
    fn preflight(&self) -> Result<(), RbrError> {
        let state = self.vcs.state();
        if state.is_in_progress() {
            return Err(RbrError::OperationInProgress(state.description().to_string()));
        }
        if !self.vcs.is_worktree_clean()? {
            return Err(RbrError::DirtyWorktree);
        }
        Ok(())
    }

    /// Whether every planned branch already contains its upstream's tip.
    fn already_up_to_date(&self, graph: &BranchGraph, nodes: &[BranchNode]) -> Result<bool, RbrError> {
        for node in nodes {
            let tip = graph.tip(&node.name)?;
            if !self.vcs.is_ancestor(&node.upstream_base, tip)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Run steps from the cursor until the plan is exhausted or a step
    /// conflicts.
    fn drive(&self, mut session: RebaseSession) -> Result<RunOutcome, RbrError> {
        while let Some(node) = session.current() {
            if node.status == NodeStatus::Done {
                session.advance();
                continue;
            }

            step::begin(&mut session);
            self.checkpoint(&mut session)?;

            match step::execute(self.vcs, &mut session)? {
                StepResult::Success(tip) => {
                    if let Some(node) = session.current() {
                        tracing::info!(branch = %node.name, tip = %tip.short(12), "rebased");
                    }
                    session.advance();
                    self.checkpoint(&mut session)?;
                }
                StepResult::Conflict { at } => return self.suspend(session, at),
            }
        }

        self.finish(session)
    }

    fn resume(&self, mode: Resume) -> Result<RunOutcome, RbrError> {
        let mut session = self.store.load()?.ok_or(RbrError::NoActiveSession)?;
        let state = self.vcs.state();

        if state.is_rebase() {
            if session.is_complete() {
                return Err(RbrError::OperationInProgress(state.to_string()));
            }
            match step::conclude(self.vcs, &mut session, mode)? {
                StepResult::Success(_) => {
                    session.advance();
                    self.checkpoint(&mut session)?;
                    self.drive(session)
                }
                StepResult::Conflict { at } => self.suspend(session, at),
            }
        } else if state.is_in_progress() {
            Err(RbrError::OperationInProgress(state.description().to_string()))
        } else {
            match mode {
                Resume::Skip => Err(RbrError::NothingToSkip),
                Resume::Continue => {
                    tracing::debug!("primitive idle; re-executing current step");
                    self.drive(session)
                }
            }
        }
    }

    fn abort(&self) -> Result<RunOutcome, RbrError> {
        let session = self.store.load()?.ok_or(RbrError::NoActiveSession)?;

        if self.vcs.state().is_rebase() {
            self.vcs
                .abort_rebase_in_progress()
                .map_err(RbrError::Primitive)?;
        }

        // A checked-out branch cannot be moved under the worktree.
        let head = self.vcs.current_branch()?;
        let detached = match &head {
            Some(branch) if session.original_tips.contains_key(branch) => {
                self.vcs.detach_head().map_err(RbrError::Primitive)?;
                true
            }
            _ => false,
        };

        for (branch, oid) in &session.original_tips {
            self.vcs
                .force_set_branch_ref(branch, oid)
                .map_err(RbrError::Primitive)?;
            tracing::debug!(%branch, tip = %oid.short(12), "restored");
        }

        self.store.clear()?;

        let target = if self.restore_head {
            session.original_head.clone().or(head.filter(|_| detached))
        } else {
            head.filter(|_| detached)
        };
        if let Some(branch) = target {
            self.checkout_quietly(&branch);
        }

        Ok(RunOutcome::Aborted {
            restored: session.original_tips.len(),
        })
    }

    fn suspend(&self, mut session: RebaseSession, at: Option<Oid>) -> Result<RunOutcome, RbrError> {
        self.checkpoint(&mut session)?;
        let (position, total) = session.progress();
        let branch = session
            .current()
            .map(|node| node.name.clone())
            .ok_or(RbrError::NoActiveSession)?;
        tracing::info!(%branch, "suspended on conflict");
        Ok(RunOutcome::Conflicted {
            branch,
            at,
            position,
            total,
        })
    }

    fn finish(&self, session: RebaseSession) -> Result<RunOutcome, RbrError> {
        self.store.clear()?;

        if self.restore_head {
            if let Some(branch) = &session.original_head {
                if self.vcs.current_branch()?.as_ref() != Some(branch) {
                    self.checkout_quietly(branch);
                }
            }
        }

        let rebased = session
            .plan
            .iter()
            .filter(|node| node.new_tip.as_ref() != Some(&node.original_tip))
            .map(|node| node.name.clone())
            .collect();
        tracing::info!(session = %session.session_id, "session complete");
        Ok(RunOutcome::Completed { rebased })
    }

    fn checkpoint(&self, session: &mut RebaseSession) -> Result<(), RbrError> {
        session.touch();
        self.store.save(session)?;
        Ok(())
    }

    /// The session is already settled; failing to switch back is not worth
    /// failing the invocation over.
    fn checkout_quietly(&self, branch: &BranchName) {
        if let Err(e) = self.vcs.checkout(branch) {
            tracing::warn!(%branch, "could not check out original branch: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::paths::RbrPaths;
    use crate::git::mock::MockOperation;
    use crate::git::{GitState, MockVcs};
    use tempfile::TempDir;

    fn b(s: &str) -> BranchName {
        BranchName::new(s).unwrap()
    }

    fn store(temp: &TempDir) -> SessionStore {
        SessionStore::new(RbrPaths::new(
            temp.path().to_path_buf(),
            temp.path().to_path_buf(),
        ))
    }

    fn start() -> Action {
        Action::Start { branch: None }
    }

    /// master <- a <- b <- c; master, a and b advanced; a checked out.
    fn linear() -> MockVcs {
        let vcs = MockVcs::new();
        vcs.commit("master", "master");
        vcs.create_branch("a", "master");
        vcs.commit("a", "a");
        vcs.create_branch("b", "a");
        vcs.commit("b", "b");
        vcs.create_branch("c", "b");
        vcs.commit("c", "c");
        vcs.commit("master", "master2");
        vcs.commit("a", "a2");
        vcs.commit("b", "b2");
        vcs.switch_to("a");
        vcs
    }

    /// master <- a <- b <- ab <- c; "ab" conflicts when replayed.
    fn conflicted() -> MockVcs {
        let vcs = MockVcs::new();
        vcs.commit("master", "master");
        vcs.create_branch("a", "master");
        vcs.commit("a", "a");
        vcs.create_branch("b", "a");
        vcs.commit("b", "b");
        vcs.create_branch("ab", "b");
        vcs.commit("ab", "ab");
        vcs.create_branch("c", "ab");
        vcs.commit("c", "c");
        vcs.commit("master", "master2");
        vcs.commit("a", "aa");
        vcs.conflict_on("ab");
        vcs.switch_to("a");
        vcs
    }

    fn all_atop(vcs: &MockVcs, pairs: &[(&str, &str)]) -> bool {
        pairs.iter().all(|(up, br)| vcs.is_atop(up, br))
    }

    mod fresh_run {
        use super::*;

        #[test]
        fn linear_chain_completes() {
            let temp = TempDir::new().unwrap();
            let vcs = linear();
            let orch = Orchestrator::new(&vcs, store(&temp));

            let outcome = orch.run(start()).unwrap();

            assert_eq!(
                outcome,
                RunOutcome::Completed {
                    rebased: vec![b("a"), b("b"), b("c")]
                }
            );
            assert_eq!(
                vcs.subjects("c"),
                vec!["master", "master2", "a", "a2", "b", "b2", "c"]
            );
            assert!(all_atop(&vcs, &[("master", "a"), ("a", "b"), ("b", "c")]));
            assert!(!store(&temp).exists());
            assert_eq!(vcs.head_branch(), Some(b("a")));
        }

        #[test]
        fn fork_propagates_to_both_children() {
            let temp = TempDir::new().unwrap();
            let vcs = MockVcs::new();
            vcs.commit("master", "master");
            vcs.create_branch("a", "master");
            vcs.commit("a", "a");
            vcs.create_branch("b", "a");
            vcs.commit("b", "b");
            vcs.create_branch("c", "a");
            vcs.commit("c", "c");
            vcs.commit("master", "master2");
            vcs.commit("a", "a2");
            vcs.switch_to("a");

            Orchestrator::new(&vcs, store(&temp)).run(start()).unwrap();

            assert!(all_atop(&vcs, &[("master", "a"), ("a", "b"), ("a", "c")]));
            assert_eq!(vcs.subjects("b"), vec!["master", "master2", "a", "a2", "b"]);
            assert_eq!(vcs.subjects("c"), vec!["master", "master2", "a", "a2", "c"]);
        }

        #[test]
        fn rerun_after_completion_is_noop() {
            let temp = TempDir::new().unwrap();
            let vcs = linear();
            let orch = Orchestrator::new(&vcs, store(&temp));
            orch.run(start()).unwrap();
            vcs.clear_operations();

            assert_eq!(orch.run(start()).unwrap(), RunOutcome::UpToDate);
            assert!(vcs.operations().is_empty());
            assert!(!store(&temp).exists());
        }

        #[test]
        fn refuses_while_session_exists() {
            let temp = TempDir::new().unwrap();
            let vcs = conflicted();
            let orch = Orchestrator::new(&vcs, store(&temp));
            orch.run(start()).unwrap();

            assert!(matches!(
                orch.run(start()),
                Err(RbrError::SessionExists { .. })
            ));
        }

        #[test]
        fn dirty_worktree_rejected_before_mutation() {
            let temp = TempDir::new().unwrap();
            let vcs = linear();
            vcs.set_dirty(true);

            let result = Orchestrator::new(&vcs, store(&temp)).run(start());
            assert!(matches!(result, Err(RbrError::DirtyWorktree)));
            assert!(vcs.operations().is_empty());
            assert!(!store(&temp).exists());
        }

        #[test]
        fn foreign_operation_rejected() {
            let temp = TempDir::new().unwrap();
            let vcs = linear();
            vcs.set_foreign_state(Some(GitState::Merge));

            let result = Orchestrator::new(&vcs, store(&temp)).run(start());
            assert!(matches!(result, Err(RbrError::OperationInProgress(s)) if s == "merge"));
        }

        #[test]
        fn cycle_rejected_before_mutation() {
            let temp = TempDir::new().unwrap();
            let vcs = linear();
            vcs.set_upstream("a", crate::git::Upstream::Local(b("c")));

            let result = Orchestrator::new(&vcs, store(&temp)).run(start());
            assert!(matches!(result, Err(RbrError::Cycle(_))));
            assert!(vcs.operations().is_empty());
            assert!(!store(&temp).exists());
        }

        #[test]
        fn named_branch_limits_plan() {
            let temp = TempDir::new().unwrap();
            let vcs = linear();

            Orchestrator::new(&vcs, store(&temp))
                .run(Action::Start {
                    branch: Some(b("b")),
                })
                .unwrap();

            // b moves onto a's current tip; a itself is untouched.
            assert!(!vcs.is_atop("master", "a"));
            assert!(all_atop(&vcs, &[("a", "b"), ("b", "c")]));
        }

        #[test]
        fn trunk_start_rebases_only_descendants() {
            let temp = TempDir::new().unwrap();
            let vcs = linear();
            let before = vcs.tip_of("master");

            let outcome = Orchestrator::new(&vcs, store(&temp))
                .run(Action::Start {
                    branch: Some(b("master")),
                })
                .unwrap();

            assert!(matches!(outcome, RunOutcome::Completed { .. }));
            assert_eq!(vcs.tip_of("master"), before);
        }

        #[test]
        fn primitive_failure_preserves_session() {
            let temp = TempDir::new().unwrap();
            let vcs = linear();
            vcs.fail_next_rebase();
            let orch = Orchestrator::new(&vcs, store(&temp));

            assert!(matches!(orch.run(start()), Err(RbrError::Primitive(_))));
            let session = store(&temp).load().unwrap().unwrap();
            assert_eq!(session.current().unwrap().status, NodeStatus::InProgress);

            assert!(matches!(
                orch.run(Action::Abort).unwrap(),
                RunOutcome::Aborted { restored: 3 }
            ));
        }
    }

    mod suspend_and_resume {
        use super::*;

        #[test]
        fn conflict_suspends_with_progress() {
            let temp = TempDir::new().unwrap();
            let vcs = conflicted();

            let outcome = Orchestrator::new(&vcs, store(&temp)).run(start()).unwrap();

            match outcome {
                RunOutcome::Conflicted {
                    branch,
                    at,
                    position,
                    total,
                } => {
                    assert_eq!(branch, b("ab"));
                    assert!(at.is_some());
                    assert_eq!((position, total), (3, 4));
                }
                other => panic!("expected conflict, got {other:?}"),
            }

            let session = store(&temp).load().unwrap().unwrap();
            assert_eq!(session.cursor, 2);
            assert_eq!(session.plan[2].status, NodeStatus::Conflicted);
            assert_eq!(session.plan[0].status, NodeStatus::Done);
            assert_eq!(session.plan[3].status, NodeStatus::Pending);
        }

        #[test]
        fn continue_completes_plan() {
            let temp = TempDir::new().unwrap();
            let vcs = conflicted();
            let orch = Orchestrator::new(&vcs, store(&temp));
            orch.run(start()).unwrap();

            vcs.resolve();
            let outcome = orch.run(Action::Continue).unwrap();

            assert!(matches!(outcome, RunOutcome::Completed { .. }));
            assert_eq!(
                vcs.subjects("c"),
                vec!["master", "master2", "a", "aa", "b", "ab", "c"]
            );
            assert!(all_atop(
                &vcs,
                &[("master", "a"), ("a", "b"), ("b", "ab"), ("ab", "c")]
            ));
            assert!(!store(&temp).exists());
        }

        #[test]
        fn unresolved_continue_stays_suspended() {
            let temp = TempDir::new().unwrap();
            let vcs = conflicted();
            let orch = Orchestrator::new(&vcs, store(&temp));
            orch.run(start()).unwrap();

            let outcome = orch.run(Action::Continue).unwrap();
            assert!(matches!(outcome, RunOutcome::Conflicted { ref branch, .. } if branch == &b("ab")));
            assert!(store(&temp).exists());
        }

        #[test]
        fn skip_drops_conflicting_commit() {
            let temp = TempDir::new().unwrap();
            let vcs = conflicted();
            let orch = Orchestrator::new(&vcs, store(&temp));
            orch.run(start()).unwrap();

            let outcome = orch.run(Action::Skip).unwrap();

            assert!(matches!(outcome, RunOutcome::Completed { .. }));
            assert_eq!(
                vcs.subjects("c"),
                vec!["master", "master2", "a", "aa", "b", "c"]
            );
            assert!(all_atop(
                &vcs,
                &[("master", "a"), ("a", "b"), ("b", "ab"), ("ab", "c")]
            ));
        }

        #[test]
        fn skip_with_idle_primitive_is_refused() {
            let temp = TempDir::new().unwrap();
            let vcs = conflicted();
            let orch = Orchestrator::new(&vcs, store(&temp));
            orch.run(start()).unwrap();
            vcs.abort_rebase_in_progress().unwrap();

            assert!(matches!(orch.run(Action::Skip), Err(RbrError::NothingToSkip)));
            assert!(store(&temp).exists());
        }

        #[test]
        fn continue_after_crash_reexecutes_step() {
            let temp = TempDir::new().unwrap();
            let vcs = linear();
            vcs.fail_next_rebase();
            let orch = Orchestrator::new(&vcs, store(&temp));
            assert!(orch.run(start()).is_err());

            let outcome = orch.run(Action::Continue).unwrap();
            assert!(matches!(outcome, RunOutcome::Completed { .. }));
            assert!(all_atop(&vcs, &[("master", "a"), ("a", "b"), ("b", "c")]));
        }

        #[test]
        fn resume_without_session_is_rejected() {
            let temp = TempDir::new().unwrap();
            let vcs = linear();
            let orch = Orchestrator::new(&vcs, store(&temp));
            let before = vcs.branch_tips();

            for action in [Action::Continue, Action::Skip, Action::Abort] {
                assert!(matches!(orch.run(action), Err(RbrError::NoActiveSession)));
            }
            assert_eq!(vcs.branch_tips(), before);
            assert!(vcs.operations().is_empty());
        }
    }

    mod abort {
        use super::*;

        #[test]
        fn restores_every_planned_branch() {
            let temp = TempDir::new().unwrap();
            let vcs = conflicted();
            let before = vcs.branch_tips();
            let orch = Orchestrator::new(&vcs, store(&temp));
            orch.run(start()).unwrap();
            assert_ne!(vcs.branch_tips(), before);

            let outcome = orch.run(Action::Abort).unwrap();

            assert_eq!(outcome, RunOutcome::Aborted { restored: 4 });
            assert_eq!(vcs.branch_tips(), before);
            assert!(!vcs.rebase_in_progress());
            assert!(!store(&temp).exists());
            assert_eq!(vcs.head_branch(), Some(b("a")));
        }

        #[test]
        fn includes_branches_past_the_conflict() {
            let temp = TempDir::new().unwrap();
            let vcs = conflicted();
            let orch = Orchestrator::new(&vcs, store(&temp));
            orch.run(start()).unwrap();
            orch.run(Action::Abort).unwrap();

            let restored: Vec<BranchName> = vcs
                .operations()
                .into_iter()
                .filter_map(|op| match op {
                    MockOperation::ForceSet { branch, .. } => Some(branch),
                    _ => None,
                })
                .collect();
            assert!(restored.contains(&b("c")));
            assert_eq!(restored.len(), 4);
        }

        #[test]
        fn head_detached_before_refs_move() {
            let temp = TempDir::new().unwrap();
            let vcs = conflicted();
            let orch = Orchestrator::new(&vcs, store(&temp));
            orch.run(start()).unwrap();
            vcs.clear_operations();

            orch.run(Action::Abort).unwrap();

            let ops = vcs.operations();
            let detach = ops
                .iter()
                .position(|op| op == &MockOperation::DetachHead)
                .unwrap();
            let first_reset = ops
                .iter()
                .position(|op| matches!(op, MockOperation::ForceSet { .. }))
                .unwrap();
            assert_eq!(ops[0], MockOperation::AbortRebase);
            assert!(detach < first_reset);
        }

        #[test]
        fn without_restore_head_returns_to_current_branch() {
            let temp = TempDir::new().unwrap();
            let vcs = conflicted();
            vcs.switch_to("master");
            let orch = Orchestrator::new(&vcs, store(&temp)).with_restore_head(false);
            orch.run(Action::Start {
                branch: Some(b("a")),
            })
            .unwrap();

            orch.run(Action::Abort).unwrap();
            // The primitive left HEAD on the conflicted branch.
            assert_eq!(vcs.head_branch(), Some(b("ab")));
        }
    }

    #[test]
    fn concurrent_invocation_fails_fast() {
        let temp = TempDir::new().unwrap();
        let vcs = linear();
        let _held = RepoLock::acquire(store(&temp).paths()).unwrap();

        let result = Orchestrator::new(&vcs, store(&temp)).run(start());
        assert!(matches!(result, Err(RbrError::Lock(_))));
    }
}
