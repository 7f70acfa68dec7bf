//! git::mock
//!
//! In-memory [`Vcs`] for deterministic engine tests.
//!
//! # Design
//!
//! Commits form a single-parent graph keyed by generated ids. The rebase
//! primitive replays commits one at a time onto the target, creating fresh
//! commits with the same subject, and stops whenever it reaches a commit
//! whose subject was registered with [`MockVcs::conflict_on`]. Like real
//! git, the branch ref only moves once the whole replay finishes.
//!
//! A stopped replay waits for [`MockVcs::resolve`] (the equivalent of
//! staging a resolution) before `continue_rebase` can get past it.
//!
//! # Example
//!
//! ```
//! use git_rbr::core::types::BranchName;
//! use git_rbr::git::{MockVcs, Vcs, RebaseOutcome};
//!
//! let vcs = MockVcs::new();
//! vcs.commit("main", "init");
//! vcs.create_branch("topic", "main");
//! vcs.commit("topic", "work");
//! let base = vcs.tip_of("main");
//! vcs.commit("main", "more");
//!
//! let topic = BranchName::new("topic").unwrap();
//! let onto = vcs.tip_of("main");
//! let outcome = vcs.rebase(&topic, &onto, &base).unwrap();
//!
//! assert!(matches!(outcome, RebaseOutcome::Success(_)));
//! assert_eq!(vcs.subjects("topic"), vec!["init", "more", "work"]);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use crate::core::types::{BranchName, Oid};

use super::traits::{RebaseOutcome, Upstream, Vcs};
use super::{GitError, GitState};

/// Mock repository for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockVcs {
    inner: Arc<Mutex<MockVcsInner>>,
}

#[derive(Debug, Clone)]
struct MockCommit {
    parent: Option<Oid>,
    subject: String,
}

#[derive(Debug, Clone)]
enum MockHead {
    Unborn,
    Branch(BranchName),
    Detached(Oid),
}

/// A single-branch replay that has not finished.
#[derive(Debug)]
struct MockRebase {
    branch: BranchName,
    current: Oid,
    remaining: VecDeque<Oid>,
    stopped: Option<Oid>,
}

#[derive(Debug)]
struct MockVcsInner {
    next_id: u64,
    commits: HashMap<Oid, MockCommit>,
    /// Branch tips in creation order.
    branches: Vec<(BranchName, Oid)>,
    upstreams: HashMap<BranchName, Upstream>,
    tracking_errors: HashMap<BranchName, String>,
    conflicts: HashSet<String>,
    rebase: Option<MockRebase>,
    head: MockHead,
    resolved: bool,
    dirty: bool,
    foreign_state: Option<GitState>,
    fail_next_rebase: bool,
    operations: Vec<MockOperation>,
}

impl Default for MockVcsInner {
    fn default() -> Self {
        Self {
            next_id: 1,
            commits: HashMap::new(),
            branches: Vec::new(),
            upstreams: HashMap::new(),
            tracking_errors: HashMap::new(),
            conflicts: HashSet::new(),
            rebase: None,
            head: MockHead::Unborn,
            resolved: false,
            dirty: false,
            foreign_state: None,
            fail_next_rebase: false,
            operations: Vec::new(),
        }
    }
}

/// Recorded mutating operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    Rebase {
        branch: BranchName,
        onto: Oid,
        base: Oid,
    },
    Continue,
    Skip,
    AbortRebase,
    ForceSet {
        branch: BranchName,
        oid: Oid,
    },
    Checkout {
        branch: BranchName,
    },
    DetachHead,
}

fn name(branch: &str) -> BranchName {
    BranchName::new(branch).expect("test branch name is valid")
}

fn command_failed(args: &str, message: &str) -> GitError {
    GitError::CommandFailed {
        args: args.to_string(),
        message: message.to_string(),
    }
}

impl MockVcsInner {
    fn new_commit(&mut self, parent: Option<Oid>, subject: &str) -> Oid {
        let oid = Oid::new(format!("{:040x}", self.next_id)).expect("generated oid is valid hex");
        self.next_id += 1;
        self.commits.insert(
            oid.clone(),
            MockCommit {
                parent,
                subject: subject.to_string(),
            },
        );
        oid
    }

    fn tip(&self, branch: &BranchName) -> Option<Oid> {
        self.branches
            .iter()
            .find(|(b, _)| b == branch)
            .map(|(_, oid)| oid.clone())
    }

    fn set_tip(&mut self, branch: &BranchName, oid: Oid) {
        match self.branches.iter_mut().find(|(b, _)| b == branch) {
            Some(entry) => entry.1 = oid,
            None => self.branches.push((branch.clone(), oid)),
        }
    }

    /// `oid` and every ancestor, newest first.
    fn history(&self, oid: &Oid) -> Vec<Oid> {
        let mut out = Vec::new();
        let mut cursor = Some(oid.clone());
        while let Some(current) = cursor {
            cursor = self.commits.get(&current).and_then(|c| c.parent.clone());
            out.push(current);
        }
        out
    }

    fn unique(&self, tip: &Oid, base: &Oid) -> Vec<Oid> {
        let excluded: HashSet<Oid> = self.history(base).into_iter().collect();
        let mut unique: Vec<Oid> = self
            .history(tip)
            .into_iter()
            .filter(|oid| !excluded.contains(oid))
            .collect();
        unique.reverse();
        unique
    }

    /// Replay remaining commits until done or stopped.
    fn replay(&mut self) -> Result<RebaseOutcome, GitError> {
        loop {
            let Some(rebase) = self.rebase.as_mut() else {
                return Err(command_failed("rebase", "no rebase in progress"));
            };
            let Some(next) = rebase.remaining.pop_front() else {
                break;
            };
            let subject = self
                .commits
                .get(&next)
                .map(|c| c.subject.clone())
                .unwrap_or_default();

            if self.conflicts.contains(&subject) {
                if let Some(rebase) = self.rebase.as_mut() {
                    rebase.stopped = Some(next.clone());
                }
                return Ok(RebaseOutcome::Conflict { at: Some(next) });
            }

            let parent = self.rebase.as_ref().map(|r| r.current.clone());
            let new = self.new_commit(parent, &subject);
            if let Some(rebase) = self.rebase.as_mut() {
                rebase.current = new;
            }
        }

        let Some(done) = self.rebase.take() else {
            return Err(command_failed("rebase", "no rebase in progress"));
        };
        self.set_tip(&done.branch, done.current.clone());
        self.head = MockHead::Branch(done.branch);
        Ok(RebaseOutcome::Success(done.current))
    }

    fn head_oid(&self) -> Option<Oid> {
        match &self.head {
            MockHead::Unborn => None,
            MockHead::Branch(b) => self.tip(b),
            MockHead::Detached(oid) => Some(oid.clone()),
        }
    }
}

impl MockVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a commit on top of `branch`, creating the branch (with a root
    /// commit) if it does not exist yet.
    pub fn commit(&self, branch: &str, subject: &str) -> Oid {
        let mut inner = self.inner.lock().unwrap();
        let branch = name(branch);
        let parent = inner.tip(&branch);
        let oid = inner.new_commit(parent, subject);
        inner.set_tip(&branch, oid.clone());
        if matches!(inner.head, MockHead::Unborn) {
            inner.head = MockHead::Branch(branch);
        }
        oid
    }

    /// Create `branch` at the tip of `from`, tracking it (`git branch -t`).
    pub fn create_branch(&self, branch: &str, from: &str) {
        let mut inner = self.inner.lock().unwrap();
        let from = name(from);
        let tip = inner.tip(&from).expect("source branch exists");
        let branch = name(branch);
        inner.set_tip(&branch, tip);
        inner.upstreams.insert(branch, Upstream::Local(from));
    }

    pub fn set_upstream(&self, branch: &str, upstream: Upstream) {
        let mut inner = self.inner.lock().unwrap();
        inner.upstreams.insert(name(branch), upstream);
    }

    /// Make `tracking_upstream(branch)` report inconsistent configuration.
    pub fn break_tracking(&self, branch: &str, message: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .tracking_errors
            .insert(name(branch), message.to_string());
    }

    /// Replaying any commit with this subject stops with a conflict.
    pub fn conflict_on(&self, subject: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.conflicts.insert(subject.to_string());
    }

    /// Stage a resolution for the stopped replay step.
    pub fn resolve(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.resolved = true;
    }

    /// The next `rebase` call fails without leaving a rebase in progress.
    pub fn fail_next_rebase(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_next_rebase = true;
    }

    pub fn set_dirty(&self, dirty: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.dirty = dirty;
    }

    /// Pretend a non-rebase operation (merge, cherry-pick, ...) is underway.
    pub fn set_foreign_state(&self, state: Option<GitState>) {
        let mut inner = self.inner.lock().unwrap();
        inner.foreign_state = state;
    }

    /// Check out `branch` without recording an operation.
    pub fn switch_to(&self, branch: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.head = MockHead::Branch(name(branch));
    }

    pub fn tip_of(&self, branch: &str) -> Oid {
        let inner = self.inner.lock().unwrap();
        inner.tip(&name(branch)).expect("branch exists")
    }

    /// Subjects from the root commit to the tip of `branch`.
    pub fn subjects(&self, branch: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let tip = inner.tip(&name(branch)).expect("branch exists");
        inner
            .history(&tip)
            .iter()
            .rev()
            .filter_map(|oid| inner.commits.get(oid).map(|c| c.subject.clone()))
            .collect()
    }

    /// Whether `branch` contains every commit of `upstream`.
    pub fn is_atop(&self, upstream: &str, branch: &str) -> bool {
        let inner = self.inner.lock().unwrap();
        let upstream = inner.tip(&name(upstream)).expect("upstream exists");
        let tip = inner.tip(&name(branch)).expect("branch exists");
        inner.history(&tip).contains(&upstream)
    }

    pub fn branch_tips(&self) -> Vec<(BranchName, Oid)> {
        let inner = self.inner.lock().unwrap();
        inner.branches.clone()
    }

    pub fn head_branch(&self) -> Option<BranchName> {
        let inner = self.inner.lock().unwrap();
        match &inner.head {
            MockHead::Branch(b) => Some(b.clone()),
            _ => None,
        }
    }

    pub fn rebase_in_progress(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.rebase.is_some()
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        let inner = self.inner.lock().unwrap();
        inner.operations.clone()
    }

    pub fn clear_operations(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.clear();
    }

    /// Number of `rebase` invocations recorded.
    pub fn rebase_count(&self) -> usize {
        self.operations()
            .iter()
            .filter(|op| matches!(op, MockOperation::Rebase { .. }))
            .count()
    }
}

impl Vcs for MockVcs {
    fn list_branches(&self) -> Result<Vec<BranchName>, GitError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.branches.iter().map(|(b, _)| b.clone()).collect())
    }

    fn tracking_upstream(&self, branch: &BranchName) -> Result<Upstream, GitError> {
        let inner = self.inner.lock().unwrap();
        if let Some(message) = inner.tracking_errors.get(branch) {
            return Err(GitError::TrackingConfig {
                branch: branch.to_string(),
                message: message.clone(),
            });
        }
        let upstream = inner.upstreams.get(branch).cloned().unwrap_or(Upstream::None);
        if let Upstream::Local(parent) = &upstream {
            if inner.tip(parent).is_none() {
                return Err(GitError::TrackingConfig {
                    branch: branch.to_string(),
                    message: format!("upstream branch '{parent}' does not exist"),
                });
            }
        }
        Ok(upstream)
    }

    fn tip(&self, branch: &BranchName) -> Result<Oid, GitError> {
        let inner = self.inner.lock().unwrap();
        inner.tip(branch).ok_or_else(|| GitError::RefNotFound {
            refname: branch.refname(),
        })
    }

    fn unique_commits(&self, branch: &BranchName, base: &Oid) -> Result<Vec<Oid>, GitError> {
        let inner = self.inner.lock().unwrap();
        let tip = inner.tip(branch).ok_or_else(|| GitError::RefNotFound {
            refname: branch.refname(),
        })?;
        Ok(inner.unique(&tip, base))
    }

    fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.history(descendant).contains(ancestor))
    }

    fn rebase(
        &self,
        branch: &BranchName,
        onto: &Oid,
        base: &Oid,
    ) -> Result<RebaseOutcome, GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::Rebase {
            branch: branch.clone(),
            onto: onto.clone(),
            base: base.clone(),
        });

        if inner.fail_next_rebase {
            inner.fail_next_rebase = false;
            return Err(command_failed("rebase", "simulated failure"));
        }
        if inner.rebase.is_some() {
            return Err(command_failed("rebase", "a rebase is already in progress"));
        }

        let tip = inner.tip(branch).ok_or_else(|| GitError::RefNotFound {
            refname: branch.refname(),
        })?;
        let remaining = inner.unique(&tip, base).into();
        inner.head = MockHead::Branch(branch.clone());
        inner.rebase = Some(MockRebase {
            branch: branch.clone(),
            current: onto.clone(),
            remaining,
            stopped: None,
        });
        inner.replay()
    }

    fn continue_rebase(&self) -> Result<RebaseOutcome, GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::Continue);

        let (stopped, current) = match inner.rebase.as_ref() {
            Some(rebase) => (rebase.stopped.clone(), rebase.current.clone()),
            None => return Err(command_failed("rebase --continue", "no rebase in progress")),
        };

        if let Some(stopped) = stopped {
            if !inner.resolved {
                return Ok(RebaseOutcome::Conflict { at: Some(stopped) });
            }
            inner.resolved = false;
            let subject = inner
                .commits
                .get(&stopped)
                .map(|c| c.subject.clone())
                .unwrap_or_default();
            let new = inner.new_commit(Some(current), &subject);
            if let Some(rebase) = inner.rebase.as_mut() {
                rebase.current = new;
                rebase.stopped = None;
            }
        }
        inner.replay()
    }

    fn skip_current_step(&self) -> Result<RebaseOutcome, GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::Skip);

        match inner.rebase.as_mut() {
            Some(rebase) => rebase.stopped = None,
            None => return Err(command_failed("rebase --skip", "no rebase in progress")),
        }
        inner.resolved = false;
        inner.replay()
    }

    fn abort_rebase_in_progress(&self) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::AbortRebase);

        let rebase = inner
            .rebase
            .take()
            .ok_or_else(|| command_failed("rebase --abort", "no rebase in progress"))?;
        inner.head = MockHead::Branch(rebase.branch);
        inner.resolved = false;
        Ok(())
    }

    fn force_set_branch_ref(&self, branch: &BranchName, oid: &Oid) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::ForceSet {
            branch: branch.clone(),
            oid: oid.clone(),
        });
        inner.set_tip(branch, oid.clone());
        Ok(())
    }

    fn state(&self) -> GitState {
        let inner = self.inner.lock().unwrap();
        if inner.rebase.is_some() {
            return GitState::Rebase {
                current: None,
                total: None,
            };
        }
        inner.foreign_state.clone().unwrap_or(GitState::Clean)
    }

    fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        Ok(self.head_branch())
    }

    fn is_worktree_clean(&self) -> Result<bool, GitError> {
        let inner = self.inner.lock().unwrap();
        Ok(!inner.dirty)
    }

    fn checkout(&self, branch: &BranchName) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::Checkout {
            branch: branch.clone(),
        });
        if inner.rebase.is_some() {
            return Err(command_failed("checkout", "a rebase is in progress"));
        }
        if inner.tip(branch).is_none() {
            return Err(GitError::RefNotFound {
                refname: branch.refname(),
            });
        }
        inner.head = MockHead::Branch(branch.clone());
        Ok(())
    }

    fn detach_head(&self) -> Result<(), GitError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::DetachHead);
        let oid = inner
            .head_oid()
            .ok_or_else(|| command_failed("checkout --detach", "HEAD is unborn"))?;
        inner.head = MockHead::Detached(oid);
        Ok(())
    }
}
