//! core::ops::session
//!
//! Durable record of an in-progress multi-branch rebase.
//!
//! # Crash Safety Contract
//!
//! A session is written to `session.json.tmp`, fsynced, then renamed over
//! `session.json`, and the containing directory is fsynced. A crash at any
//! point either leaves the previous record in place or the new one; never a
//! partial file under the real name. A stray `.tmp` file is ignored by
//! [`SessionStore::load`] and removed by [`SessionStore::clear`].
//!
//! # Invariants
//!
//! - `original_tips` is written once, when the session is created, and
//!   before any branch is rebased
//! - `plan` order and each node's identity fields never change after
//!   creation; only `status`, `planned_upstream_tip`, `new_tip` and
//!   `cursor` move
//! - `plan_digest` covers every write-once field; a record whose digest
//!   does not match is refused rather than resumed
//!
//! # Storage
//!
//! - `<common_dir>/rbr/session.json`

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::core::paths::RbrPaths;
use crate::core::types::{BranchName, Oid, UtcTimestamp};

/// Session record format version.
pub const SESSION_SCHEMA_VERSION: u32 = 1;

/// Errors from the session store.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The file exists but is not a readable session record.
    #[error("session file {path} is unreadable ({message}); inspect or remove it")]
    Corrupt { path: PathBuf, message: String },

    #[error(
        "session file {path} was written by schema v{found}, this binary uses v{expected}"
    )]
    SchemaMismatch {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("session file {path} failed its integrity check; inspect or remove it")]
    DigestMismatch { path: PathBuf },
}

/// Identifier of one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a planned branch is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    /// The primitive was (or is about to be) invoked for this branch.
    InProgress,
    /// The primitive stopped on a conflict; waiting for the user.
    Conflicted,
    Done,
}

/// One branch scheduled for rebase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchNode {
    pub name: BranchName,
    /// The branch this one is rebased onto. Roots are never planned, so
    /// every planned node has one.
    pub upstream: BranchName,
    /// Tip before the session began.
    pub original_tip: Oid,
    /// The upstream's tip before the session began. Commits reachable from
    /// it are not replayed.
    pub upstream_base: Oid,
    /// The upstream tip this branch is (being) rebased onto. Set when the
    /// step starts.
    #[serde(default)]
    pub planned_upstream_tip: Option<Oid>,
    /// Tip after the step completed.
    #[serde(default)]
    pub new_tip: Option<Oid>,
    pub status: NodeStatus,
}

impl BranchNode {
    pub fn new(name: BranchName, upstream: BranchName, original_tip: Oid, upstream_base: Oid) -> Self {
        Self {
            name,
            upstream,
            original_tip,
            upstream_base,
            planned_upstream_tip: None,
            new_tip: None,
            status: NodeStatus::Pending,
        }
    }

    /// The tip a downstream branch should be rebased onto.
    pub fn final_tip(&self) -> &Oid {
        match (&self.status, &self.new_tip) {
            (NodeStatus::Done, Some(tip)) => tip,
            _ => &self.original_tip,
        }
    }
}

/// An in-progress multi-branch rebase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebaseSession {
    pub schema_version: u32,
    pub session_id: SessionId,
    pub created_at: UtcTimestamp,
    pub updated_at: UtcTimestamp,
    /// Traversal order, fixed at creation.
    pub plan: Vec<BranchNode>,
    /// Index into `plan` of the node being processed; `plan.len()` once
    /// every node is done.
    pub cursor: usize,
    /// Tip of every planned branch before the session began.
    pub original_tips: BTreeMap<BranchName, Oid>,
    /// Branch checked out when the session began, if any.
    pub original_head: Option<BranchName>,
    /// `sha256:<hex>` over the write-once fields.
    pub plan_digest: String,
}

impl RebaseSession {
    /// Start a session over `plan`, capturing every node's original tip.
    pub fn new(plan: Vec<BranchNode>, original_head: Option<BranchName>) -> Self {
        let original_tips = plan
            .iter()
            .map(|node| (node.name.clone(), node.original_tip.clone()))
            .collect();
        let now = UtcTimestamp::now();
        let mut session = Self {
            schema_version: SESSION_SCHEMA_VERSION,
            session_id: SessionId::new(),
            created_at: now.clone(),
            updated_at: now,
            plan,
            cursor: 0,
            original_tips,
            original_head,
            plan_digest: String::new(),
        };
        session.plan_digest = session.compute_digest();
        session
    }

    /// Digest of the fields that must not change during the session.
    pub fn compute_digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.session_id.as_str().as_bytes());
        for node in &self.plan {
            for field in [
                node.name.as_str(),
                node.upstream.as_str(),
                node.original_tip.as_str(),
                node.upstream_base.as_str(),
            ] {
                hasher.update(field.as_bytes());
                hasher.update([0u8]);
            }
        }
        hasher.update([0xffu8]);
        for (branch, tip) in &self.original_tips {
            hasher.update(branch.as_str().as_bytes());
            hasher.update([0u8]);
            hasher.update(tip.as_str().as_bytes());
            hasher.update([0u8]);
        }
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }

    pub fn digest_matches(&self) -> bool {
        self.plan_digest == self.compute_digest()
    }

    pub fn current(&self) -> Option<&BranchNode> {
        self.plan.get(self.cursor)
    }

    pub fn current_mut(&mut self) -> Option<&mut BranchNode> {
        self.plan.get_mut(self.cursor)
    }

    pub fn node(&self, name: &BranchName) -> Option<&BranchNode> {
        self.plan.iter().find(|node| &node.name == name)
    }

    /// Move past the current node.
    pub fn advance(&mut self) {
        if self.cursor < self.plan.len() {
            self.cursor += 1;
        }
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.plan.len()
    }

    /// 1-based position of the cursor and the plan length.
    pub fn progress(&self) -> (usize, usize) {
        ((self.cursor + 1).min(self.plan.len()), self.plan.len())
    }

    pub fn touch(&mut self) {
        self.updated_at = UtcTimestamp::now();
    }
}

/// Reads and writes the session record for one repository.
#[derive(Debug, Clone)]
pub struct SessionStore {
    paths: RbrPaths,
}

impl SessionStore {
    pub fn new(paths: RbrPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &RbrPaths {
        &self.paths
    }

    pub fn exists(&self) -> bool {
        self.paths.session_path().exists()
    }

    /// Atomically replace the session record.
    pub fn save(&self, session: &RebaseSession) -> Result<(), SessionError> {
        let dir = self.paths.state_dir();
        fs::create_dir_all(&dir)?;

        let tmp = self.paths.session_tmp_path();
        let content = serde_json::to_string_pretty(session)?;
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&tmp, self.paths.session_path())?;

        #[cfg(unix)]
        fs::File::open(&dir)?.sync_all()?;

        Ok(())
    }

    /// Load the session, or `None` when no session is active.
    ///
    /// # Errors
    ///
    /// A present but unusable record is an error, never `None`: the user
    /// must decide what to do with it.
    pub fn load(&self) -> Result<Option<RebaseSession>, SessionError> {
        let path = self.paths.session_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let session: RebaseSession =
            serde_json::from_str(&content).map_err(|e| SessionError::Corrupt {
                path: path.clone(),
                message: e.to_string(),
            })?;

        if session.schema_version != SESSION_SCHEMA_VERSION {
            return Err(SessionError::SchemaMismatch {
                path,
                found: session.schema_version,
                expected: SESSION_SCHEMA_VERSION,
            });
        }
        if !session.digest_matches() || session.cursor > session.plan.len() {
            return Err(SessionError::DigestMismatch { path });
        }

        Ok(Some(session))
    }

    /// Remove the session record (and any staging file).
    pub fn clear(&self) -> Result<(), SessionError> {
        for path in [self.paths.session_path(), self.paths.session_tmp_path()] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
