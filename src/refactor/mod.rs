//! Refactoring engine
//!
//! A [`MigrationSpec`] is expanded into intents, the intents are planned
//! against the index into file operations, and the operations are committed
//! through a [`TransactionManager`] together with the rewritten locks.

pub mod intent;
pub mod migration;
pub mod planner;
pub mod sidecar;

pub use intent::{intents_for, Intent};
pub use migration::{MigrationSpec, Operation};
pub use planner::Planner;

use crate::error::Result;
use crate::lock::LockManager;
use crate::transaction::{FileOp, TransactionManager};
use crate::workspace::Workspace;
use std::collections::BTreeMap;

/// The outcome of planning a migration
#[derive(Debug, Clone, Default)]
pub struct RefactorPlan {
    /// Source, sidecar and scaffold operations, locks excluded
    pub ops: Vec<FileOp>,
    /// Every FQN rename applied, aliases included
    pub renames: BTreeMap<String, String>,
    /// Rename sources missing from the index
    pub not_found: Vec<String>,
}

impl RefactorPlan {
    /// Stage the plan and the pending lock changes into one transaction
    pub fn transaction(&self, workspace: &Workspace, locks: &LockManager) -> Result<TransactionManager> {
        let mut tx = TransactionManager::new(workspace.root(), workspace.stitcher_dir());
        tx.extend(self.ops.iter().cloned());
        locks.stage_into(workspace, &mut tx)?;
        Ok(tx)
    }
}
