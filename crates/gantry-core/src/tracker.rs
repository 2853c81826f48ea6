use serde::{Deserialize, Serialize};
use tracing::debug;

/// Remembers whether the remote side knows about the project and whether
/// it holds the current employee and task lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTracker {
    project_exists: bool,
    entities_synced: bool,
}

impl SyncTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project_exists(&self) -> bool {
        self.project_exists
    }

    pub fn needs_sync(&self) -> bool {
        !self.entities_synced
    }

    pub fn mark_entity_mutated(&mut self) {
        if self.entities_synced {
            debug!("entity lists changed; resubmission required");
        }
        self.entities_synced = false;
    }

    /// `has_entities` is true when either the employee or the task list is
    /// non-empty. Re-creating a project invalidates lists sent for the old one.
    pub fn mark_project_created(&mut self, was_update: bool, has_entities: bool) {
        self.project_exists = true;
        if was_update && has_entities {
            debug!("project recreated with entities present; resubmission required");
            self.entities_synced = false;
        }
    }

    pub fn mark_synced(&mut self) {
        self.entities_synced = true;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
