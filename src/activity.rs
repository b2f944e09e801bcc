//! Append-only audit log, decoupled from the document store.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

/// Closed set of auditable actions. Several variants have no caller in the
/// core flows (member churn, ownership transfer, attachments); they are part
/// of the model and stay reserved for the operations that emit them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    CreatedTask,
    UpdatedTask,
    CreatedSubtask,
    UpdatedSubtask,
    CompletedTask,
    CreatedProject,
    UpdatedProject,
    CompletedProject,
    CreatedWorkspace,
    UpdatedWorkspace,
    AddedComment,
    AddedMember,
    RemovedMember,
    JoinedWorkspace,
    TransferredWorkspaceOwnership,
    AddedAttachment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum ResourceType {
    Task,
    Project,
    Workspace,
    Comment,
    User,
}

#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: ActionType,
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Audit sink shared across request handlers. Appends never fail the
/// operation that triggered them.
#[derive(Clone, Default)]
pub struct ActivityRecorder {
    log: Arc<Mutex<Vec<Activity>>>,
}

impl ActivityRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Best effort: a failure to append is logged and swallowed so the
    /// business mutation it describes still succeeds.
    pub fn record(
        &self,
        user_id: Uuid,
        action: ActionType,
        resource_type: ResourceType,
        resource_id: Uuid,
        details: Option<Value>,
    ) {
        let entry = Activity {
            id: Uuid::new_v4(),
            user_id,
            action,
            resource_type,
            resource_id,
            details,
            created_at: OffsetDateTime::now_utc(),
        };
        match self.log.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(err) => warn!(
                action = ?entry.action,
                resource = %entry.resource_id,
                error = %err,
                "dropping activity entry"
            ),
        }
    }

    /// Entries for one resource in insertion order.
    pub fn for_resource(&self, resource_id: Uuid) -> Vec<Activity> {
        match self.log.lock() {
            Ok(entries) => entries
                .iter()
                .filter(|entry| entry.resource_id == resource_id)
                .cloned()
                .collect(),
            Err(err) => {
                warn!(resource = %resource_id, error = %err, "activity log unreadable");
                Vec::new()
            }
        }
    }
}
