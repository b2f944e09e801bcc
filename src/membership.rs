//! Presence checks gating every workspace and project mutation.
//!
//! Role tags are carried on the member records but deliberately not
//! consulted here; membership alone grants access.

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Project, Workspace};

pub fn is_workspace_member(workspace: &Workspace, user_id: Uuid) -> bool {
    workspace.members.iter().any(|m| m.user_id == user_id)
}

/// Project access: listed member, or the user who created the project.
/// The creator keeps access even if a later member-list rewrite drops them.
pub fn is_project_member(project: &Project, user_id: Uuid) -> bool {
    project.created_by == user_id || project.members.iter().any(|m| m.user_id == user_id)
}

pub fn ensure_workspace_member(workspace: &Workspace, user_id: Uuid) -> Result<()> {
    if is_workspace_member(workspace, user_id) {
        Ok(())
    } else {
        Err(Error::Forbidden("user is not a member of the workspace"))
    }
}

pub fn ensure_project_member(project: &Project, user_id: Uuid) -> Result<()> {
    if is_project_member(project, user_id) {
        Ok(())
    } else {
        Err(Error::Forbidden("user is not a member of the project"))
    }
}
