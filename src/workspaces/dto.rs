use serde::{Deserialize, Serialize};

use crate::models::{Project, Workspace, WorkspaceRole};

#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
    pub description: Option<String>,
    /// Falls back to the default accent color when omitted.
    pub color: Option<String>,
}

/// Roles an invite may grant. `owner` is deliberately absent; ownership is
/// only ever assigned at workspace creation.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteRole {
    Admin,
    #[default]
    Member,
    Viewer,
}

impl InviteRole {
    pub fn as_workspace_role(self) -> WorkspaceRole {
        match self {
            InviteRole::Admin => WorkspaceRole::Admin,
            InviteRole::Member => WorkspaceRole::Member,
            InviteRole::Viewer => WorkspaceRole::Viewer,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InviteMemberRequest {
    pub email: String,
    #[serde(default)]
    pub role: InviteRole,
}

#[derive(Debug, Deserialize)]
pub struct AcceptInviteRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceResponse {
    pub workspace: Workspace,
}

#[derive(Debug, Serialize)]
pub struct WorkspacesResponse {
    pub workspaces: Vec<Workspace>,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceProjectsResponse {
    pub workspace: Workspace,
    pub projects: Vec<Project>,
}
