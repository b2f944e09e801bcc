use rand::{distributions::Alphanumeric, Rng};
use serde_json::json;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::activity::{ActionType, ResourceType};
use crate::error::{Error, Result};
use crate::mailer;
use crate::membership::{ensure_workspace_member, is_workspace_member};
use crate::models::{Project, Workspace, WorkspaceInvite, WorkspaceMember, WorkspaceRole};
use crate::state::AppState;
use crate::workspaces::dto::{CreateWorkspaceRequest, InviteRole};
use crate::workspaces::stats::{self, WorkspaceStats};

const DEFAULT_COLOR: &str = "#FF5733";
const INVITE_TOKEN_LEN: usize = 32;

pub async fn create_workspace(
    state: &AppState,
    payload: CreateWorkspaceRequest,
    user_id: Uuid,
) -> Result<Workspace> {
    let mut tx = state.store.begin().await;
    let now = OffsetDateTime::now_utc();
    let workspace = Workspace {
        id: Uuid::new_v4(),
        name: payload.name,
        description: payload.description,
        color: payload.color.unwrap_or_else(|| DEFAULT_COLOR.into()),
        owner: user_id,
        members: vec![WorkspaceMember {
            user_id,
            role: WorkspaceRole::Owner,
            joined_at: now,
        }],
        projects: Vec::new(),
        created_at: now,
    };
    tx.workspaces().put(workspace.id, workspace.clone());

    state.activity.record(
        user_id,
        ActionType::CreatedWorkspace,
        ResourceType::Workspace,
        workspace.id,
        Some(json!({ "description": format!("created workspace \"{}\"", workspace.name) })),
    );

    tx.commit();
    info!(workspace_id = %workspace.id, "workspace created");
    Ok(workspace)
}

/// Workspaces the user belongs to, newest first.
pub async fn list_workspaces(state: &AppState, user_id: Uuid) -> Result<Vec<Workspace>> {
    let snapshot = state.store.read().await;
    let mut workspaces = snapshot
        .workspaces()
        .filter(|w| is_workspace_member(w, user_id));
    workspaces.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(workspaces)
}

pub async fn get_workspace(state: &AppState, workspace_id: Uuid) -> Result<Workspace> {
    let snapshot = state.store.read().await;
    snapshot
        .workspaces()
        .get(workspace_id)
        .ok_or(Error::NotFound("workspace"))
}

/// Workspace plus its non-archived projects, oldest project first.
pub async fn get_workspace_projects(
    state: &AppState,
    workspace_id: Uuid,
) -> Result<(Workspace, Vec<Project>)> {
    let snapshot = state.store.read().await;
    let workspace = snapshot
        .workspaces()
        .get(workspace_id)
        .ok_or(Error::NotFound("workspace"))?;
    let mut projects = snapshot
        .projects()
        .filter(|p| p.workspace_id == workspace_id && !p.is_archived);
    projects.sort_by_key(|p| p.created_at);
    Ok((workspace, projects))
}

/// Recomputed in full on every call; membership is required even though the
/// result is read-only.
pub async fn get_workspace_stats(
    state: &AppState,
    workspace_id: Uuid,
    user_id: Uuid,
) -> Result<WorkspaceStats> {
    let snapshot = state.store.read().await;
    let workspace = snapshot
        .workspaces()
        .get(workspace_id)
        .ok_or(Error::NotFound("workspace"))?;
    ensure_workspace_member(&workspace, user_id)?;

    let mut projects = snapshot.projects().filter(|p| p.workspace_id == workspace_id);
    projects.sort_by_key(|p| p.created_at);
    let tasks = snapshot
        .tasks()
        .filter(|t| projects.iter().any(|p| p.id == t.project_id));

    Ok(stats::compute(&projects, &tasks, OffsetDateTime::now_utc()))
}

/// Invites an existing account into the workspace. The token is an opaque
/// random string delivered only by email; a failed dispatch aborts the
/// whole invite.
pub async fn invite_member(
    state: &AppState,
    workspace_id: Uuid,
    email: &str,
    role: InviteRole,
    user_id: Uuid,
) -> Result<WorkspaceInvite> {
    let mut tx = state.store.begin().await;
    let workspace = tx
        .workspaces()
        .get(workspace_id)
        .ok_or(Error::NotFound("workspace"))?;
    ensure_workspace_member(&workspace, user_id)?;
    let inviter = tx.users().get(user_id).ok_or(Error::NotFound("user"))?;

    let invitee = tx
        .users()
        .find(|u| u.email == email)
        .ok_or(Error::NotFound("user"))?;
    if is_workspace_member(&workspace, invitee.id) {
        return Err(Error::Conflict(
            "user is already a member of this workspace".into(),
        ));
    }

    let now = OffsetDateTime::now_utc();
    let pending = tx.invites().find(|i| {
        i.workspace_id == workspace_id && i.user_id == invitee.id && !i.is_expired(now)
    });
    if pending.is_some() {
        return Err(Error::Conflict(
            "an invite is already pending for this user".into(),
        ));
    }

    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_TOKEN_LEN)
        .map(char::from)
        .collect();
    let invite = WorkspaceInvite {
        id: Uuid::new_v4(),
        user_id: invitee.id,
        workspace_id,
        token,
        role: role.as_workspace_role(),
        expires_at: now + time::Duration::days(state.config.invite_ttl_days),
        created_at: now,
    };
    tx.invites().put(invite.id, invite.clone());

    mailer::deliver_invite(
        state.mailer.as_ref(),
        &state.config,
        &invitee,
        &inviter.name,
        &workspace.name,
        &invite.token,
    )
    .await
    .map_err(Error::EmailDispatch)?;

    tx.commit();
    info!(workspace_id = %workspace_id, invitee = %invitee.id, "member invited");
    Ok(invite)
}

/// Redeems an invite token for the logged-in user. The invite is single
/// use: joining deletes it.
pub async fn accept_invite(state: &AppState, token: &str, user_id: Uuid) -> Result<Workspace> {
    let mut tx = state.store.begin().await;
    let invite = tx
        .invites()
        .find(|i| i.token == token)
        .ok_or(Error::NotFound("invite"))?;
    let now = OffsetDateTime::now_utc();
    if invite.is_expired(now) {
        return Err(Error::TokenExpired);
    }
    if invite.user_id != user_id {
        return Err(Error::Forbidden("invite was issued to a different user"));
    }

    let mut workspace = tx
        .workspaces()
        .get(invite.workspace_id)
        .ok_or(Error::NotFound("workspace"))?;
    if is_workspace_member(&workspace, user_id) {
        return Err(Error::Conflict(
            "user is already a member of this workspace".into(),
        ));
    }

    workspace.members.push(WorkspaceMember {
        user_id,
        role: invite.role,
        joined_at: now,
    });
    tx.workspaces().put(workspace.id, workspace.clone());
    tx.invites().delete(invite.id);

    state.activity.record(
        user_id,
        ActionType::JoinedWorkspace,
        ResourceType::Workspace,
        workspace.id,
        Some(json!({ "description": format!("joined workspace \"{}\"", workspace.name) })),
    );

    tx.commit();
    info!(workspace_id = %workspace.id, user_id = %user_id, "member joined");
    Ok(workspace)
}
