use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::dto::MessageResponse;
use crate::auth::extractors::AuthUser;
use crate::auth::services::is_valid_email;
use crate::error::{Error, Result};
use crate::state::AppState;
use crate::workspaces::dto::{
    AcceptInviteRequest, CreateWorkspaceRequest, InviteMemberRequest, WorkspaceProjectsResponse,
    WorkspaceResponse, WorkspacesResponse,
};
use crate::workspaces::services;
use crate::workspaces::stats::WorkspaceStats;

pub fn workspace_routes() -> Router<AppState> {
    Router::new()
        .route("/workspaces", get(list_workspaces).post(create_workspace))
        .route("/workspaces/accept-invite-token", post(accept_invite))
        .route("/workspaces/:id", get(get_workspace))
        .route("/workspaces/:id/projects", get(get_workspace_projects))
        .route("/workspaces/:id/stats", get(get_workspace_stats))
        .route("/workspaces/:id/invite-member", post(invite_member))
}

#[instrument(skip(state, payload))]
async fn create_workspace(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateWorkspaceRequest>,
) -> Result<(StatusCode, Json<WorkspaceResponse>)> {
    if payload.name.trim().len() < 3 {
        return Err(Error::InvalidInput(
            "workspace name must be at least 3 characters".into(),
        ));
    }
    let workspace = services::create_workspace(&state, payload, user_id).await?;
    Ok((StatusCode::CREATED, Json(WorkspaceResponse { workspace })))
}

#[instrument(skip(state))]
async fn list_workspaces(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<WorkspacesResponse>> {
    let workspaces = services::list_workspaces(&state, user_id).await?;
    Ok(Json(WorkspacesResponse { workspaces }))
}

#[instrument(skip(state))]
async fn get_workspace(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(workspace_id): Path<Uuid>,
) -> Result<Json<WorkspaceResponse>> {
    let workspace = services::get_workspace(&state, workspace_id).await?;
    Ok(Json(WorkspaceResponse { workspace }))
}

#[instrument(skip(state))]
async fn get_workspace_projects(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(workspace_id): Path<Uuid>,
) -> Result<Json<WorkspaceProjectsResponse>> {
    let (workspace, projects) = services::get_workspace_projects(&state, workspace_id).await?;
    Ok(Json(WorkspaceProjectsResponse { workspace, projects }))
}

#[instrument(skip(state))]
async fn get_workspace_stats(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(workspace_id): Path<Uuid>,
) -> Result<Json<WorkspaceStats>> {
    let stats = services::get_workspace_stats(&state, workspace_id, user_id).await?;
    Ok(Json(stats))
}

#[instrument(skip(state, payload))]
async fn invite_member(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(workspace_id): Path<Uuid>,
    Json(payload): Json<InviteMemberRequest>,
) -> Result<Json<MessageResponse>> {
    if !is_valid_email(payload.email.trim()) {
        return Err(Error::InvalidInput("invalid email address".into()));
    }
    services::invite_member(&state, workspace_id, payload.email.trim(), payload.role, user_id)
        .await?;
    // The token travels only in the invite email.
    Ok(Json(MessageResponse {
        message: "invitation sent".into(),
    }))
}

#[instrument(skip(state, payload))]
async fn accept_invite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<AcceptInviteRequest>,
) -> Result<Json<WorkspaceResponse>> {
    if payload.token.trim().is_empty() {
        return Err(Error::InvalidInput("invite token is required".into()));
    }
    let workspace = services::accept_invite(&state, payload.token.trim(), user_id).await?;
    Ok(Json(WorkspaceResponse { workspace }))
}
