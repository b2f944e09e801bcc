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
use crate::error::{Error, Result};
use crate::projects::dto::{
    CreateProjectRequest, ProjectResponse, ProjectWithTasksResponse, UpdateProjectRequest,
};
use crate::projects::services;
use crate::state::AppState;

pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/projects/:id/create-project", post(create_project))
        .route("/projects/:id/tasks", get(get_project_tasks))
        .route(
            "/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
}

// In create-project the `:id` is the enclosing workspace; in the other
// routes it is the project.

#[instrument(skip(state, payload))]
async fn create_project(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(workspace_id): Path<Uuid>,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectResponse>)> {
    if payload.title.trim().is_empty() {
        return Err(Error::InvalidInput("project title is required".into()));
    }
    let project = services::create_project(&state, workspace_id, payload, user_id).await?;
    Ok((StatusCode::CREATED, Json(ProjectResponse { project })))
}

#[instrument(skip(state))]
async fn get_project(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ProjectResponse>> {
    let project = services::get_project(&state, project_id, user_id).await?;
    Ok(Json(ProjectResponse { project }))
}

#[instrument(skip(state))]
async fn get_project_tasks(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<ProjectWithTasksResponse>> {
    let (project, tasks) = services::get_project_with_tasks(&state, project_id, user_id).await?;
    Ok(Json(ProjectWithTasksResponse { project, tasks }))
}

#[instrument(skip(state, payload))]
async fn update_project(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<UpdateProjectRequest>,
) -> Result<Json<ProjectResponse>> {
    if payload.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(Error::InvalidInput("project title is required".into()));
    }
    let project = services::update_project(&state, project_id, payload, user_id).await?;
    Ok(Json(ProjectResponse { project }))
}

#[instrument(skip(state))]
async fn delete_project(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<MessageResponse>> {
    services::delete_project(&state, project_id, user_id).await?;
    Ok(Json(MessageResponse {
        message: "project deleted".into(),
    }))
}
