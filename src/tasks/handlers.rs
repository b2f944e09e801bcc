use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::auth::dto::MessageResponse;
use crate::auth::extractors::AuthUser;
use crate::error::{Error, Result};
use crate::state::AppState;
use crate::tasks::dto::{
    ActivitiesResponse, AddCommentRequest, AddSubtaskRequest, CommentResponse, CommentsResponse,
    CreateTaskRequest, TaskResponse, TaskWithProjectResponse, TasksResponse, UpdateAssigneesRequest,
    UpdateDescriptionRequest, UpdatePriorityRequest, UpdateStatusRequest, UpdateSubtaskRequest,
    UpdateTitleRequest,
};
use crate::tasks::services;

pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks/my-tasks", get(my_tasks))
        .route("/tasks/:id/create-task", post(create_task))
        .route("/tasks/:id/add-subtask", post(add_subtask))
        .route("/tasks/:id/add-comment", post(add_comment))
        .route("/tasks/:id/watch", post(watch_task))
        .route("/tasks/:id/archived", post(archive_task))
        .route("/tasks/:id/update-subtask/:subtask_id", put(update_subtask))
        .route("/tasks/:id/title", put(update_title))
        .route("/tasks/:id/description", put(update_description))
        .route("/tasks/:id/status", put(update_status))
        .route("/tasks/:id/assignees", put(update_assignees))
        .route("/tasks/:id/priority", put(update_priority))
        .route("/tasks/:id/activity", get(resource_activity))
        .route("/tasks/:id/comments", get(task_comments))
        .route("/tasks/:id", get(get_task).delete(delete_task))
}

// The `:id` in create-task is the project receiving the task; everywhere
// else it is the task itself.

#[instrument(skip(state, payload))]
async fn create_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(project_id): Path<Uuid>,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>)> {
    if payload.title.trim().is_empty() {
        return Err(Error::InvalidInput("task title is required".into()));
    }
    let task = services::create_task(&state, project_id, payload, user_id).await?;
    Ok((StatusCode::CREATED, Json(TaskResponse { task })))
}

#[instrument(skip(state))]
async fn get_task(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskWithProjectResponse>> {
    let (task, project) = services::get_task(&state, task_id).await?;
    Ok(Json(TaskWithProjectResponse { task, project }))
}

#[instrument(skip(state, payload))]
async fn update_title(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateTitleRequest>,
) -> Result<Json<TaskResponse>> {
    if payload.title.trim().is_empty() {
        return Err(Error::InvalidInput("task title is required".into()));
    }
    let task = services::update_title(&state, task_id, payload.title, user_id).await?;
    Ok(Json(TaskResponse { task }))
}

#[instrument(skip(state, payload))]
async fn update_description(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateDescriptionRequest>,
) -> Result<Json<TaskResponse>> {
    let task = services::update_description(&state, task_id, payload.description, user_id).await?;
    Ok(Json(TaskResponse { task }))
}

#[instrument(skip(state, payload))]
async fn update_status(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<TaskResponse>> {
    let task = services::update_status(&state, task_id, payload.status, user_id).await?;
    Ok(Json(TaskResponse { task }))
}

#[instrument(skip(state, payload))]
async fn update_assignees(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdateAssigneesRequest>,
) -> Result<Json<TaskResponse>> {
    let task = services::update_assignees(&state, task_id, payload.assignees, user_id).await?;
    Ok(Json(TaskResponse { task }))
}

#[instrument(skip(state, payload))]
async fn update_priority(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<UpdatePriorityRequest>,
) -> Result<Json<TaskResponse>> {
    let task = services::update_priority(&state, task_id, payload.priority, user_id).await?;
    Ok(Json(TaskResponse { task }))
}

#[instrument(skip(state, payload))]
async fn add_subtask(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<AddSubtaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>)> {
    if payload.title.trim().is_empty() {
        return Err(Error::InvalidInput("subtask title is required".into()));
    }
    let task = services::add_subtask(&state, task_id, payload.title, user_id).await?;
    Ok((StatusCode::CREATED, Json(TaskResponse { task })))
}

#[instrument(skip(state, payload))]
async fn update_subtask(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((task_id, subtask_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateSubtaskRequest>,
) -> Result<Json<TaskResponse>> {
    let task =
        services::update_subtask(&state, task_id, subtask_id, payload.completed, user_id).await?;
    Ok(Json(TaskResponse { task }))
}

#[instrument(skip(state, payload))]
async fn add_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<Uuid>,
    Json(payload): Json<AddCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>)> {
    if payload.text.trim().is_empty() {
        return Err(Error::InvalidInput("comment text is required".into()));
    }
    let comment = services::add_comment(&state, task_id, payload.text, user_id).await?;
    Ok((StatusCode::CREATED, Json(CommentResponse { comment })))
}

#[instrument(skip(state))]
async fn watch_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskResponse>> {
    let task = services::toggle_watch(&state, task_id, user_id).await?;
    Ok(Json(TaskResponse { task }))
}

#[instrument(skip(state))]
async fn archive_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskResponse>> {
    let task = services::toggle_archive(&state, task_id, user_id).await?;
    Ok(Json(TaskResponse { task }))
}

#[instrument(skip(state))]
async fn delete_task(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<Uuid>,
) -> Result<Json<MessageResponse>> {
    services::delete_task(&state, task_id, user_id).await?;
    Ok(Json(MessageResponse {
        message: "task deleted".into(),
    }))
}

#[instrument(skip(state))]
async fn my_tasks(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<TasksResponse>> {
    let tasks = services::my_tasks(&state, user_id).await?;
    Ok(Json(TasksResponse { tasks }))
}

#[instrument(skip(state))]
async fn resource_activity(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(resource_id): Path<Uuid>,
) -> Result<Json<ActivitiesResponse>> {
    let activities = services::activities_for_resource(&state, resource_id);
    Ok(Json(ActivitiesResponse { activities }))
}

#[instrument(skip(state))]
async fn task_comments(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(task_id): Path<Uuid>,
) -> Result<Json<CommentsResponse>> {
    let comments = services::comments_for_task(&state, task_id).await?;
    Ok(Json(CommentsResponse { comments }))
}
