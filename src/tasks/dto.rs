use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::activity::Activity;
use crate::models::{Comment, Project, Task, TaskPriority, TaskStatus};

fn default_status() -> TaskStatus {
    TaskStatus::ToDo
}

fn default_priority() -> TaskPriority {
    TaskPriority::Medium
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_status")]
    pub status: TaskStatus,
    #[serde(default = "default_priority")]
    pub priority: TaskPriority,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub assignees: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTitleRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDescriptionRequest {
    pub description: String,
}

/// Status values outside the closed set are rejected at deserialization.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAssigneesRequest {
    pub assignees: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePriorityRequest {
    pub priority: TaskPriority,
}

#[derive(Debug, Deserialize)]
pub struct AddSubtaskRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSubtaskRequest {
    pub completed: bool,
}

#[derive(Debug, Deserialize)]
pub struct AddCommentRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub task: Task,
}

#[derive(Debug, Serialize)]
pub struct TaskWithProjectResponse {
    pub task: Task,
    pub project: Project,
}

#[derive(Debug, Serialize)]
pub struct TasksResponse {
    pub tasks: Vec<Task>,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub comment: Comment,
}

#[derive(Debug, Serialize)]
pub struct CommentsResponse {
    pub comments: Vec<Comment>,
}

#[derive(Debug, Serialize)]
pub struct ActivitiesResponse {
    pub activities: Vec<Activity>,
}
