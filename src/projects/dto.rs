use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{Project, ProjectRole, ProjectStatus, Task};

#[derive(Debug, Deserialize)]
pub struct ProjectMemberPayload {
    pub user_id: Uuid,
    #[serde(default = "default_member_role")]
    pub role: ProjectRole,
}

fn default_member_role() -> ProjectRole {
    ProjectRole::Contributor
}

fn default_status() -> ProjectStatus {
    ProjectStatus::Planning
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
    pub description: Option<String>,
    #[serde(default = "default_status")]
    pub status: ProjectStatus,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub members: Vec<ProjectMemberPayload>,
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    pub tags: Option<Vec<String>>,
    pub members: Option<Vec<ProjectMemberPayload>>,
}

#[derive(Debug, serde::Serialize)]
pub struct ProjectResponse {
    pub project: Project,
}

#[derive(Debug, serde::Serialize)]
pub struct ProjectWithTasksResponse {
    pub project: Project,
    pub tasks: Vec<Task>,
}
