use serde_json::json;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::activity::{ActionType, ResourceType};
use crate::error::{Error, Result};
use crate::membership::ensure_workspace_member;
use crate::models::{Project, ProjectMember, ProjectRole, ProjectStatus, Task};
use crate::projects::dto::{CreateProjectRequest, UpdateProjectRequest};
use crate::state::AppState;

/// Creates the project inside its workspace. The creator always ends up in
/// the member list; when the payload leaves them out they join as `manager`.
pub async fn create_project(
    state: &AppState,
    workspace_id: Uuid,
    payload: CreateProjectRequest,
    user_id: Uuid,
) -> Result<Project> {
    let mut tx = state.store.begin().await;
    let mut workspace = tx
        .workspaces()
        .get(workspace_id)
        .ok_or(Error::NotFound("workspace"))?;
    ensure_workspace_member(&workspace, user_id)?;

    let mut members: Vec<ProjectMember> = payload
        .members
        .into_iter()
        .map(|m| ProjectMember { user_id: m.user_id, role: m.role })
        .collect();
    if !members.iter().any(|m| m.user_id == user_id) {
        members.push(ProjectMember {
            user_id,
            role: ProjectRole::Manager,
        });
    }

    let now = OffsetDateTime::now_utc();
    let project = Project {
        id: Uuid::new_v4(),
        title: payload.title,
        description: payload.description,
        workspace_id,
        status: payload.status,
        start_date: payload.start_date,
        due_date: payload.due_date,
        tags: payload.tags,
        tasks: Vec::new(),
        members,
        created_by: user_id,
        is_archived: false,
        created_at: now,
        updated_at: now,
    };
    tx.projects().put(project.id, project.clone());

    workspace.projects.push(project.id);
    tx.workspaces().put(workspace.id, workspace);

    state.activity.record(
        user_id,
        ActionType::CreatedProject,
        ResourceType::Project,
        project.id,
        Some(json!({ "description": format!("created project \"{}\"", project.title) })),
    );

    tx.commit();
    info!(project_id = %project.id, workspace_id = %workspace_id, "project created");
    Ok(project)
}

pub async fn get_project(state: &AppState, project_id: Uuid, user_id: Uuid) -> Result<Project> {
    let snapshot = state.store.read().await;
    let project = snapshot
        .projects()
        .get(project_id)
        .ok_or(Error::NotFound("project"))?;
    let workspace = snapshot
        .workspaces()
        .get(project.workspace_id)
        .ok_or(Error::NotFound("workspace"))?;
    ensure_workspace_member(&workspace, user_id)?;
    Ok(project)
}

/// Project plus every task inside it, oldest task first.
pub async fn get_project_with_tasks(
    state: &AppState,
    project_id: Uuid,
    user_id: Uuid,
) -> Result<(Project, Vec<Task>)> {
    let snapshot = state.store.read().await;
    let project = snapshot
        .projects()
        .get(project_id)
        .ok_or(Error::NotFound("project"))?;
    let workspace = snapshot
        .workspaces()
        .get(project.workspace_id)
        .ok_or(Error::NotFound("workspace"))?;
    ensure_workspace_member(&workspace, user_id)?;

    let mut tasks = snapshot.tasks().filter(|t| t.project_id == project_id);
    tasks.sort_by_key(|t| t.created_at);
    Ok((project, tasks))
}

/// Partial update. Unlike task title/description/status there is no no-op
/// skip; every call writes and logs. Entering `Completed` is the one special
/// case, logged as `completed_project`.
pub async fn update_project(
    state: &AppState,
    project_id: Uuid,
    payload: UpdateProjectRequest,
    user_id: Uuid,
) -> Result<Project> {
    let mut tx = state.store.begin().await;
    let mut project = tx
        .projects()
        .get(project_id)
        .ok_or(Error::NotFound("project"))?;
    let workspace = tx
        .workspaces()
        .get(project.workspace_id)
        .ok_or(Error::NotFound("workspace"))?;
    ensure_workspace_member(&workspace, user_id)?;

    let old_status = project.status;
    if let Some(title) = payload.title {
        project.title = title;
    }
    if let Some(description) = payload.description {
        project.description = Some(description);
    }
    if let Some(status) = payload.status {
        project.status = status;
    }
    if let Some(start_date) = payload.start_date {
        project.start_date = Some(start_date);
    }
    if let Some(due_date) = payload.due_date {
        project.due_date = Some(due_date);
    }
    if let Some(tags) = payload.tags {
        project.tags = tags;
    }
    if let Some(members) = payload.members {
        project.members = members
            .into_iter()
            .map(|m| ProjectMember { user_id: m.user_id, role: m.role })
            .collect();
    }
    project.updated_at = OffsetDateTime::now_utc();
    tx.projects().put(project.id, project.clone());

    if project.status == ProjectStatus::Completed && old_status != ProjectStatus::Completed {
        state.activity.record(
            user_id,
            ActionType::CompletedProject,
            ResourceType::Project,
            project.id,
            Some(json!({ "description": "completed project" })),
        );
    } else {
        state.activity.record(
            user_id,
            ActionType::UpdatedProject,
            ResourceType::Project,
            project.id,
            Some(json!({ "description": format!("updated project \"{}\"", project.title) })),
        );
    }

    tx.commit();
    Ok(project)
}

/// Removes the project and its slot in the workspace list. Tasks under it
/// are left in place; no activity is recorded for deletions.
pub async fn delete_project(state: &AppState, project_id: Uuid, user_id: Uuid) -> Result<()> {
    let mut tx = state.store.begin().await;
    let project = tx
        .projects()
        .get(project_id)
        .ok_or(Error::NotFound("project"))?;
    let mut workspace = tx
        .workspaces()
        .get(project.workspace_id)
        .ok_or(Error::NotFound("workspace"))?;
    ensure_workspace_member(&workspace, user_id)?;

    workspace.projects.retain(|id| *id != project_id);
    tx.workspaces().put(workspace.id, workspace);
    tx.projects().delete(project_id);

    tx.commit();
    info!(project_id = %project_id, "project deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActionType;
    use crate::auth::services::{register, verify_email};
    use crate::models::User;
    use crate::workspaces::dto::CreateWorkspaceRequest;
    use crate::workspaces::services::create_workspace;

    async fn member(state: &AppState, email: &str) -> User {
        let res = register(state, "Project Tester", email, "password123")
            .await
            .expect("register");
        verify_email(state, &res.verification_token)
            .await
            .expect("verify")
    }

    async fn seeded_workspace(state: &AppState) -> (User, crate::models::Workspace) {
        let user = member(state, "owner@example.com").await;
        let workspace = create_workspace(
            state,
            CreateWorkspaceRequest {
                name: "Acme".into(),
                description: None,
                color: None,
            },
            user.id,
        )
        .await
        .expect("workspace");
        (user, workspace)
    }

    fn request(title: &str) -> CreateProjectRequest {
        CreateProjectRequest {
            title: title.into(),
            description: None,
            status: ProjectStatus::Planning,
            start_date: None,
            due_date: None,
            tags: Vec::new(),
            members: Vec::new(),
        }
    }

    #[tokio::test]
    async fn create_project_promotes_creator_to_manager() {
        let state = AppState::fake();
        let (owner, workspace) = seeded_workspace(&state).await;

        let project = create_project(&state, workspace.id, request("Apollo"), owner.id)
            .await
            .expect("create");

        let creator = project
            .members
            .iter()
            .find(|m| m.user_id == owner.id)
            .expect("creator in members");
        assert_eq!(creator.role, ProjectRole::Manager);
    }

    #[tokio::test]
    async fn create_project_keeps_an_explicit_creator_entry() {
        let state = AppState::fake();
        let (owner, workspace) = seeded_workspace(&state).await;

        let mut payload = request("Apollo");
        payload.members = vec![crate::projects::dto::ProjectMemberPayload {
            user_id: owner.id,
            role: ProjectRole::Viewer,
        }];
        let project = create_project(&state, workspace.id, payload, owner.id)
            .await
            .expect("create");

        let entries: Vec<_> = project.members.iter().filter(|m| m.user_id == owner.id).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].role, ProjectRole::Viewer);
    }

    #[tokio::test]
    async fn create_project_links_workspace_and_logs_activity() {
        let state = AppState::fake();
        let (owner, workspace) = seeded_workspace(&state).await;

        let project = create_project(&state, workspace.id, request("Apollo"), owner.id)
            .await
            .expect("create");

        let snapshot = state.store.read().await;
        let stored = snapshot.workspaces().get(workspace.id).expect("workspace");
        assert!(stored.projects.contains(&project.id));

        let entries = state.activity.for_resource(project.id);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, ActionType::CreatedProject);
    }

    #[tokio::test]
    async fn create_project_rejects_non_members_without_writes() {
        let state = AppState::fake();
        let (_, workspace) = seeded_workspace(&state).await;
        let outsider = member(&state, "outsider@example.com").await;

        let err = create_project(&state, workspace.id, request("Apollo"), outsider.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        let snapshot = state.store.read().await;
        assert!(snapshot.projects().filter(|_| true).is_empty());
        assert!(snapshot.workspaces().get(workspace.id).expect("ws").projects.is_empty());
    }

    #[tokio::test]
    async fn update_project_logs_completed_only_on_entering_completed() {
        let state = AppState::fake();
        let (owner, workspace) = seeded_workspace(&state).await;
        let project = create_project(&state, workspace.id, request("Apollo"), owner.id)
            .await
            .expect("create");

        let completed = update_project(
            &state,
            project.id,
            UpdateProjectRequest {
                status: Some(ProjectStatus::Completed),
                ..Default::default()
            },
            owner.id,
        )
        .await
        .expect("complete");
        assert_eq!(completed.status, ProjectStatus::Completed);

        // Staying in Completed and leaving it are both plain updates.
        update_project(
            &state,
            project.id,
            UpdateProjectRequest {
                title: Some("Apollo 11".into()),
                ..Default::default()
            },
            owner.id,
        )
        .await
        .expect("retitle");
        update_project(
            &state,
            project.id,
            UpdateProjectRequest {
                status: Some(ProjectStatus::InProgress),
                ..Default::default()
            },
            owner.id,
        )
        .await
        .expect("reopen");

        let actions: Vec<_> = state
            .activity
            .for_resource(project.id)
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![
                ActionType::CreatedProject,
                ActionType::CompletedProject,
                ActionType::UpdatedProject,
                ActionType::UpdatedProject,
            ]
        );
    }

    #[tokio::test]
    async fn delete_project_unlinks_from_workspace_without_activity() {
        let state = AppState::fake();
        let (owner, workspace) = seeded_workspace(&state).await;
        let project = create_project(&state, workspace.id, request("Apollo"), owner.id)
            .await
            .expect("create");
        let created_entries = state.activity.for_resource(project.id).len();

        delete_project(&state, project.id, owner.id).await.expect("delete");

        let snapshot = state.store.read().await;
        assert!(snapshot.projects().get(project.id).is_none());
        assert!(!snapshot.workspaces().get(workspace.id).expect("ws").projects.contains(&project.id));
        assert_eq!(state.activity.for_resource(project.id).len(), created_entries);
    }

    #[tokio::test]
    async fn get_project_is_forbidden_for_non_members() {
        let state = AppState::fake();
        let (owner, workspace) = seeded_workspace(&state).await;
        let project = create_project(&state, workspace.id, request("Apollo"), owner.id)
            .await
            .expect("create");
        let outsider = member(&state, "outsider@example.com").await;

        let err = get_project(&state, project.id, outsider.id).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        get_project(&state, project.id, owner.id).await.expect("member reads");
    }
}
