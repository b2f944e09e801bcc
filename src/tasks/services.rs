//! Guarded, audited task mutations. Every operation follows one template:
//! open a transaction, load the task and its project, check membership,
//! apply the change, log it, commit. Title, description and status skip the
//! write entirely when the new value equals the current one; priority,
//! assignees, subtasks, comments, watch and archive always write.

use serde_json::json;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::activity::{ActionType, Activity, ResourceType};
use crate::error::{Error, Result};
use crate::membership::{ensure_project_member, ensure_workspace_member};
use crate::models::{Comment, Project, SubTask, Task, TaskPriority, TaskStatus};
use crate::state::AppState;
use crate::store::Tx;
use crate::tasks::dto::CreateTaskRequest;

/// Load the task and its project, rejecting callers outside the project.
/// Creating a task is the one operation guarded on the workspace instead.
fn guarded_task(tx: &mut Tx, task_id: Uuid, user_id: Uuid) -> Result<(Task, Project)> {
    let task = tx.tasks().get(task_id).ok_or(Error::NotFound("task"))?;
    let project = tx
        .projects()
        .get(task.project_id)
        .ok_or(Error::NotFound("project"))?;
    ensure_project_member(&project, user_id)?;
    Ok((task, project))
}

pub async fn create_task(
    state: &AppState,
    project_id: Uuid,
    payload: CreateTaskRequest,
    user_id: Uuid,
) -> Result<Task> {
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

    let now = OffsetDateTime::now_utc();
    let task = Task {
        id: Uuid::new_v4(),
        title: payload.title,
        description: payload.description,
        project_id,
        status: payload.status,
        priority: payload.priority,
        assignees: payload.assignees,
        watchers: Vec::new(),
        due_date: payload.due_date,
        subtasks: Vec::new(),
        comments: Vec::new(),
        created_by: user_id,
        is_archived: false,
        created_at: now,
        updated_at: now,
    };
    tx.tasks().put(task.id, task.clone());

    project.tasks.push(task.id);
    tx.projects().put(project.id, project);

    state.activity.record(
        user_id,
        ActionType::CreatedTask,
        ResourceType::Task,
        task.id,
        Some(json!({ "description": format!("created task \"{}\"", task.title) })),
    );

    tx.commit();
    info!(task_id = %task.id, project_id = %project_id, "task created");
    Ok(task)
}

pub async fn update_title(
    state: &AppState,
    task_id: Uuid,
    title: String,
    user_id: Uuid,
) -> Result<Task> {
    let mut tx = state.store.begin().await;
    let (mut task, _) = guarded_task(&mut tx, task_id, user_id)?;

    if task.title == title {
        return Ok(task);
    }
    let old_title = std::mem::replace(&mut task.title, title);
    task.updated_at = OffsetDateTime::now_utc();
    tx.tasks().put(task.id, task.clone());

    state.activity.record(
        user_id,
        ActionType::UpdatedTask,
        ResourceType::Task,
        task.id,
        Some(json!({
            "description": format!("updated task title from \"{}\" to \"{}\"", old_title, task.title)
        })),
    );

    tx.commit();
    Ok(task)
}

pub async fn update_description(
    state: &AppState,
    task_id: Uuid,
    description: String,
    user_id: Uuid,
) -> Result<Task> {
    let mut tx = state.store.begin().await;
    let (mut task, _) = guarded_task(&mut tx, task_id, user_id)?;

    if task.description.as_deref() == Some(description.as_str()) {
        return Ok(task);
    }
    task.description = Some(description);
    task.updated_at = OffsetDateTime::now_utc();
    tx.tasks().put(task.id, task.clone());

    state.activity.record(
        user_id,
        ActionType::UpdatedTask,
        ResourceType::Task,
        task.id,
        Some(json!({ "description": "updated task description" })),
    );

    tx.commit();
    Ok(task)
}

/// Any status may move to any other. Entering `Done` logs `completed_task`;
/// every other transition, leaving `Done` included, logs `updated_task`.
pub async fn update_status(
    state: &AppState,
    task_id: Uuid,
    status: TaskStatus,
    user_id: Uuid,
) -> Result<Task> {
    let mut tx = state.store.begin().await;
    let (mut task, _) = guarded_task(&mut tx, task_id, user_id)?;

    let old_status = task.status;
    if old_status == status {
        return Ok(task);
    }
    task.status = status;
    task.updated_at = OffsetDateTime::now_utc();
    tx.tasks().put(task.id, task.clone());

    if status == TaskStatus::Done {
        state.activity.record(
            user_id,
            ActionType::CompletedTask,
            ResourceType::Task,
            task.id,
            Some(json!({ "description": "completed task" })),
        );
    } else {
        state.activity.record(
            user_id,
            ActionType::UpdatedTask,
            ResourceType::Task,
            task.id,
            Some(json!({
                "description": format!("updated task status from {} to {}", old_status, status)
            })),
        );
    }

    tx.commit();
    Ok(task)
}

// Priority and assignees write and log unconditionally, even when nothing
// changed. Title/description/status skip instead; the asymmetry is part of
// the observable behavior and stays.

pub async fn update_priority(
    state: &AppState,
    task_id: Uuid,
    priority: TaskPriority,
    user_id: Uuid,
) -> Result<Task> {
    let mut tx = state.store.begin().await;
    let (mut task, _) = guarded_task(&mut tx, task_id, user_id)?;

    task.priority = priority;
    task.updated_at = OffsetDateTime::now_utc();
    tx.tasks().put(task.id, task.clone());

    state.activity.record(
        user_id,
        ActionType::UpdatedTask,
        ResourceType::Task,
        task.id,
        Some(json!({ "description": format!("updated task priority to {}", priority) })),
    );

    tx.commit();
    Ok(task)
}

pub async fn update_assignees(
    state: &AppState,
    task_id: Uuid,
    assignees: Vec<Uuid>,
    user_id: Uuid,
) -> Result<Task> {
    let mut tx = state.store.begin().await;
    let (mut task, _) = guarded_task(&mut tx, task_id, user_id)?;

    task.assignees = assignees;
    task.updated_at = OffsetDateTime::now_utc();
    tx.tasks().put(task.id, task.clone());

    state.activity.record(
        user_id,
        ActionType::UpdatedTask,
        ResourceType::Task,
        task.id,
        Some(json!({ "description": "updated task assignees" })),
    );

    tx.commit();
    Ok(task)
}

pub async fn add_subtask(
    state: &AppState,
    task_id: Uuid,
    title: String,
    user_id: Uuid,
) -> Result<Task> {
    let mut tx = state.store.begin().await;
    let (mut task, _) = guarded_task(&mut tx, task_id, user_id)?;

    let subtask = SubTask {
        id: Uuid::new_v4(),
        title,
        completed: false,
        created_at: OffsetDateTime::now_utc(),
    };
    let wording = format!("created subtask \"{}\"", subtask.title);
    task.subtasks.push(subtask);
    task.updated_at = OffsetDateTime::now_utc();
    tx.tasks().put(task.id, task.clone());

    state.activity.record(
        user_id,
        ActionType::CreatedSubtask,
        ResourceType::Task,
        task.id,
        Some(json!({ "description": wording })),
    );

    tx.commit();
    Ok(task)
}

/// Sets the subtask's completed flag to the given value; the log entry says
/// whether that completed or reopened it.
pub async fn update_subtask(
    state: &AppState,
    task_id: Uuid,
    subtask_id: Uuid,
    completed: bool,
    user_id: Uuid,
) -> Result<Task> {
    let mut tx = state.store.begin().await;
    let (mut task, _) = guarded_task(&mut tx, task_id, user_id)?;

    let subtask = task
        .subtasks
        .iter_mut()
        .find(|s| s.id == subtask_id)
        .ok_or(Error::NotFound("subtask"))?;
    subtask.completed = completed;
    let wording = format!(
        "{} subtask \"{}\"",
        if completed { "completed" } else { "reopened" },
        subtask.title
    );
    task.updated_at = OffsetDateTime::now_utc();
    tx.tasks().put(task.id, task.clone());

    state.activity.record(
        user_id,
        ActionType::UpdatedSubtask,
        ResourceType::Task,
        task.id,
        Some(json!({ "description": wording })),
    );

    tx.commit();
    Ok(task)
}

pub async fn add_comment(
    state: &AppState,
    task_id: Uuid,
    text: String,
    user_id: Uuid,
) -> Result<Comment> {
    let mut tx = state.store.begin().await;
    let (mut task, _) = guarded_task(&mut tx, task_id, user_id)?;

    let comment = Comment {
        id: Uuid::new_v4(),
        text,
        task_id,
        author_id: user_id,
        created_at: OffsetDateTime::now_utc(),
    };
    tx.comments().put(comment.id, comment.clone());

    task.comments.push(comment.id);
    task.updated_at = OffsetDateTime::now_utc();
    tx.tasks().put(task.id, task);

    state.activity.record(
        user_id,
        ActionType::AddedComment,
        ResourceType::Task,
        task_id,
        Some(json!({ "description": "added a comment" })),
    );

    tx.commit();
    Ok(comment)
}

// Watch, archive and delete mutate without logging; those actions are
// outside the audit enum's coverage.

pub async fn toggle_watch(state: &AppState, task_id: Uuid, user_id: Uuid) -> Result<Task> {
    let mut tx = state.store.begin().await;
    let (mut task, _) = guarded_task(&mut tx, task_id, user_id)?;

    if let Some(pos) = task.watchers.iter().position(|w| *w == user_id) {
        task.watchers.remove(pos);
    } else {
        task.watchers.push(user_id);
    }
    task.updated_at = OffsetDateTime::now_utc();
    tx.tasks().put(task.id, task.clone());

    tx.commit();
    Ok(task)
}

pub async fn toggle_archive(state: &AppState, task_id: Uuid, user_id: Uuid) -> Result<Task> {
    let mut tx = state.store.begin().await;
    let (mut task, _) = guarded_task(&mut tx, task_id, user_id)?;

    task.is_archived = !task.is_archived;
    task.updated_at = OffsetDateTime::now_utc();
    tx.tasks().put(task.id, task.clone());

    tx.commit();
    Ok(task)
}

/// Removes the task document only. The project's task-id list keeps the
/// dangling id; readers resolve task ids through the task collection and
/// skip missing ones.
pub async fn delete_task(state: &AppState, task_id: Uuid, user_id: Uuid) -> Result<()> {
    let mut tx = state.store.begin().await;
    guarded_task(&mut tx, task_id, user_id)?;

    tx.tasks().delete(task_id);
    tx.commit();
    info!(task_id = %task_id, "task deleted");
    Ok(())
}

/// Task plus its project. Reads are not membership-guarded.
pub async fn get_task(state: &AppState, task_id: Uuid) -> Result<(Task, Project)> {
    let snapshot = state.store.read().await;
    let task = snapshot.tasks().get(task_id).ok_or(Error::NotFound("task"))?;
    let project = snapshot
        .projects()
        .get(task.project_id)
        .ok_or(Error::NotFound("project"))?;
    Ok((task, project))
}

/// Tasks assigned to the caller, oldest first.
pub async fn my_tasks(state: &AppState, user_id: Uuid) -> Result<Vec<Task>> {
    let snapshot = state.store.read().await;
    let mut tasks = snapshot.tasks().filter(|t| t.assignees.contains(&user_id));
    tasks.sort_by_key(|t| t.created_at);
    Ok(tasks)
}

pub async fn comments_for_task(state: &AppState, task_id: Uuid) -> Result<Vec<Comment>> {
    let snapshot = state.store.read().await;
    let mut comments = snapshot.comments().filter(|c| c.task_id == task_id);
    comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(comments)
}

pub fn activities_for_resource(state: &AppState, resource_id: Uuid) -> Vec<Activity> {
    state.activity.for_resource(resource_id)
}
