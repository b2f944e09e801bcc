//! Dashboard aggregation over a workspace's projects and tasks. Pure
//! functions of a snapshot and a clock reading; nothing here caches or
//! writes.

use serde::Serialize;
use time::{Duration, OffsetDateTime, Weekday};

use crate::models::{Project, ProjectStatus, Task, TaskStatus};

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatsCounts {
    pub total_projects: usize,
    pub total_tasks: usize,
    pub projects_in_progress: usize,
    pub tasks_completed: usize,
    pub tasks_to_do: usize,
    pub tasks_in_progress: usize,
}

/// One calendar day of the trailing week.
#[derive(Debug, Serialize)]
pub struct TaskTrend {
    pub name: &'static str,
    pub done: usize,
    pub in_progress: usize,
    pub to_do: usize,
}

#[derive(Debug, Serialize)]
pub struct ProjectProductivity {
    pub project_id: uuid::Uuid,
    pub title: String,
    pub completed: usize,
    pub total: usize,
    pub productivity: f64,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceStats {
    pub counts: StatsCounts,
    pub task_trends: Vec<TaskTrend>,
    pub upcoming_tasks: Vec<Task>,
    pub project_productivity: Vec<ProjectProductivity>,
}

fn short_weekday(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Monday => "Mon",
        Weekday::Tuesday => "Tue",
        Weekday::Wednesday => "Wed",
        Weekday::Thursday => "Thu",
        Weekday::Friday => "Fri",
        Weekday::Saturday => "Sat",
        Weekday::Sunday => "Sun",
    }
}

pub fn compute(projects: &[Project], tasks: &[Task], now: OffsetDateTime) -> WorkspaceStats {
    let counts = StatsCounts {
        total_projects: projects.len(),
        total_tasks: tasks.len(),
        projects_in_progress: projects
            .iter()
            .filter(|p| p.status == ProjectStatus::InProgress)
            .count(),
        tasks_completed: tasks.iter().filter(|t| t.status == TaskStatus::Done).count(),
        tasks_to_do: tasks.iter().filter(|t| t.status == TaskStatus::ToDo).count(),
        tasks_in_progress: tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .count(),
    };

    // Buckets are the trailing seven calendar dates, today included, not a
    // rolling 168-hour window. A task counts toward the date its last
    // update fell on.
    let today = now.date();
    let task_trends = (0..7)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            let of_day: Vec<&Task> = tasks.iter().filter(|t| t.updated_at.date() == date).collect();
            TaskTrend {
                name: short_weekday(date.weekday()),
                done: of_day.iter().filter(|t| t.status == TaskStatus::Done).count(),
                in_progress: of_day
                    .iter()
                    .filter(|t| t.status == TaskStatus::InProgress)
                    .count(),
                to_do: of_day.iter().filter(|t| t.status == TaskStatus::ToDo).count(),
            }
        })
        .collect();

    // Due strictly after now and within the next seven days; tasks without
    // a due date never show up here.
    let horizon = now + Duration::days(7);
    let mut upcoming_tasks: Vec<Task> = tasks
        .iter()
        .filter(|t| t.due_date.is_some_and(|due| due > now && due <= horizon))
        .cloned()
        .collect();
    upcoming_tasks.sort_by_key(|t| t.due_date);

    let project_productivity = projects
        .iter()
        .map(|project| {
            let of_project: Vec<&Task> =
                tasks.iter().filter(|t| t.project_id == project.id).collect();
            let total = of_project.len();
            let completed = of_project
                .iter()
                .filter(|t| t.status == TaskStatus::Done && !t.is_archived)
                .count();
            ProjectProductivity {
                project_id: project.id,
                title: project.title.clone(),
                completed,
                total,
                productivity: if total == 0 {
                    0.0
                } else {
                    completed as f64 / total as f64
                },
            }
        })
        .collect();

    WorkspaceStats {
        counts,
        task_trends,
        upcoming_tasks,
        project_productivity,
    }
}
