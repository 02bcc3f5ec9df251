//! Project / task / team snapshot repository

use crate::db::DatabasePool;
use crate::models::{Project, Snapshot, Task, TaskPriority, TaskStatus, Team, TeamMember};
use crate::state::{load_json, StateStore, SNAPSHOT_KEY};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use planeja_common::types::{ProjectId, TaskId, TeamId, UserId};
use planeja_common::{Error, Result};
use sqlx::FromRow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Snapshot repository trait
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Load every project, task and team visible to reports
    async fn load_snapshot(&self) -> Result<Snapshot>;
}

#[derive(Debug, FromRow)]
struct ProjectRow {
    id: ProjectId,
    name: String,
    description: Option<String>,
    status: String,
    team_id: Option<TeamId>,
    owner_id: UserId,
    due_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct TaskRow {
    id: TaskId,
    project_id: ProjectId,
    title: String,
    status: String,
    priority: String,
    due_date: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct TeamRow {
    id: TeamId,
    name: String,
}

#[derive(Debug, FromRow)]
struct TeamMemberRow {
    team_id: TeamId,
    user_id: UserId,
    name: String,
}

#[derive(Debug, FromRow)]
struct AssigneeRow {
    task_id: TaskId,
    user_id: UserId,
}

/// Database snapshot repository
pub struct DbSnapshotRepository {
    pool: DatabasePool,
}

impl DbSnapshotRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn projects(&self) -> Result<Vec<Project>> {
        let rows = sqlx::query_as::<_, ProjectRow>(
            r#"
            SELECT id, name, description, status, team_id, owner_id, due_date, created_at
            FROM projects
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| Project {
                id: row.id,
                name: row.name,
                description: row.description,
                status: row.status,
                team_id: row.team_id,
                owner_id: row.owner_id,
                created_at: row.created_at,
                due_date: row.due_date,
            })
            .collect())
    }

    async fn tasks(&self) -> Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, project_id, title, status, priority, due_date, completed_at, created_at
            FROM tasks
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        let assignees = sqlx::query_as::<_, AssigneeRow>(
            "SELECT task_id, user_id FROM task_assignees",
        )
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        let mut by_task: HashMap<TaskId, Vec<UserId>> = HashMap::new();
        for row in assignees {
            by_task.entry(row.task_id).or_default().push(row.user_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let status = row.status.parse().unwrap_or_else(|_| {
                    warn!(task_id = %row.id, status = %row.status, "Unknown task status");
                    TaskStatus::Pending
                });
                let priority = row.priority.parse().unwrap_or(TaskPriority::Medium);
                Task {
                    assignee_ids: by_task.remove(&row.id).unwrap_or_default(),
                    id: row.id,
                    project_id: row.project_id,
                    title: row.title,
                    status,
                    priority,
                    due_date: row.due_date,
                    created_at: row.created_at,
                    completed_at: row.completed_at,
                }
            })
            .collect())
    }

    async fn teams(&self) -> Result<Vec<Team>> {
        let rows = sqlx::query_as::<_, TeamRow>("SELECT id, name FROM teams ORDER BY name ASC")
            .fetch_all(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let members = sqlx::query_as::<_, TeamMemberRow>(
            "SELECT team_id, user_id, name FROM team_members ORDER BY name ASC",
        )
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        let mut by_team: HashMap<TeamId, Vec<TeamMember>> = HashMap::new();
        for row in members {
            by_team.entry(row.team_id).or_default().push(TeamMember {
                user_id: row.user_id,
                name: row.name,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| Team {
                members: by_team.remove(&row.id).unwrap_or_default(),
                id: row.id,
                name: row.name,
            })
            .collect())
    }
}

#[async_trait]
impl SnapshotRepository for DbSnapshotRepository {
    async fn load_snapshot(&self) -> Result<Snapshot> {
        let snapshot = Snapshot {
            projects: self.projects().await?,
            tasks: self.tasks().await?,
            teams: self.teams().await?,
        };

        debug!(
            projects = snapshot.projects.len(),
            tasks = snapshot.tasks.len(),
            teams = snapshot.teams.len(),
            "Loaded snapshot from database"
        );

        Ok(snapshot)
    }
}

/// Snapshot kept as a JSON document in the state store (local mode)
pub struct StoredSnapshotRepository {
    store: Arc<dyn StateStore>,
}

impl StoredSnapshotRepository {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SnapshotRepository for StoredSnapshotRepository {
    async fn load_snapshot(&self) -> Result<Snapshot> {
        Ok(load_json(self.store.as_ref(), SNAPSHOT_KEY)
            .await?
            .unwrap_or_default())
    }
}
