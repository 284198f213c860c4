use crate::domain::task_view::{self, TaskQuery};
use crate::domain::todo::driven_ports::{TaskReader, TaskWriter};
use crate::domain::todo::driving_ports::{TaskError, TaskPort};
use crate::external_connections::ExternalConnectivity;
use anyhow::Context;
use chrono::{DateTime, Utc};
use derive_more::Display;
use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// How pressing a task is. Declaration order is the sort order: high sorts first.
#[derive(Debug, Display, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    #[display("high")]
    High,
    #[default]
    #[display("medium")]
    Medium,
    #[display("low")]
    Low,
}

/// One label of the fixed category vocabulary. Declaration order is the canonical order used
/// when storing or returning a set of categories.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    #[display("work")]
    Work,
    #[display("personal")]
    Personal,
    #[display("study")]
    Study,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0:?} is not a recognized label")]
pub struct UnknownLabel(pub String);

impl FromStr for Priority {
    type Err = UnknownLabel;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(UnknownLabel(label.to_owned())),
        }
    }
}

impl FromStr for Category {
    type Err = UnknownLabel;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        match label.trim().to_ascii_lowercase().as_str() {
            "work" => Ok(Self::Work),
            "personal" => Ok(Self::Personal),
            "study" => Ok(Self::Study),
            _ => Err(UnknownLabel(label.to_owned())),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct TodoTask {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub due_at: Option<DateTime<Utc>>,
    /// Rows written before priorities existed have none
    pub priority: Option<Priority>,
    pub category: BTreeSet<Category>,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub category: BTreeSet<Category>,
}

/// Replaces every user-editable field of a task. Completion is changed separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTask {
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub category: BTreeSet<Category>,
}

pub mod driven_ports {
    use super::*;

    /// Reads tasks. Every lookup is scoped to the owning user, so another user's task
    /// is simply absent from the results.
    #[allow(async_fn_in_trait)]
    pub trait TaskReader {
        async fn tasks_for_user(
            &self,
            user_id: Uuid,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Vec<TodoTask>, anyhow::Error>;
        async fn user_task_by_id(
            &self,
            user_id: Uuid,
            task_id: Uuid,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Option<TodoTask>, anyhow::Error>;
    }

    /// Writes tasks. Mutations return whether an owned task was actually touched.
    #[allow(async_fn_in_trait)]
    pub trait TaskWriter {
        async fn create_task_for_user(
            &self,
            user_id: Uuid,
            new_task: &NewTask,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Uuid, anyhow::Error>;

        async fn update_task(
            &self,
            user_id: Uuid,
            task_id: Uuid,
            update: &UpdateTask,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<bool, anyhow::Error>;

        async fn set_completed(
            &self,
            user_id: Uuid,
            task_id: Uuid,
            completed: bool,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<bool, anyhow::Error>;

        async fn delete_task(
            &self,
            user_id: Uuid,
            task_id: Uuid,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<bool, anyhow::Error>;
    }
}

pub mod driving_ports {
    use super::*;

    #[derive(Debug, Error)]
    pub enum TaskError {
        #[error("The task does not exist or belongs to someone else.")]
        NotFound,
        #[error(transparent)]
        PortError(#[from] anyhow::Error),
    }

    #[cfg(test)]
    #[allow(clippy::items_after_test_module)]
    mod task_error_clone {
        use super::TaskError;
        use anyhow::anyhow;

        impl Clone for TaskError {
            fn clone(&self) -> Self {
                match self {
                    Self::NotFound => Self::NotFound,
                    Self::PortError(err) => Self::PortError(anyhow!(format!("{}", err))),
                }
            }
        }
    }

    #[allow(async_fn_in_trait)]
    pub trait TaskPort {
        async fn tasks_for_user(
            &self,
            user_id: Uuid,
            ext_cxn: &mut impl ExternalConnectivity,
            task_read: &impl TaskReader,
        ) -> Result<Vec<TodoTask>, TaskError>;
        async fn query_tasks(
            &self,
            user_id: Uuid,
            query: &TaskQuery,
            now: DateTime<Utc>,
            ext_cxn: &mut impl ExternalConnectivity,
            task_read: &impl TaskReader,
        ) -> Result<Vec<TodoTask>, TaskError>;
        async fn user_task_by_id(
            &self,
            user_id: Uuid,
            task_id: Uuid,
            ext_cxn: &mut impl ExternalConnectivity,
            task_read: &impl TaskReader,
        ) -> Result<Option<TodoTask>, TaskError>;
        async fn create_task_for_user(
            &self,
            user_id: Uuid,
            task: &NewTask,
            ext_cxn: &mut impl ExternalConnectivity,
            task_write: &impl TaskWriter,
        ) -> Result<Uuid, TaskError>;
        async fn update_task(
            &self,
            user_id: Uuid,
            task_id: Uuid,
            update: &UpdateTask,
            ext_cxn: &mut impl ExternalConnectivity,
            task_write: &impl TaskWriter,
        ) -> Result<(), TaskError>;
        async fn set_completed(
            &self,
            user_id: Uuid,
            task_id: Uuid,
            completed: bool,
            ext_cxn: &mut impl ExternalConnectivity,
            task_write: &impl TaskWriter,
        ) -> Result<(), TaskError>;
        async fn delete_task(
            &self,
            user_id: Uuid,
            task_id: Uuid,
            ext_cxn: &mut impl ExternalConnectivity,
            task_write: &impl TaskWriter,
        ) -> Result<(), TaskError>;
    }
}

/// Turns a "did this touch a row" answer from a writer into NotFound when nothing owned by the
/// user matched
fn require_touched(touched: bool, user_id: Uuid, task_id: Uuid) -> Result<(), TaskError> {
    if touched {
        Ok(())
    } else {
        warn!("Task {task_id} not found for user {user_id}");
        Err(TaskError::NotFound)
    }
}

pub struct TaskService {}

impl driving_ports::TaskPort for TaskService {
    async fn tasks_for_user(
        &self,
        user_id: Uuid,
        ext_cxn: &mut impl ExternalConnectivity,
        task_read: &impl TaskReader,
    ) -> Result<Vec<TodoTask>, TaskError> {
        let tasks = task_read
            .tasks_for_user(user_id, &mut *ext_cxn)
            .await
            .context("fetching a user's tasks")?;

        Ok(tasks)
    }

    async fn query_tasks(
        &self,
        user_id: Uuid,
        query: &TaskQuery,
        now: DateTime<Utc>,
        ext_cxn: &mut impl ExternalConnectivity,
        task_read: &impl TaskReader,
    ) -> Result<Vec<TodoTask>, TaskError> {
        let all_tasks = self.tasks_for_user(user_id, ext_cxn, task_read).await?;
        let visible_tasks: Vec<TodoTask> = task_view::apply_query(&all_tasks, query, now)
            .into_iter()
            .cloned()
            .collect();

        Ok(visible_tasks)
    }

    async fn user_task_by_id(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        ext_cxn: &mut impl ExternalConnectivity,
        task_read: &impl TaskReader,
    ) -> Result<Option<TodoTask>, TaskError> {
        let task = task_read
            .user_task_by_id(user_id, task_id, &mut *ext_cxn)
            .await
            .context("fetching a task by ID")?;

        Ok(task)
    }

    async fn create_task_for_user(
        &self,
        user_id: Uuid,
        task: &NewTask,
        ext_cxn: &mut impl ExternalConnectivity,
        task_write: &impl TaskWriter,
    ) -> Result<Uuid, TaskError> {
        let created_task_id = task_write
            .create_task_for_user(user_id, task, &mut *ext_cxn)
            .await
            .context("creating a task")?;
        info!("Created task {created_task_id} for user {user_id}");

        Ok(created_task_id)
    }

    async fn update_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        update: &UpdateTask,
        ext_cxn: &mut impl ExternalConnectivity,
        task_write: &impl TaskWriter,
    ) -> Result<(), TaskError> {
        let touched = task_write
            .update_task(user_id, task_id, update, &mut *ext_cxn)
            .await
            .context("updating a task")?;

        require_touched(touched, user_id, task_id)
    }

    async fn set_completed(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        completed: bool,
        ext_cxn: &mut impl ExternalConnectivity,
        task_write: &impl TaskWriter,
    ) -> Result<(), TaskError> {
        let touched = task_write
            .set_completed(user_id, task_id, completed, &mut *ext_cxn)
            .await
            .context("changing a task's completion")?;

        require_touched(touched, user_id, task_id)
    }

    async fn delete_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        ext_cxn: &mut impl ExternalConnectivity,
        task_write: &impl TaskWriter,
    ) -> Result<(), TaskError> {
        let touched = task_write
            .delete_task(user_id, task_id, &mut *ext_cxn)
            .await
            .context("deleting a task")?;

        require_touched(touched, user_id, task_id)
    }
}
