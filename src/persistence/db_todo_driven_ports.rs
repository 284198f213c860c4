use crate::domain;
use crate::domain::todo::{Category, NewTask, Priority, TodoTask, UpdateTask};
use crate::external_connections::{ConnectionHandle, ExternalConnectivity};
use anyhow::{Context, Error};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, query, query_as, query_scalar};
use std::collections::BTreeSet;
use uuid::Uuid;

const TASK_COLUMNS: &str =
    "id, user_id, title, description, created_at, due_at, priority, category, completed";

pub struct DbTaskReader;

#[derive(FromRow)]
struct TodoItemRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    due_at: Option<DateTime<Utc>>,
    priority: Option<String>,
    category: Vec<String>,
    completed: bool,
}

impl TryFrom<TodoItemRow> for domain::todo::TodoTask {
    type Error = anyhow::Error;

    fn try_from(value: TodoItemRow) -> Result<Self, Self::Error> {
        let priority = value
            .priority
            .as_deref()
            .map(str::parse::<Priority>)
            .transpose()
            .with_context(|| format!("reading the priority of task {}", value.id))?;
        let category = value
            .category
            .iter()
            .map(|label| label.parse::<Category>())
            .collect::<Result<BTreeSet<_>, _>>()
            .with_context(|| format!("reading the categories of task {}", value.id))?;

        Ok(TodoTask {
            id: value.id,
            owner_user_id: value.user_id,
            title: value.title,
            description: value.description,
            created_at: value.created_at,
            due_at: value.due_at,
            priority,
            category,
            completed: value.completed,
        })
    }
}

/// Canonical (deduplicated, ordered) storage form of a category set
fn category_labels(category: &BTreeSet<Category>) -> Vec<String> {
    category.iter().map(ToString::to_string).collect()
}

impl domain::todo::driven_ports::TaskReader for DbTaskReader {
    async fn tasks_for_user(
        &self,
        user_id: Uuid,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Vec<TodoTask>, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let rows: Vec<TodoItemRow> = query_as(&format!(
            "SELECT {TASK_COLUMNS} FROM todos WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(cxn.borrow_connection())
        .await
        .context("trying to fetch todo items for a user")?;

        rows.into_iter().map(TodoTask::try_from).collect()
    }

    async fn user_task_by_id(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Option<TodoTask>, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let row: Option<TodoItemRow> = query_as(&format!(
            "SELECT {TASK_COLUMNS} FROM todos WHERE user_id = $1 AND id = $2"
        ))
        .bind(user_id)
        .bind(task_id)
        .fetch_optional(cxn.borrow_connection())
        .await
        .context("trying to fetch a todo item by ID")?;

        row.map(TodoTask::try_from).transpose()
    }
}

pub struct DbTaskWriter;

impl domain::todo::driven_ports::TaskWriter for DbTaskWriter {
    async fn create_task_for_user(
        &self,
        user_id: Uuid,
        new_task: &NewTask,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<Uuid, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let new_id: Uuid = query_scalar(
            "INSERT INTO todos (user_id, title, description, due_at, priority, category) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(user_id)
        .bind(&new_task.title)
        .bind(&new_task.description)
        .bind(new_task.due_at)
        .bind(new_task.priority.to_string())
        .bind(category_labels(&new_task.category))
        .fetch_one(cxn.borrow_connection())
        .await
        .context("trying to insert a new task into the database")?;

        Ok(new_id)
    }

    async fn update_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        update: &UpdateTask,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<bool, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let result = query(
            "UPDATE todos SET title = $3, description = $4, due_at = $5, priority = $6, category = $7 \
             WHERE user_id = $1 AND id = $2",
        )
        .bind(user_id)
        .bind(task_id)
        .bind(&update.title)
        .bind(&update.description)
        .bind(update.due_at)
        .bind(update.priority.to_string())
        .bind(category_labels(&update.category))
        .execute(cxn.borrow_connection())
        .await
        .context("trying to update a task in the database")?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_completed(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        completed: bool,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<bool, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let result = query("UPDATE todos SET completed = $3 WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(task_id)
            .bind(completed)
            .execute(cxn.borrow_connection())
            .await
            .context("trying to change a task's completion in the database")?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        ext_cxn: &mut impl ExternalConnectivity,
    ) -> Result<bool, Error> {
        let mut cxn = ext_cxn.database_cxn().await?;

        let result = query("DELETE FROM todos WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(task_id)
            .execute(cxn.borrow_connection())
            .await
            .context("trying to remove a task from the database")?;

        Ok(result.rows_affected() > 0)
    }
}
