use super::not_blank;
use crate::domain;
use crate::domain::task_view;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl From<Priority> for domain::todo::Priority {
    fn from(value: Priority) -> Self {
        match value {
            Priority::High => Self::High,
            Priority::Medium => Self::Medium,
            Priority::Low => Self::Low,
        }
    }
}

impl From<domain::todo::Priority> for Priority {
    fn from(value: domain::todo::Priority) -> Self {
        match value {
            domain::todo::Priority::High => Self::High,
            domain::todo::Priority::Medium => Self::Medium,
            domain::todo::Priority::Low => Self::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Work,
    Personal,
    Study,
}

impl From<Category> for domain::todo::Category {
    fn from(value: Category) -> Self {
        match value {
            Category::Work => Self::Work,
            Category::Personal => Self::Personal,
            Category::Study => Self::Study,
        }
    }
}

impl From<domain::todo::Category> for Category {
    fn from(value: domain::todo::Category) -> Self {
        match value {
            domain::todo::Category::Work => Self::Work,
            domain::todo::Category::Personal => Self::Personal,
            domain::todo::Category::Study => Self::Study,
        }
    }
}

/// Where a task stands at the time of the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    InProgress,
    Completed,
    Overdue,
}

impl From<task_view::TaskStatus> for TaskStatus {
    fn from(value: task_view::TaskStatus) -> Self {
        match value {
            task_view::TaskStatus::InProgress => Self::InProgress,
            task_view::TaskStatus::Completed => Self::Completed,
            task_view::TaskStatus::Overdue => Self::Overdue,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    InProgress,
    Completed,
    Overdue,
}

impl From<StatusFilter> for task_view::StatusFilter {
    fn from(value: StatusFilter) -> Self {
        match value {
            StatusFilter::All => Self::All,
            StatusFilter::InProgress => Self::Only(task_view::TaskStatus::InProgress),
            StatusFilter::Completed => Self::Only(task_view::TaskStatus::Completed),
            StatusFilter::Overdue => Self::Only(task_view::TaskStatus::Overdue),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Priority,
    DueDate,
    #[default]
    CreatedAt,
    Title,
}

impl From<SortKey> for task_view::SortKey {
    fn from(value: SortKey) -> Self {
        match value {
            SortKey::Priority => Self::Priority,
            SortKey::DueDate => Self::DueDate,
            SortKey::CreatedAt => Self::CreatedAt,
            SortKey::Title => Self::Title,
        }
    }
}

/// Query string of the task list endpoint. Every filter is optional and they combine with AND.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[cfg_attr(test, derive(Serialize))]
#[into_params(parameter_in = Query)]
pub struct TaskListQuery {
    /// Case-insensitive text the title must contain
    pub search: Option<String>,
    #[param(inline)]
    pub status: Option<StatusFilter>,
    #[param(inline)]
    pub priority: Option<Priority>,
    #[param(inline)]
    pub sort: Option<SortKey>,
}

impl From<TaskListQuery> for task_view::TaskQuery {
    fn from(value: TaskListQuery) -> Self {
        task_view::TaskQuery {
            search: value.search,
            status: value.status.unwrap_or_default().into(),
            priority: value.priority.map(Into::into),
            sort: value.sort.unwrap_or_default().into(),
        }
    }
}

fn trimmed_description(description: Option<String>) -> Option<String> {
    description
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

/// DTO for creating a new task via the API
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct NewTask {
    #[validate(custom = "not_blank", length(max = 200))]
    #[schema(example = "팀 회의 준비")]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[schema(value_type = Option<String>, format = DateTime, example = "2024-01-02T01:00:00Z")]
    pub due_at: Option<DateTime<Utc>>,
    /// Defaults to medium
    pub priority: Option<Priority>,
    #[serde(default)]
    pub category: Vec<Category>,
}

impl From<NewTask> for domain::todo::NewTask {
    fn from(value: NewTask) -> Self {
        domain::todo::NewTask {
            title: value.title.trim().to_owned(),
            description: trimmed_description(value.description),
            due_at: value.due_at,
            priority: value.priority.map(Into::into).unwrap_or_default(),
            category: value.category.into_iter().map(Into::into).collect(),
        }
    }
}

/// DTO for replacing the editable fields of a task via the API
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct UpdateTask {
    #[validate(custom = "not_blank", length(max = 200))]
    #[schema(example = "팀 회의 준비")]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[schema(value_type = Option<String>, format = DateTime, example = "2024-01-02T01:00:00Z")]
    pub due_at: Option<DateTime<Utc>>,
    /// Defaults to medium
    pub priority: Option<Priority>,
    #[serde(default)]
    pub category: Vec<Category>,
}

impl From<UpdateTask> for domain::todo::UpdateTask {
    fn from(value: UpdateTask) -> Self {
        domain::todo::UpdateTask {
            title: value.title.trim().to_owned(),
            description: trimmed_description(value.description),
            due_at: value.due_at,
            priority: value.priority.map(Into::into).unwrap_or_default(),
            category: value.category.into_iter().map(Into::into).collect(),
        }
    }
}

/// DTO for marking a task done or not done
#[derive(Debug, Deserialize, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct CompletionUpdate {
    pub completed: bool,
}

/// DTO for a returned task on the API
#[derive(Debug, Serialize, ToSchema)]
pub struct TodoTask {
    #[schema(value_type = String, example = "5d4a7f0e-2b1c-4c1e-9a43-0c1f7e6f9b11")]
    pub id: Uuid,
    #[schema(example = "팀 회의 준비")]
    pub title: String,
    pub description: Option<String>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub due_at: Option<DateTime<Utc>>,
    /// Absent on tasks created before priorities existed
    pub priority: Option<Priority>,
    pub category: Vec<Category>,
    pub completed: bool,
    pub status: TaskStatus,
}

impl TodoTask {
    /// Builds the API view of a task, computing its status at `now`
    pub fn from_domain(value: domain::todo::TodoTask, now: DateTime<Utc>) -> TodoTask {
        let status = task_view::status_of(&value, now).into();

        TodoTask {
            id: value.id,
            title: value.title,
            description: value.description,
            created_at: value.created_at,
            due_at: value.due_at,
            priority: value.priority.map(Into::into),
            category: value.category.into_iter().map(Into::into).collect(),
            completed: value.completed,
            status,
        }
    }
}

/// DTO for a newly created task
#[derive(Debug, Serialize, ToSchema)]
pub struct InsertedTask {
    #[schema(value_type = String, example = "5d4a7f0e-2b1c-4c1e-9a43-0c1f7e6f9b11")]
    pub id: Uuid,
}
