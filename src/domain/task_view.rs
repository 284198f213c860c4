//! Filtering, searching and ordering of a user's task list. Everything here is evaluated
//! against a caller-supplied "now" so a task's status is always computed fresh.

use crate::domain::todo::{Priority, TodoTask};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// The single status bucket a task falls into at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    InProgress,
    Completed,
    Overdue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(TaskStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// High first, tasks without a priority last
    Priority,
    /// Earliest due first, undated tasks last
    DueDate,
    /// Newest first
    #[default]
    CreatedAt,
    Title,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskQuery {
    /// Case-insensitive substring of the title. Blank searches match everything.
    pub search: Option<String>,
    pub status: StatusFilter,
    /// When set, only tasks with exactly this priority match
    pub priority: Option<Priority>,
    pub sort: SortKey,
}

/// Completed wins; otherwise a task is overdue only if it has a due date in the past.
pub fn status_of(task: &TodoTask, now: DateTime<Utc>) -> TaskStatus {
    if task.completed {
        return TaskStatus::Completed;
    }

    match task.due_at {
        Some(due_at) if due_at < now => TaskStatus::Overdue,
        _ => TaskStatus::InProgress,
    }
}

fn matches_search(task: &TodoTask, needle: &str) -> bool {
    task.title.to_lowercase().contains(needle)
}

fn matches_status(task: &TodoTask, filter: StatusFilter, now: DateTime<Utc>) -> bool {
    match filter {
        StatusFilter::All => true,
        StatusFilter::Only(status) => status_of(task, now) == status,
    }
}

fn matches_priority(task: &TodoTask, filter: Option<Priority>) -> bool {
    match filter {
        None => true,
        Some(wanted) => task.priority == Some(wanted),
    }
}

/// Sorts `None` after every `Some`, comparing the `Some`s with [Ord]
fn none_last<T: Ord>(left: &Option<T>, right: &Option<T>) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => left.cmp(right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Ordinal (code point) order of the lowercased titles, not a locale collation. Titles equal
/// apart from case fall back to their ordinal order, so the sort stays total.
fn compare_titles(left: &str, right: &str) -> Ordering {
    left.to_lowercase()
        .cmp(&right.to_lowercase())
        .then_with(|| left.cmp(right))
}

fn compare(left: &TodoTask, right: &TodoTask, sort: SortKey) -> Ordering {
    match sort {
        SortKey::Priority => none_last(&left.priority, &right.priority),
        SortKey::DueDate => none_last(&left.due_at, &right.due_at),
        SortKey::CreatedAt => right.created_at.cmp(&left.created_at),
        SortKey::Title => compare_titles(&left.title, &right.title),
    }
}

/// Applies search, status and priority filters (all must match) and then sorts the survivors.
pub fn apply_query<'tasks>(
    tasks: &'tasks [TodoTask],
    query: &TaskQuery,
    now: DateTime<Utc>,
) -> Vec<&'tasks TodoTask> {
    let needle = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|search| !search.is_empty())
        .map(str::to_lowercase);

    let mut visible: Vec<&TodoTask> = tasks
        .iter()
        .filter(|task| needle.as_deref().is_none_or(|needle| matches_search(task, needle)))
        .filter(|task| matches_status(task, query.status, now))
        .filter(|task| matches_priority(task, query.priority))
        .collect();
    visible.sort_by(|left, right| compare(left, right, query.sort));

    visible
}
