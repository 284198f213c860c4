use super::task::{Category, Priority};
use crate::domain::task_parser::{self, DATE_FORMAT, TIME_FORMAT};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// DTO for a free-text task the server should structure
#[derive(Debug, Deserialize, ToSchema)]
#[cfg_attr(test, derive(Serialize))]
pub struct ParseTaskRequest {
    #[schema(example = "내일 오전 10시에 팀 회의 준비")]
    pub input: String,
    /// The caller's current local time. Relative dates like "tomorrow" resolve against it.
    /// Defaults to the server's clock.
    #[schema(value_type = Option<String>, format = DateTime, example = "2024-01-01T09:00:00+09:00")]
    pub now: Option<DateTime<FixedOffset>>,
}

/// DTO for the structured fields extracted from free text. Nothing is saved; clients send these
/// fields to the create endpoint once the user confirms them.
#[derive(Debug, Serialize, ToSchema)]
pub struct ParsedTask {
    #[schema(example = "팀 회의 준비")]
    pub title: String,
    #[schema(example = "2024-01-02")]
    pub due_date: Option<String>,
    /// 24-hour time, only present together with a due date
    #[schema(example = "10:00")]
    pub due_time: Option<String>,
    /// The due date and time as an instant in the caller's offset
    #[schema(value_type = Option<String>, format = DateTime, example = "2024-01-02T01:00:00Z")]
    pub due_at: Option<DateTime<Utc>>,
    pub priority: Priority,
    /// Never empty
    pub category: Vec<Category>,
    pub description: Option<String>,
}

impl ParsedTask {
    pub fn from_domain(value: task_parser::ParsedTask, offset: FixedOffset) -> ParsedTask {
        let due_at = value.to_new_task(offset).due_at;

        ParsedTask {
            due_date: value.due_date.map(|date| date.format(DATE_FORMAT).to_string()),
            due_time: value.due_time.map(|time| time.format(TIME_FORMAT).to_string()),
            due_at,
            priority: value.priority.into(),
            category: value.category.into_iter().map(Into::into).collect(),
            title: value.title,
            description: value.description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::todo;
    use chrono::{NaiveDate, NaiveTime};
    use serde_json::json;
    use std::collections::BTreeSet;

    #[test]
    fn formats_date_and_time_for_the_wire() {
        let parsed = task_parser::ParsedTask {
            title: "팀 회의 준비".to_owned(),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 2),
            due_time: NaiveTime::from_hms_opt(10, 0, 0),
            priority: todo::Priority::Medium,
            category: BTreeSet::from([todo::Category::Work]),
            description: None,
        };
        let seoul = FixedOffset::east_opt(9 * 3600).unwrap();

        let body = serde_json::to_value(ParsedTask::from_domain(parsed, seoul)).expect("serializes");
        assert_eq!(
            json!({
                "title": "팀 회의 준비",
                "due_date": "2024-01-02",
                "due_time": "10:00",
                "due_at": "2024-01-02T01:00:00Z",
                "priority": "medium",
                "category": ["work"],
                "description": null
            }),
            body
        );
    }
}
