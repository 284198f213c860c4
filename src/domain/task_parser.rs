//! Turns a free-text task description into structured task fields with the help of a
//! generative model.
//!
//! The model receives a fixed instruction template and a response schema. Its answer is then
//! validated and normalized here, so the scheduling defaults and the keyword rules hold even
//! when the model drifts from its instructions.

use crate::domain::task_parser::driven_ports::{GenerationRequest, GenerativeModel, ModelError};
use crate::domain::todo::{Category, NewTask, Priority};
use crate::external_connections::ExternalConnectivity;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{error, info, warn};

/// Wire format of [ParsedTask::due_date]
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Wire format of [ParsedTask::due_time]
pub const TIME_FORMAT: &str = "%H:%M";

/// Time used when the text names a day but no time of day
pub fn default_due_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTask {
    pub title: String,
    pub due_date: Option<NaiveDate>,
    /// Only ever present together with [Self::due_date]
    pub due_time: Option<NaiveTime>,
    pub priority: Priority,
    /// Never empty
    pub category: BTreeSet<Category>,
    pub description: Option<String>,
}

impl ParsedTask {
    /// Builds the create payload a form would be pre-filled with, reading the due date and
    /// time as local time at `offset`
    pub fn to_new_task(&self, offset: FixedOffset) -> NewTask {
        let due_at = self.due_date.and_then(|date| {
            let local = date.and_time(self.due_time.unwrap_or_else(default_due_time));
            offset
                .from_local_datetime(&local)
                .single()
                .map(|moment| moment.with_timezone(&Utc))
        });

        NewTask {
            title: self.title.clone(),
            description: self.description.clone(),
            due_at,
            priority: self.priority,
            category: self.category.clone(),
        }
    }
}

/// Keyword vocabularies shared by the prompt and by the post-processing of the model output
pub mod keywords {
    use super::*;

    pub const URGENT: &[&str] = &[
        "urgent", "asap", "important", "immediately", "긴급", "급함", "급한", "중요", "빨리", "당장",
    ];
    pub const DEFERRABLE: &[&str] = &[
        "later", "no rush", "someday", "whenever", "나중에", "천천히", "여유", "언젠가",
    ];
    pub const WORK: &[&str] = &[
        "meeting", "report", "project", "client", "presentation", "office", "team", "회의", "업무",
        "보고서", "프로젝트", "회사", "팀", "미팅", "출근", "거래처", "결재",
    ];
    pub const PERSONAL: &[&str] = &[
        "exercise", "workout", "gym", "hospital", "doctor", "dentist", "friend", "family",
        "groceries", "shopping", "laundry", "birthday", "운동", "병원", "친구", "가족", "장보기",
        "청소", "빨래", "약속", "생일", "쇼핑",
    ];
    pub const STUDY: &[&str] = &[
        "study", "exam", "homework", "assignment", "lecture", "course", "공부", "시험", "과제",
        "강의", "수업", "독서", "복습", "예습",
    ];

    /// Words that cancel an English keyword right after them ("not urgent", "isn't important")
    const NEGATIONS: &[&str] = &["not", "no", "never", "t"];

    fn words_of(lowered: &str) -> Vec<&str> {
        lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .collect()
    }

    /// Exact word or its plural ("exams", "classes")
    fn same_word(token: &str, keyword: &str) -> bool {
        token == keyword
            || token.strip_suffix('s').is_some_and(|stem| {
                stem == keyword || stem.strip_suffix('e') == Some(keyword)
            })
    }

    /// English keywords match whole words and phrases only. Korean keywords attach to particles
    /// and endings (회의를, 급함), so they match anywhere in the text.
    fn mentions(lowered: &str, words: &[&str], keyword: &str) -> bool {
        if !keyword.is_ascii() {
            return lowered.contains(keyword);
        }

        let phrase: Vec<&str> = keyword.split(' ').collect();
        let last = phrase.len() - 1;
        words
            .windows(phrase.len())
            .enumerate()
            .any(|(start, window)| {
                let matched = window
                    .iter()
                    .zip(&phrase)
                    .enumerate()
                    .all(|(idx, (token, part))| {
                        if idx == last {
                            same_word(token, part)
                        } else {
                            token == part
                        }
                    });
                let negated = start > 0
                    && NEGATIONS.iter().any(|negation| *negation == words[start - 1]);

                matched && !negated
            })
    }

    fn mentions_any(input: &str, keywords: &[&str]) -> bool {
        let lowered = input.to_lowercase();
        let words = words_of(&lowered);
        keywords
            .iter()
            .any(|keyword| mentions(&lowered, &words, keyword))
    }

    /// Priority forced by urgency or deferral words. Urgency wins when both appear.
    pub fn keyword_priority(input: &str) -> Option<Priority> {
        if mentions_any(input, URGENT) {
            Some(Priority::High)
        } else if mentions_any(input, DEFERRABLE) {
            Some(Priority::Low)
        } else {
            None
        }
    }

    /// Every category whose vocabulary the input mentions
    pub fn keyword_categories(input: &str) -> BTreeSet<Category> {
        [
            (Category::Work, WORK),
            (Category::Personal, PERSONAL),
            (Category::Study, STUDY),
        ]
        .into_iter()
        .filter(|(_, words)| mentions_any(input, words))
        .map(|(category, _)| category)
        .collect()
    }
}

/// Renders the instruction template for one parse request
pub fn build_prompt(input: &str, now: NaiveDateTime) -> String {
    format!(
        "You convert a to-do item written in natural language into structured fields.\n\
         Today is {today} ({weekday}) and the current time is {time}.\n\
         \n\
         Rules:\n\
         - title: the concise core of the task. Put any remaining context in description, never in title.\n\
         - due_date: YYYY-MM-DD. Resolve relative expressions such as \"tomorrow\", \"in 3 days\", \
         \"next week\", \"내일\", \"모레\" or \"다음 주\" against today's date.\n\
         - due_time: 24-hour HH:MM. If a date is given without a time, use 09:00. \
         If neither a date nor a time is given, omit both.\n\
         - priority: \"high\" if the text contains urgency words ({urgent}); \
         \"low\" if it contains deferral words ({deferrable}); otherwise \"medium\".\n\
         - category: every category that applies, at least one. \
         \"work\" for work terms ({work}); \"personal\" for home, social or health terms ({personal}); \
         \"study\" for learning terms ({study}). Include all categories that match.\n\
         - description: extra context that does not belong in the title, or omit it.\n\
         \n\
         Task text: {input}",
        today = now.format(DATE_FORMAT),
        weekday = now.format("%A"),
        time = now.format(TIME_FORMAT),
        urgent = keywords::URGENT.join(", "),
        deferrable = keywords::DEFERRABLE.join(", "),
        work = keywords::WORK.join(", "),
        personal = keywords::PERSONAL.join(", "),
        study = keywords::STUDY.join(", "),
        input = input,
    )
}

/// Structured-output schema the model must answer with
pub fn response_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING", "description": "Concise core of the task" },
            "due_date": { "type": "STRING", "description": "YYYY-MM-DD", "nullable": true },
            "due_time": { "type": "STRING", "description": "24-hour HH:MM", "nullable": true },
            "priority": { "type": "STRING", "enum": ["high", "medium", "low"] },
            "category": {
                "type": "ARRAY",
                "items": { "type": "STRING", "enum": ["work", "personal", "study"] },
                "minItems": 1
            },
            "description": { "type": "STRING", "nullable": true }
        },
        "required": ["title", "priority", "category"],
        "propertyOrdering": ["title", "due_date", "due_time", "priority", "category", "description"]
    })
}

/// The model's answer before validation. Everything is optional so that a drifting model
/// produces a precise error instead of a generic deserialization failure.
#[derive(Debug, Deserialize)]
struct ModelTaskOutput {
    title: Option<String>,
    due_date: Option<String>,
    due_time: Option<String>,
    priority: Option<String>,
    category: Option<Vec<String>>,
    description: Option<String>,
}

/// Models sometimes wrap JSON in a markdown code fence despite the response MIME type
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);

    unfenced.strip_suffix("```").unwrap_or(unfenced).trim()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

fn parse_due_date(raw: &str) -> Result<NaiveDate, ParseTaskError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| ParseTaskError::InvalidModelOutput(format!("due_date {raw:?} is not YYYY-MM-DD")))
}

fn parse_due_time(raw: &str) -> Result<NaiveTime, ParseTaskError> {
    NaiveTime::parse_from_str(raw, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| ParseTaskError::InvalidModelOutput(format!("due_time {raw:?} is not HH:MM")))
}

/// Validates the model output and enforces the scheduling and keyword rules against the
/// original input text
fn normalize(raw: ModelTaskOutput, input: &str) -> Result<ParsedTask, ParseTaskError> {
    let title = non_blank(raw.title)
        .ok_or_else(|| ParseTaskError::InvalidModelOutput("the title is missing".to_owned()))?;

    let due_date = non_blank(raw.due_date)
        .as_deref()
        .map(parse_due_date)
        .transpose()?;
    let due_time = non_blank(raw.due_time)
        .as_deref()
        .map(parse_due_time)
        .transpose()?;
    let due_time = match (due_date, due_time) {
        (Some(_), Some(time)) => Some(time),
        (Some(_), None) => Some(default_due_time()),
        (None, _) => None,
    };

    let priority = keywords::keyword_priority(input).unwrap_or_else(|| {
        non_blank(raw.priority)
            .map(|label| {
                label.parse::<Priority>().unwrap_or_else(|err| {
                    warn!("Model returned an unknown priority, using medium: {err}");
                    Priority::Medium
                })
            })
            .unwrap_or_default()
    });

    let mut category: BTreeSet<Category> = raw
        .category
        .unwrap_or_default()
        .iter()
        .filter_map(|label| match label.parse::<Category>() {
            Ok(category) => Some(category),
            Err(err) => {
                warn!("Ignoring category from the model: {err}");
                None
            }
        })
        .collect();
    category.extend(keywords::keyword_categories(input));
    if category.is_empty() {
        category.insert(Category::Personal);
    }

    Ok(ParsedTask {
        title,
        due_date,
        due_time,
        priority,
        category,
        description: non_blank(raw.description),
    })
}

pub mod driven_ports {
    use super::*;

    /// One structured-output generation call
    pub struct GenerationRequest<'a> {
        pub prompt: &'a str,
        pub response_schema: &'a serde_json::Value,
    }

    #[derive(Debug, Error)]
    pub enum ModelError {
        #[error("no API key is configured for the generative model")]
        MissingCredential,
        #[error("model {model} is not available: {cause}")]
        ModelUnavailable {
            model: String,
            #[source]
            cause: anyhow::Error,
        },
        #[error(transparent)]
        CommsFailure(#[from] anyhow::Error),
    }

    #[allow(async_fn_in_trait)]
    pub trait GenerativeModel {
        /// Returns the raw JSON text the model produced for the request
        async fn generate_json(
            &self,
            request: &GenerationRequest<'_>,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<String, ModelError>;

        /// Names of the models the provider currently offers
        async fn available_models(
            &self,
            ext_cxn: &mut impl ExternalConnectivity,
        ) -> Result<Vec<String>, anyhow::Error>;
    }
}

#[derive(Debug, Error)]
pub enum ParseTaskError {
    #[error("no task text was provided")]
    EmptyInput,
    #[error("the generative model credential is not configured")]
    MissingCredential,
    #[error("the generative model call failed: {0}")]
    ModelFailure(#[source] anyhow::Error),
    #[error("the model returned an unusable task: {0}")]
    InvalidModelOutput(String),
}


pub mod driving_ports {
    use super::*;

    #[allow(async_fn_in_trait)]
    pub trait TaskParsePort {
        /// Parses `input` relative to the caller's local `now`. Nothing is persisted.
        async fn parse_task(
            &self,
            input: &str,
            now: NaiveDateTime,
            ext_cxn: &mut impl ExternalConnectivity,
            model: &impl GenerativeModel,
        ) -> Result<ParsedTask, ParseTaskError>;
    }
}

pub struct TaskParseService {}

/// Logs what the provider offers so a misconfigured model name can be fixed. Diagnostics only.
async fn log_available_models(
    model: &impl GenerativeModel,
    ext_cxn: &mut impl ExternalConnectivity,
) {
    match model.available_models(ext_cxn).await {
        Ok(names) => info!(available_models = ?names, "Models currently offered by the provider"),
        Err(err) => warn!("Could not list available models: {err:#}"),
    }
}

impl driving_ports::TaskParsePort for TaskParseService {
    async fn parse_task(
        &self,
        input: &str,
        now: NaiveDateTime,
        ext_cxn: &mut impl ExternalConnectivity,
        model: &impl GenerativeModel,
    ) -> Result<ParsedTask, ParseTaskError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseTaskError::EmptyInput);
        }

        let prompt = build_prompt(input, now);
        let schema = response_schema();
        let request = GenerationRequest {
            prompt: &prompt,
            response_schema: &schema,
        };

        let raw_text = match model.generate_json(&request, &mut *ext_cxn).await {
            Ok(text) => text,
            Err(ModelError::MissingCredential) => {
                error!("Task parsing requested but no model credential is configured");
                return Err(ParseTaskError::MissingCredential);
            }
            Err(ModelError::ModelUnavailable {
                model: model_name,
                cause,
            }) => {
                error!("Configured model {model_name} is unavailable: {cause:#}");
                log_available_models(model, &mut *ext_cxn).await;
                return Err(ParseTaskError::ModelFailure(cause));
            }
            Err(ModelError::CommsFailure(err)) => {
                error!("Model call failed: {err:#}");
                return Err(ParseTaskError::ModelFailure(err));
            }
        };

        let raw_output: ModelTaskOutput = serde_json::from_str(strip_code_fences(&raw_text))
            .map_err(|err| {
                error!("Model answered with unparseable JSON ({err}): {raw_text}");
                ParseTaskError::InvalidModelOutput(err.to_string())
            })?;

        let parsed = normalize(raw_output, input)?;
        info!(
            priority = %parsed.priority,
            has_due_date = parsed.due_date.is_some(),
            "Parsed a task from free text"
        );

        Ok(parsed)
    }
}

/// Local wall-clock time used when a caller doesn't say what time it is for them
pub fn local_now(caller_now: Option<DateTime<FixedOffset>>) -> NaiveDateTime {
    caller_now
        .map(|moment| moment.naive_local())
        .unwrap_or_else(|| chrono::Local::now().naive_local())
}
