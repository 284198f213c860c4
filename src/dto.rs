mod auth;
mod parse;
mod task;

pub use auth::*;
pub use parse::*;
pub use task::*;

use crate::routing_utils::{BasicErrorResponse, ExtraInfo, ValidationErrorSchema};
use utoipa::OpenApi;
use validator::ValidationError;

/// Registers the DTOs shared across API groups as OpenAPI components
#[derive(OpenApi)]
#[openapi(
    components(
        schemas(
            Priority,
            Category,
            TaskStatus,
            StatusFilter,
            SortKey,
            NewTask,
            UpdateTask,
            CompletionUpdate,
            TodoTask,
            InsertedTask,
            ParseTaskRequest,
            ParsedTask,
            Credentials,
            Session,
            ConfirmationPending,
            ExtraInfo,
            ValidationErrorSchema,
        ),
        responses(BasicErrorResponse),
    ),
)]
pub struct OpenApiSchemas;

/// Rejects strings that are empty once surrounding whitespace is removed
fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }

    Ok(())
}
