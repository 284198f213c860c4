use crate::domain::auth::driving_ports::AuthError;
use crate::domain::task_parser::ParseTaskError;
use crate::domain::todo::driving_ports::TaskError;
use axum::extract::FromRequestParts;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum_macros::{FromRequest, FromRequestParts};
use serde::Serialize;
use tracing::error;
use utoipa::openapi::{RefOr, Schema};
use utoipa::{ToResponse, ToSchema, openapi};
use validator::ValidationErrors;

/// Contains diagnostic information about an API failure
#[derive(Serialize, Debug, ToResponse)]
#[response(examples(
    ("Not Found" = (
        summary = "Task could not be found or belongs to someone else (404)",
        value = json!({
            "error_code": "not_found",
            "error": "The requested entity could not be found.",
            "extra_info": null
        })
    )),

    ("Unauthorized" = (
        summary = "Missing or invalid access token (401)",
        value = json!({
            "error_code": "unauthorized",
            "error": "A valid access token is required.",
            "extra_info": null
        })
    )),

    ("Email Not Confirmed" = (
        summary = "Sign in before the account's email was confirmed (403)",
        value = json!({
            "error_code": "email_not_confirmed",
            "error": "Please confirm your email address before signing in.",
            "extra_info": null
        })
    )),

    ("Internal Failure" = (
        summary = "Something unexpected went wrong inside the server (500)",
        value = json!({
            "error_code": "internal_error",
            "error": "Could not access data to complete your request",
            "extra_info": null
        })
    )),

    ("Invalid Input" = (
        summary = "Invalid request body was passed (400)",
        value = json!({
            "error_code": "invalid_input",
            "error": "Submitted data was invalid.",
            "extra_info": {
                "title": [
                    {
                        "code": "blank",
                        "message": null,
                        "params": { "value": "   " }
                    }
                ]
            }
        })
    )),

    ("Malformed JSON" = (
        summary = "Invalid JSON passed to server (400)",
        value = json!({
            "error_code": "invalid_json",
            "error": "The passed request body contained malformed or unreadable JSON.",
            "extra_info": "Failed to parse the request body as JSON: EOF while parsing an object at line 4 column 0"
        })
    ))
))]
pub struct BasicErrorResponse {
    pub error_code: String,
    pub error: String,
    pub extra_info: Option<ExtraInfo>,
}

impl BasicErrorResponse {
    fn new(error_code: &str, error: &str) -> BasicErrorResponse {
        BasicErrorResponse {
            error_code: error_code.to_owned(),
            error: error.to_owned(),
            extra_info: None,
        }
    }

    fn with_status(self, status: StatusCode) -> Response {
        (status, axum::Json(self)).into_response()
    }
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(untagged)]
pub enum ExtraInfo {
    ValidationIssues(ValidationErrorSchema),
    Message(String),
}

/// Stand-in OpenAPI schema for [ValidationErrors] which just provides an empty object
#[derive(Serialize, Debug)]
#[serde(transparent)]
pub struct ValidationErrorSchema(ValidationErrors);

impl<'schem> ToSchema<'schem> for ValidationErrorSchema {
    fn schema() -> (&'schem str, RefOr<Schema>) {
        (
            "ValidationErrorSchema",
            openapi::ObjectBuilder::new().into(),
        )
    }
}

/// Response type that wraps validation errors and turns them into [BasicErrorResponse]s
pub struct ValidationErrorResponse(ValidationErrors);

impl IntoResponse for ValidationErrorResponse {
    fn into_response(self) -> Response {
        BasicErrorResponse {
            error_code: "invalid_input".into(),
            error: "Submitted data was invalid.".to_owned(),
            extra_info: Some(ExtraInfo::ValidationIssues(ValidationErrorSchema(self.0))),
        }
        .with_status(StatusCode::BAD_REQUEST)
    }
}

impl From<ValidationErrors> for ValidationErrorResponse {
    fn from(value: ValidationErrors) -> Self {
        Self(value)
    }
}

/// Wrapper for [axum::Json] which customizes the error response to use our
/// data structure for API errors
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(JsonErrorResponse))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Response type representing JSON parse errors
pub struct JsonErrorResponse {
    parse_problem: String,
}

impl From<JsonRejection> for JsonErrorResponse {
    fn from(value: JsonRejection) -> Self {
        JsonErrorResponse {
            parse_problem: value.body_text(),
        }
    }
}

impl IntoResponse for JsonErrorResponse {
    fn into_response(self) -> Response {
        BasicErrorResponse {
            error_code: "invalid_json".into(),
            error: "The passed request body contained malformed or unreadable JSON.".into(),
            extra_info: Some(ExtraInfo::Message(self.parse_problem)),
        }
        .with_status(StatusCode::BAD_REQUEST)
    }
}

/// Wrapper for [axum::extract::Query] reporting unparseable query strings with our error body
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(QueryErrorResponse))]
pub struct Query<T>(pub T);

pub struct QueryErrorResponse {
    parse_problem: String,
}

impl From<QueryRejection> for QueryErrorResponse {
    fn from(value: QueryRejection) -> Self {
        QueryErrorResponse {
            parse_problem: value.body_text(),
        }
    }
}

impl IntoResponse for QueryErrorResponse {
    fn into_response(self) -> Response {
        BasicErrorResponse {
            error_code: "invalid_query".into(),
            error: "The query string contained unknown or malformed parameters.".into(),
            extra_info: Some(ExtraInfo::Message(self.parse_problem)),
        }
        .with_status(StatusCode::BAD_REQUEST)
    }
}

/// Turns any unexpected failure into a 500 without leaking its details to the caller
pub struct GenericErrorResponse(pub anyhow::Error);

impl IntoResponse for GenericErrorResponse {
    fn into_response(self) -> Response {
        error!("Request failed: {:#}", self.0);
        BasicErrorResponse::new(
            "internal_error",
            "Could not access data to complete your request",
        )
        .with_status(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

pub struct NotFoundResponse;

impl IntoResponse for NotFoundResponse {
    fn into_response(self) -> Response {
        BasicErrorResponse::new("not_found", "The requested entity could not be found.")
            .with_status(StatusCode::NOT_FOUND)
    }
}

pub struct UnauthorizedResponse;

impl IntoResponse for UnauthorizedResponse {
    fn into_response(self) -> Response {
        BasicErrorResponse::new("unauthorized", AuthError::Unauthenticated.user_message())
            .with_status(StatusCode::UNAUTHORIZED)
    }
}

/// Task failures: not owned or missing becomes a 404, everything else a 500
pub struct TaskErrorResponse(pub TaskError);

impl IntoResponse for TaskErrorResponse {
    fn into_response(self) -> Response {
        match self.0 {
            TaskError::NotFound => NotFoundResponse.into_response(),
            TaskError::PortError(cause) => GenericErrorResponse(cause).into_response(),
        }
    }
}

impl From<TaskError> for TaskErrorResponse {
    fn from(value: TaskError) -> Self {
        Self(value)
    }
}

/// Sign up / sign in failures, reported with a fixed message per reason
pub struct AuthErrorResponse(pub AuthError);

impl IntoResponse for AuthErrorResponse {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self.0 {
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            AuthError::EmailNotConfirmed => (StatusCode::FORBIDDEN, "email_not_confirmed"),
            AuthError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            AuthError::AlreadyRegistered => (StatusCode::CONFLICT, "already_registered"),
            AuthError::WeakPassword => (StatusCode::BAD_REQUEST, "weak_password"),
            AuthError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AuthError::PortError(cause) => {
                error!("Identity provider failure: {cause:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };

        BasicErrorResponse::new(error_code, self.0.user_message()).with_status(status)
    }
}

impl From<AuthError> for AuthErrorResponse {
    fn from(value: AuthError) -> Self {
        Self(value)
    }
}

/// Free-text parsing failures. Model problems are reported generically.
pub struct ParseErrorResponse(pub ParseTaskError);

impl IntoResponse for ParseErrorResponse {
    fn into_response(self) -> Response {
        match self.0 {
            ParseTaskError::EmptyInput => {
                BasicErrorResponse::new("invalid_input", "Please describe the task to parse.")
                    .with_status(StatusCode::BAD_REQUEST)
            }
            ParseTaskError::MissingCredential => BasicErrorResponse::new(
                "missing_credential",
                "Task parsing is not configured on this server.",
            )
            .with_status(StatusCode::INTERNAL_SERVER_ERROR),
            ParseTaskError::ModelFailure(_) | ParseTaskError::InvalidModelOutput(_) => {
                BasicErrorResponse::new("model_failure", "Failed to parse the task. Please try again.")
                    .with_status(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl From<ParseTaskError> for ParseErrorResponse {
    fn from(value: ParseTaskError) -> Self {
        Self(value)
    }
}

/// Access token taken from an `Authorization: Bearer <token>` header
#[derive(Debug)]
pub struct BearerToken(pub String);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = UnauthorizedResponse;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(UnauthorizedResponse)?;
        let (scheme, token) = header.split_once(' ').ok_or(UnauthorizedResponse)?;
        let token = token.trim();
        if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
            return Err(UnauthorizedResponse);
        }

        Ok(BearerToken(token.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_util::{ErrorBody, deserialize_body};
    use anyhow::anyhow;
    use axum::http::Request;

    async fn extract_token(header: Option<&str>) -> Result<BearerToken, UnauthorizedResponse> {
        let mut request = Request::builder().uri("/tasks");
        if let Some(value) = header {
            request = request.header(AUTHORIZATION, value);
        }
        let (mut parts, _) = request.body(()).expect("request builds").into_parts();

        BearerToken::from_request_parts(&mut parts, &()).await
    }

    mod bearer_token {
        use super::*;

        #[tokio::test]
        async fn accepts_bearer_scheme_case_insensitively() {
            let token = extract_token(Some("bearer abc.def")).await;
            assert!(matches!(token, Ok(BearerToken(value)) if value == "abc.def"));
        }

        #[tokio::test]
        async fn rejects_missing_header() {
            let response = extract_token(None).await.map(|_| ()).into_response();
            assert_eq!(StatusCode::UNAUTHORIZED, response.status());

            let body: ErrorBody = deserialize_body(response.into_body()).await;
            assert_eq!("unauthorized", body.error_code);
        }

        #[tokio::test]
        async fn rejects_other_schemes_and_empty_tokens() {
            assert!(extract_token(Some("Basic dXNlcjpwYXNz")).await.is_err());
            assert!(extract_token(Some("Bearer   ")).await.is_err());
            assert!(extract_token(Some("Bearer")).await.is_err());
        }
    }

    #[tokio::test]
    async fn task_errors_map_to_404_and_500() {
        let not_found = TaskErrorResponse(TaskError::NotFound).into_response();
        let failure = TaskErrorResponse(TaskError::PortError(anyhow!("db down"))).into_response();

        assert_eq!(StatusCode::NOT_FOUND, not_found.status());
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, failure.status());
        let body: ErrorBody = deserialize_body(failure.into_body()).await;
        assert_eq!("Could not access data to complete your request", body.error);
    }

    #[tokio::test]
    async fn auth_errors_carry_fixed_messages() {
        let response = AuthErrorResponse(AuthError::EmailNotConfirmed).into_response();
        assert_eq!(StatusCode::FORBIDDEN, response.status());

        let body: ErrorBody = deserialize_body(response.into_body()).await;
        assert_eq!("email_not_confirmed", body.error_code);
        assert_eq!(AuthError::EmailNotConfirmed.user_message(), body.error);
    }

    #[tokio::test]
    async fn model_failures_are_reported_generically() {
        let response = ParseErrorResponse(ParseTaskError::InvalidModelOutput(
            "due_date \"soon\" is not YYYY-MM-DD".to_owned(),
        ))
        .into_response();
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, response.status());

        let body: ErrorBody = deserialize_body(response.into_body()).await;
        assert_eq!("Failed to parse the task. Please try again.", body.error);
    }
}
