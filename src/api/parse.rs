use crate::api::auth::resolve_owner;
use crate::domain::task_parser::driven_ports::GenerativeModel;
use crate::domain::task_parser::driving_ports::TaskParsePort;
use crate::domain::task_parser::local_now;
use crate::external_connections::ExternalConnectivity;
use crate::routing_utils::{BasicErrorResponse, BearerToken, Json, ParseErrorResponse};
use crate::{AppState, SharedData, domain, dto};
use axum::Router;
use axum::extract::State;
use axum::response::ErrorResponse;
use axum::routing::post;
use chrono::Local;
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(paths(parse_task))]
/// Defines the OpenAPI documentation for natural-language task parsing
pub struct ParseApi;

/// Routes for turning free text into task fields. Mounted under "/tasks" next to the task routes.
pub fn parse_routes() -> Router<Arc<SharedData>> {
    Router::new().route(
        "/parse",
        post(
            |State(app_state): AppState,
             BearerToken(token): BearerToken,
             Json(request): Json<dto::ParseTaskRequest>| async move {
                let mut ext_cxn = app_state.ext_cxn.clone();
                let auth_service = domain::auth::AuthService {};
                let owner =
                    resolve_owner(&token, &mut ext_cxn, &auth_service, &app_state.auth_provider)
                        .await?;
                info!("Parsing task text for user {owner}");

                parse_task(
                    request,
                    &mut ext_cxn,
                    &domain::task_parser::TaskParseService {},
                    &app_state.task_model,
                )
                .await
            },
        ),
    )
}

#[utoipa::path(
    post,
    path = "/tasks/parse",
    tag = super::todo::TASK_API_GROUP,
    request_body = dto::ParseTaskRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Fields extracted from the text. Nothing is saved.", body = dto::ParsedTask),
        (status = 400, response = BasicErrorResponse),
        (status = 401, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Extracts a title, due date and time, priority and categories from a free-text description
async fn parse_task(
    request: dto::ParseTaskRequest,
    ext_cxn: &mut impl ExternalConnectivity,
    parse_service: &impl TaskParsePort,
    model: &impl GenerativeModel,
) -> Result<Json<dto::ParsedTask>, ErrorResponse> {
    let offset = request
        .now
        .map(|moment| *moment.offset())
        .unwrap_or_else(|| *Local::now().offset());

    let parsed = parse_service
        .parse_task(&request.input, local_now(request.now), &mut *ext_cxn, model)
        .await
        .map_err(ParseErrorResponse::from)?;

    Ok(Json(dto::ParsedTask::from_domain(parsed, offset)))
}
