use crate::api::auth::resolve_owner;
use crate::domain::todo::driving_ports::TaskPort;
use crate::external_connections::ExternalConnectivity;
use crate::persistence::db_todo_driven_ports::{DbTaskReader, DbTaskWriter};
use crate::routing_utils::{
    BasicErrorResponse, BearerToken, Json, NotFoundResponse, Query, TaskErrorResponse,
    ValidationErrorResponse,
};
use crate::{AppState, SharedData, domain, dto};
use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::ErrorResponse;
use axum::routing::{get, post};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;
use validator::Validate;

#[derive(OpenApi)]
#[openapi(paths(list_tasks, get_task, create_task, update_task, set_completion, delete_task))]
/// Defines the OpenAPI documentation for the task API
pub struct TaskApi;
/// Constant used to group task endpoints in OpenAPI documentation
pub const TASK_API_GROUP: &str = "Tasks";

/// Creates a router for endpoints under the "/tasks" group of APIs. Every route resolves the
/// caller from their Bearer token and only ever touches that caller's tasks.
pub fn task_routes() -> Router<Arc<SharedData>> {
    Router::new()
        .route(
            "/",
            get(
                |State(app_state): AppState,
                 BearerToken(token): BearerToken,
                 Query(query): Query<dto::TaskListQuery>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let auth_service = domain::auth::AuthService {};
                    let owner =
                        resolve_owner(&token, &mut ext_cxn, &auth_service, &app_state.auth_provider)
                            .await?;

                    list_tasks(owner, query, &mut ext_cxn, &domain::todo::TaskService {}).await
                },
            )
            .post(
                |State(app_state): AppState,
                 BearerToken(token): BearerToken,
                 Json(new_task): Json<dto::NewTask>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let auth_service = domain::auth::AuthService {};
                    let owner =
                        resolve_owner(&token, &mut ext_cxn, &auth_service, &app_state.auth_provider)
                            .await?;

                    create_task(owner, new_task, &mut ext_cxn, &domain::todo::TaskService {}).await
                },
            ),
        )
        .route(
            "/:task_id",
            get(
                |State(app_state): AppState,
                 BearerToken(token): BearerToken,
                 Path(task_id): Path<Uuid>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let auth_service = domain::auth::AuthService {};
                    let owner =
                        resolve_owner(&token, &mut ext_cxn, &auth_service, &app_state.auth_provider)
                            .await?;

                    get_task(owner, task_id, &mut ext_cxn, &domain::todo::TaskService {}).await
                },
            )
            .patch(
                |State(app_state): AppState,
                 BearerToken(token): BearerToken,
                 Path(task_id): Path<Uuid>,
                 Json(update): Json<dto::UpdateTask>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let auth_service = domain::auth::AuthService {};
                    let owner =
                        resolve_owner(&token, &mut ext_cxn, &auth_service, &app_state.auth_provider)
                            .await?;

                    update_task(owner, task_id, update, &mut ext_cxn, &domain::todo::TaskService {})
                        .await
                },
            )
            .delete(
                |State(app_state): AppState,
                 BearerToken(token): BearerToken,
                 Path(task_id): Path<Uuid>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let auth_service = domain::auth::AuthService {};
                    let owner =
                        resolve_owner(&token, &mut ext_cxn, &auth_service, &app_state.auth_provider)
                            .await?;

                    delete_task(owner, task_id, &mut ext_cxn, &domain::todo::TaskService {}).await
                },
            ),
        )
        .route(
            "/:task_id/completion",
            post(
                |State(app_state): AppState,
                 BearerToken(token): BearerToken,
                 Path(task_id): Path<Uuid>,
                 Json(completion): Json<dto::CompletionUpdate>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let auth_service = domain::auth::AuthService {};
                    let owner =
                        resolve_owner(&token, &mut ext_cxn, &auth_service, &app_state.auth_provider)
                            .await?;

                    set_completion(
                        owner,
                        task_id,
                        completion,
                        &mut ext_cxn,
                        &domain::todo::TaskService {},
                    )
                    .await
                },
            ),
        )
}

#[utoipa::path(
    get,
    path = "/tasks",
    tag = TASK_API_GROUP,
    params(dto::TaskListQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The caller's tasks after filtering and sorting", body = Vec<dto::TodoTask>),
        (status = 400, response = BasicErrorResponse),
        (status = 401, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Lists the caller's tasks, filtered, searched and sorted as requested
async fn list_tasks(
    owner: Uuid,
    query: dto::TaskListQuery,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<Json<Vec<dto::TodoTask>>, ErrorResponse> {
    info!("Listing tasks for user {owner}");
    let now = Utc::now();

    let tasks = task_service
        .query_tasks(owner, &query.into(), now, &mut *ext_cxn, &DbTaskReader)
        .await
        .map_err(TaskErrorResponse::from)?;

    Ok(Json(
        tasks
            .into_iter()
            .map(|task| dto::TodoTask::from_domain(task, now))
            .collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/tasks/{task_id}",
    tag = TASK_API_GROUP,
    params(("task_id" = String, Path, description = "ID of the task")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The requested task", body = dto::TodoTask),
        (status = 401, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Retrieves one of the caller's tasks
async fn get_task(
    owner: Uuid,
    task_id: Uuid,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<Json<dto::TodoTask>, ErrorResponse> {
    info!("Get task {task_id} for user {owner}");

    let task = task_service
        .user_task_by_id(owner, task_id, &mut *ext_cxn, &DbTaskReader)
        .await
        .map_err(TaskErrorResponse::from)?
        .ok_or(NotFoundResponse)?;

    Ok(Json(dto::TodoTask::from_domain(task, Utc::now())))
}

#[utoipa::path(
    post,
    path = "/tasks",
    tag = TASK_API_GROUP,
    request_body = dto::NewTask,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Task created", body = dto::InsertedTask),
        (status = 400, response = BasicErrorResponse),
        (status = 401, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Adds a new task for the caller
async fn create_task(
    owner: Uuid,
    new_task: dto::NewTask,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<(StatusCode, Json<dto::InsertedTask>), ErrorResponse> {
    info!("Adding task for user {owner}");
    new_task.validate().map_err(ValidationErrorResponse::from)?;

    let id = task_service
        .create_task_for_user(owner, &new_task.into(), &mut *ext_cxn, &DbTaskWriter)
        .await
        .map_err(TaskErrorResponse::from)?;

    Ok((StatusCode::CREATED, Json(dto::InsertedTask { id })))
}

#[utoipa::path(
    patch,
    path = "/tasks/{task_id}",
    tag = TASK_API_GROUP,
    params(("task_id" = String, Path, description = "ID of the task")),
    request_body = dto::UpdateTask,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Task updated"),
        (status = 400, response = BasicErrorResponse),
        (status = 401, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Replaces the title, description, due date, priority and categories of a task
async fn update_task(
    owner: Uuid,
    task_id: Uuid,
    update: dto::UpdateTask,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<StatusCode, ErrorResponse> {
    info!("Updating task {task_id} for user {owner}");
    update.validate().map_err(ValidationErrorResponse::from)?;

    task_service
        .update_task(owner, task_id, &update.into(), &mut *ext_cxn, &DbTaskWriter)
        .await
        .map_err(TaskErrorResponse::from)?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/tasks/{task_id}/completion",
    tag = TASK_API_GROUP,
    params(("task_id" = String, Path, description = "ID of the task")),
    request_body = dto::CompletionUpdate,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Completion updated"),
        (status = 401, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Marks a task done or not done
async fn set_completion(
    owner: Uuid,
    task_id: Uuid,
    completion: dto::CompletionUpdate,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<StatusCode, ErrorResponse> {
    info!(
        "Setting completion of task {task_id} for user {owner} to {}",
        completion.completed
    );

    task_service
        .set_completed(owner, task_id, completion.completed, &mut *ext_cxn, &DbTaskWriter)
        .await
        .map_err(TaskErrorResponse::from)?;

    Ok(StatusCode::OK)
}

#[utoipa::path(
    delete,
    path = "/tasks/{task_id}",
    tag = TASK_API_GROUP,
    params(("task_id" = String, Path, description = "ID of the task")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Task deleted"),
        (status = 401, response = BasicErrorResponse),
        (status = 404, response = BasicErrorResponse),
        (status = 500, response = BasicErrorResponse),
    ),
)]
/// Deletes a task
async fn delete_task(
    owner: Uuid,
    task_id: Uuid,
    ext_cxn: &mut impl ExternalConnectivity,
    task_service: &impl TaskPort,
) -> Result<StatusCode, ErrorResponse> {
    info!("Deleting task {task_id} for user {owner}");

    task_service
        .delete_task(owner, task_id, &mut *ext_cxn, &DbTaskWriter)
        .await
        .map_err(TaskErrorResponse::from)?;

    Ok(StatusCode::OK)
}
