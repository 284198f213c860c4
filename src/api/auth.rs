use crate::domain::auth::driven_ports::AuthProvider;
use crate::domain::auth::driving_ports::{AuthError, AuthPort};
use crate::domain::auth::SignUpOutcome;
use crate::external_connections::ExternalConnectivity;
use crate::routing_utils::{
    AuthErrorResponse, BasicErrorResponse, GenericErrorResponse, Json, UnauthorizedResponse,
    ValidationErrorResponse,
};
use crate::{AppState, SharedData, domain, dto};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{ErrorResponse, IntoResponse, Response};
use axum::routing::post;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::OpenApi;
use uuid::Uuid;
use validator::Validate;

#[derive(OpenApi)]
#[openapi(paths(sign_up, sign_in))]
/// Defines the OpenAPI documentation for the authentication API
pub struct AuthApi;
/// Constant used to group authentication endpoints in OpenAPI documentation
pub const AUTH_API_GROUP: &str = "Authentication";

/// Creates a router for endpoints under the "/auth" group of APIs
pub fn auth_routes() -> Router<Arc<SharedData>> {
    Router::new()
        .route(
            "/signup",
            post(
                |State(app_state): AppState, Json(credentials): Json<dto::Credentials>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let auth_service = domain::auth::AuthService {};

                    sign_up(credentials, &mut ext_cxn, &auth_service, &app_state.auth_provider).await
                },
            ),
        )
        .route(
            "/signin",
            post(
                |State(app_state): AppState, Json(credentials): Json<dto::Credentials>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let auth_service = domain::auth::AuthService {};

                    sign_in(credentials, &mut ext_cxn, &auth_service, &app_state.auth_provider).await
                },
            ),
        )
}

/// Resolves the owner of a Bearer token for the task endpoints. Anything short of a confirmed
/// identity is a 401; provider outages are a 500.
pub async fn resolve_owner(
    access_token: &str,
    ext_cxn: &mut impl ExternalConnectivity,
    auth_service: &impl AuthPort,
    auth_provider: &impl AuthProvider,
) -> Result<Uuid, ErrorResponse> {
    match auth_service
        .identify(access_token, &mut *ext_cxn, auth_provider)
        .await
    {
        Ok(owner) => Ok(owner),
        Err(AuthError::PortError(cause)) => {
            Err(GenericErrorResponse(cause.context("resolving the caller's access token")).into())
        }
        Err(err) => {
            warn!("Rejected access token: {err}");
            Err(UnauthorizedResponse.into())
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = AUTH_API_GROUP,
    request_body = dto::Credentials,
    responses(
        (status = 200, description = "Account created and signed in", body = dto::Session),
        (status = 202, description = "Account created, email confirmation required", body = dto::ConfirmationPending),
        (status = 400, response = BasicErrorResponse),
        (status = 409, response = BasicErrorResponse),
        (status = 429, response = BasicErrorResponse),
    ),
)]
/// Registers a new account with email and password
async fn sign_up(
    credentials: dto::Credentials,
    ext_cxn: &mut impl ExternalConnectivity,
    auth_service: &impl AuthPort,
    auth_provider: &impl AuthProvider,
) -> Result<Response, ErrorResponse> {
    info!("Sign up requested");
    credentials
        .validate()
        .map_err(ValidationErrorResponse::from)?;

    let outcome = auth_service
        .sign_up(&credentials.into(), &mut *ext_cxn, auth_provider)
        .await
        .map_err(AuthErrorResponse::from)?;

    Ok(match outcome {
        SignUpOutcome::SignedIn(session) => {
            (StatusCode::OK, Json(dto::Session::from(session))).into_response()
        }
        SignUpOutcome::ConfirmationRequired => (
            StatusCode::ACCEPTED,
            Json(dto::ConfirmationPending {
                message: "Check your inbox to confirm your email address, then sign in.".to_owned(),
            }),
        )
            .into_response(),
    })
}

#[utoipa::path(
    post,
    path = "/auth/signin",
    tag = AUTH_API_GROUP,
    request_body = dto::Credentials,
    responses(
        (status = 200, description = "Signed in", body = dto::Session),
        (status = 400, response = BasicErrorResponse),
        (status = 401, response = BasicErrorResponse),
        (status = 403, response = BasicErrorResponse),
        (status = 429, response = BasicErrorResponse),
    ),
)]
/// Signs in with email and password
async fn sign_in(
    credentials: dto::Credentials,
    ext_cxn: &mut impl ExternalConnectivity,
    auth_service: &impl AuthPort,
    auth_provider: &impl AuthProvider,
) -> Result<Json<dto::Session>, ErrorResponse> {
    info!("Sign in requested");
    credentials
        .validate()
        .map_err(ValidationErrorResponse::from)?;

    let session = auth_service
        .sign_in(&credentials.into(), &mut *ext_cxn, auth_provider)
        .await
        .map_err(AuthErrorResponse::from)?;

    Ok(Json(session.into()))
}
