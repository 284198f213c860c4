use ai::gemini_driven_ports::GeminiModel;
use axum::Router;
use axum::extract::State;
use identity::gotrue_driven_ports::GoTrueProvider;
use std::sync::Arc;

pub mod ai;
pub mod api;
pub mod app_env;
pub mod db;
pub mod domain;
pub mod dto;
pub mod external_connections;
pub mod identity;
pub mod logging;
pub mod persistence;
pub mod routing_utils;

/// Everything request handlers need, shared by every request
pub struct SharedData {
    pub ext_cxn: persistence::ExternalConnectivity,
    pub task_model: GeminiModel,
    pub auth_provider: GoTrueProvider,
}

pub type AppState = State<Arc<SharedData>>;

/// Assembles the full HTTP surface: auth, tasks (including free-text parsing) and the API docs
pub fn build_router(shared_data: SharedData) -> Router {
    let app = Router::new()
        .nest("/auth", api::auth::auth_routes())
        .nest(
            "/tasks",
            api::todo::task_routes().merge(api::parse::parse_routes()),
        )
        .with_state(Arc::new(shared_data))
        .merge(api::swagger_main::build_documentation());

    logging::attach_tracing_http(app)
}
