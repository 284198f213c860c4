use anyhow::Context;
use dotenv::dotenv;
use std::env;
use todo_assist::ai::gemini_driven_ports::GeminiModel;
use todo_assist::identity::gotrue_driven_ports::GoTrueProvider;
use todo_assist::{SharedData, app_env, build_router, db, logging, persistence};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    if dotenv().is_err() {
        println!("Running without a .env file");
    }

    let span_tracer = logging::span_export_from_env()?;
    logging::setup_logging_and_tracing(logging::init_env_filter()?, span_tracer);

    let db_url = env::var(app_env::DB_URL)
        .with_context(|| format!("{} must be set", app_env::DB_URL))?;
    let pool = db::connect_sqlx(&db_url).await?;
    db::run_migrations(&pool).await?;

    let task_model = GeminiModel::from_env();
    if !task_model.has_credential() {
        warn!(
            "{} is not set, task parsing will fail until it is configured",
            app_env::GEMINI_API_KEY
        );
    }

    let shared_data = SharedData {
        ext_cxn: persistence::ExternalConnectivity::new(pool)?,
        task_model,
        auth_provider: GoTrueProvider::from_env()?,
    };

    let bind_addr =
        env::var(app_env::BIND_ADDR).unwrap_or_else(|_| app_env::DEFAULT_BIND_ADDR.to_owned());
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {bind_addr}"))?;
    info!(
        model = shared_data.task_model.model_name(),
        "Listening on {bind_addr}"
    );

    axum::serve(listener, build_router(shared_data))
        .await
        .context("serving HTTP traffic")
}
