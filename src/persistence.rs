pub mod db_todo_driven_ports;

use crate::external_connections;
use crate::external_connections::ConnectionHandle;
use anyhow::Context;
use reqwest_middleware::ClientBuilder;
use reqwest_tracing::TracingMiddleware;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres};

/// Data structure which owns clients for connecting to external systems.
/// Allows business logic to be agnostic of the external systems it communicates with
/// so driven adapters can easily be swapped out for other implementations
#[derive(Clone)]
pub struct ExternalConnectivity {
    db: PgPool,
    http_client: reqwest_middleware::ClientWithMiddleware,
}

impl ExternalConnectivity {
    /// Accepts the database pool and builds the outbound HTTP client used for the model and
    /// identity provider calls. Outbound requests carry the current trace context.
    pub fn new(db: PgPool) -> Result<Self, anyhow::Error> {
        let base_client = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .context("building the outbound HTTP client")?;
        let http_client = ClientBuilder::new(base_client)
            .with(TracingMiddleware::default())
            .build();

        Ok(ExternalConnectivity { db, http_client })
    }
}

/// A handle from ExternalConnectivity which can connect to a database
pub struct PoolConnectionHandle {
    active_connection: PoolConnection<Postgres>,
}

impl ConnectionHandle for PoolConnectionHandle {
    fn borrow_connection(&mut self) -> &mut PgConnection {
        &mut self.active_connection
    }
}

impl external_connections::ExternalConnectivity for ExternalConnectivity {
    type DbHandle<'cxn_borrow> = PoolConnectionHandle;

    async fn database_cxn(&mut self) -> Result<Self::DbHandle<'_>, anyhow::Error> {
        let handle = PoolConnectionHandle {
            active_connection: self
                .db
                .acquire()
                .await
                .context("acquiring a connection from the database pool")?,
        };

        Ok(handle)
    }

    fn http_client(&self) -> &reqwest_middleware::ClientWithMiddleware {
        &self.http_client
    }
}
