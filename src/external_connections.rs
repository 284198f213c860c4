use reqwest_middleware::ClientWithMiddleware;
use sqlx::PgConnection;
use std::fmt::Display;
use tracing::warn;

/// Something that can lend out a live PostgreSQL connection, either from the pool or from
/// an open transaction
pub trait ConnectionHandle: Send {
    fn borrow_connection(&mut self) -> &mut PgConnection;
}

/// Gives driven adapters access to the systems outside this service (the database and other
/// HTTP services) without the business logic knowing which clients are in play.
#[allow(async_fn_in_trait)]
pub trait ExternalConnectivity: Sync {
    type DbHandle<'cxn_borrow>: ConnectionHandle
    where
        Self: 'cxn_borrow;

    /// Acquires a database connection
    async fn database_cxn(&mut self) -> Result<Self::DbHandle<'_>, anyhow::Error>;

    /// Returns the shared, tracing-aware HTTP client
    fn http_client(&self) -> &ClientWithMiddleware;
}

/// Reads the body of a failed outbound call for diagnostics. An unreadable body is logged and
/// treated as empty.
pub async fn failure_body(response: reqwest::Response) -> String {
    let status = response.status();
    body_or_empty(status, response.text().await)
}

fn body_or_empty(status: reqwest::StatusCode, read: Result<String, impl Display>) -> String {
    read.unwrap_or_else(|err| {
        warn!("Could not read the body of a {status} response: {err}");
        String::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn unreadable_failure_body_becomes_empty() {
        let body = body_or_empty(
            reqwest::StatusCode::BAD_GATEWAY,
            Err::<String, _>(anyhow!("connection reset mid-body")),
        );
        assert_eq!("", body);
    }

    #[test]
    fn readable_failure_body_is_kept() {
        let body = body_or_empty(
            reqwest::StatusCode::NOT_FOUND,
            Ok::<_, anyhow::Error>("{\"error\":\"gone\"}".to_owned()),
        );
        assert_eq!("{\"error\":\"gone\"}", body);
    }

    #[tokio::test]
    async fn failure_body_reads_response_text() {
        let response = reqwest::Response::from(
            axum::http::Response::builder()
                .status(429)
                .body("slow down")
                .expect("response builds"),
        );
        assert_eq!("slow down", failure_body(response).await);
    }
}

#[cfg(test)]
pub mod test_util {
    use super::*;
    use anyhow::anyhow;

    /// Stand-in for ExternalConnectivity in unit tests. Driven ports in unit tests are in-memory
    /// fakes, so handing out a database connection is always an error.
    pub struct FakeExternalConnectivity {
        http_client: ClientWithMiddleware,
    }

    impl FakeExternalConnectivity {
        pub fn new() -> FakeExternalConnectivity {
            FakeExternalConnectivity {
                http_client: reqwest_middleware::ClientBuilder::new(reqwest::Client::new()).build(),
            }
        }
    }

    pub struct NoDatabase;

    impl ConnectionHandle for NoDatabase {
        fn borrow_connection(&mut self) -> &mut PgConnection {
            unreachable!("FakeExternalConnectivity never hands out a database handle")
        }
    }

    impl ExternalConnectivity for FakeExternalConnectivity {
        type DbHandle<'cxn_borrow> = NoDatabase;

        async fn database_cxn(&mut self) -> Result<Self::DbHandle<'_>, anyhow::Error> {
            Err(anyhow!("no database is available in unit tests"))
        }

        fn http_client(&self) -> &ClientWithMiddleware {
            &self.http_client
        }
    }
}
