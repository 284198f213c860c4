use dotenv::dotenv;
use lazy_static::lazy_static;
use rand::{Rng, thread_rng};
use sqlx::{Connection, PgConnection, PgPool};
use std::env;
use std::future::Future;
use todo_assist::db;
use tokio::runtime::Runtime;

lazy_static! {
    static ref TOKIO_RT: Runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Tokio runtime failed to initialize");
}

/// A throwaway database, dropped again when the test finishes
struct TestDatabase {
    base_url: String,
    db_name: String,
}

impl TestDatabase {
    async fn create(base_url: &str) -> Result<Self, sqlx::Error> {
        let db_id: u32 = thread_rng().gen_range(10_000..99_999);
        let db_name = format!("test_db_{db_id}");
        let mut conn = PgConnection::connect(base_url).await?;

        sqlx::query(&format!("CREATE DATABASE {db_name}"))
            .execute(&mut conn)
            .await?;
        conn.close().await?;

        Ok(Self {
            base_url: base_url.to_owned(),
            db_name,
        })
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        let db_name = self.db_name.clone();
        let base_url = self.base_url.clone();

        TOKIO_RT.block_on(async move {
            let mut conn = match PgConnection::connect(&base_url).await {
                Ok(cxn) => cxn,
                Err(conn_err) => {
                    println!(
                        "Failed to reconnect to drop test database {db_name}, please remove it manually. Error: {conn_err}"
                    );
                    return;
                }
            };

            let drop_result = sqlx::query(&format!("DROP DATABASE {db_name} WITH (FORCE)"))
                .execute(&mut conn)
                .await;
            if let Err(db_err) = drop_result {
                println!("Failed to drop test database {db_name}, please remove it manually. Error: {db_err}");
            }
        });
    }
}

/// Creates a migrated temp database for a test and hands the test a pool connected to it.
///
/// Expects that the TEST_DB_URL environment variable is populated with a connection string
/// (without a database name) for a user allowed to create databases
pub fn prepare_db_and_test<F, R>(test_fn: F)
where
    F: FnOnce(PgPool) -> R,
    R: Future<Output = ()>,
{
    if dotenv().is_err() {
        println!("Test is running without .env file.");
    }
    let base_url = env::var("TEST_DB_URL").expect(
        "You must provide the TEST_DB_URL environment variable as the base postgres connection string",
    );

    let test_db = match TOKIO_RT.block_on(TestDatabase::create(&base_url)) {
        Ok(tdb) => tdb,
        Err(db_err) => panic!("Failed to start test database: {db_err}"),
    };

    TOKIO_RT.block_on(async {
        let pool = db::connect_sqlx(&format!("{}/{}", base_url, test_db.db_name))
            .await
            .expect("Could not connect to the test database");
        db::run_migrations(&pool)
            .await
            .expect("Could not migrate the test database");

        test_fn(pool.clone()).await;
        pool.close().await;
    });
}
