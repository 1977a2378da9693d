use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Executor;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{CoreError, CoreResult};

/// Process-wide connection pool. Every connection gets a statement timeout
/// so a runaway vector scan cannot pin a connection forever.
#[derive(Clone)]
pub struct DbPool {
    pool: PgPool,
}

impl DbPool {
    pub async fn connect(config: &DatabaseConfig) -> CoreResult<Self> {
        let statement_timeout_ms = config.statement_timeout_seconds * 1000;

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max_size)
            .acquire_timeout(Duration::from_secs(10))
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    conn.execute(
                        format!("SET statement_timeout = {statement_timeout_ms}").as_str(),
                    )
                    .await?;
                    Ok(())
                })
            })
            .connect(&config.url)
            .await
            .map_err(|e| CoreError::database(format!("Failed to connect: {e}")))?;

        info!(
            max_connections = config.pool_max_size,
            statement_timeout_ms, "database pool ready"
        );
        Ok(Self { pool })
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> CoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CoreError::database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
