use crate::error::{AppError, AppResult};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;

const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

pub fn init_pool(database_url: &str) -> AppResult<Pool> {
    let pg_config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e| AppError::Config(format!("DATABASE_URL parse: {e}")))?;

    let manager = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );

    Pool::builder(manager)
        .max_size(16)
        .build()
        .map_err(|e| AppError::StartServer(format!("build pool: {e}")))
}

/// Apply the embedded schema. Idempotent; every statement is IF NOT EXISTS.
pub async fn run_migrations(pool: &Pool) -> AppResult<()> {
    let client = pool.get().await?;
    client.batch_execute(SCHEMA).await?;
    tracing::info!("database schema ensured");
    Ok(())
}
