pub mod entities;
pub mod error;
pub mod runs;

pub use entities::EnrichmentMeta;
pub use error::{Result, StoreError};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Postgres-backed persistence for entities and pipeline-run audit rows.
pub struct PgStore {
    pub(crate) pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        info!("Connected to Postgres");
        Ok(Self { pool })
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.into()))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
