use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::config::DatabaseConfig;
use crate::demographics::{DemographicsRecord, DemographicsStore, StoreError};
use crate::error::{GatewayError, Result};

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS demographics (
    id SERIAL PRIMARY KEY,
    age INTEGER NOT NULL,
    gender VARCHAR(50) NOT NULL,
    profession VARCHAR(100) NOT NULL,
    fruits_vegetables VARCHAR(100) NOT NULL,
    session_id VARCHAR(255),
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)
"#;

const INSERT_SQL: &str = r#"
INSERT INTO demographics (age, gender, profession, fruits_vegetables, session_id)
VALUES ($1, $2, $3, $4, $5)
RETURNING id
"#;

/// Postgres-backed demographics store
///
/// The pool connects lazily; the table is created on the first insert.
pub struct PgDemographicsStore {
    pool: PgPool,
    schema_ready: OnceCell<()>,
}

impl PgDemographicsStore {
    pub fn connect_lazy(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy(url)
            .map_err(|e| GatewayError::Storage(format!("Invalid database URL: {e}")))?;

        Ok(Self {
            pool,
            schema_ready: OnceCell::new(),
        })
    }

    /// `None` when no database URL is configured
    pub fn from_config(config: &DatabaseConfig) -> Result<Option<Self>> {
        match config.connection_url() {
            Some(url) => Self::connect_lazy(&url, config.max_connections).map(Some),
            None => Ok(None),
        }
    }

    async fn ensure_schema(&self) -> std::result::Result<(), StoreError> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(CREATE_TABLE_SQL)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StoreError::Schema(e.to_string()))?;
                debug!("demographics table ready");
                Ok::<(), StoreError>(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DemographicsStore for PgDemographicsStore {
    #[instrument(skip(self, record), fields(age = record.age))]
    async fn insert(&self, record: &DemographicsRecord) -> std::result::Result<i64, StoreError> {
        self.ensure_schema().await?;

        let id: i32 = sqlx::query_scalar(INSERT_SQL)
            .bind(record.age)
            .bind(&record.gender)
            .bind(&record.profession)
            .bind(&record.fruits_vegetables)
            .bind(record.session_id.as_deref())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(i64::from(id))
    }
}
