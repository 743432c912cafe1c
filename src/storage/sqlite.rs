//! SQLite storage backend implementation
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Registration reads are not blocked by measurement writes
//! - **Bounded pool**: One pool shared by the API and the result sink; callers wait up to
//!   the acquire timeout and then get `StorageError::PoolExhausted`
//! - **Migrations**: Automatic schema versioning with sqlx

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::MeasurementRow;
use crate::{Endpoint, Measurement};

const DEFAULT_MAX_CONNECTIONS: u32 = 25;

const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Create a new SQLite backend with the default pool size
    ///
    /// ```no_run
    /// # use horus::storage::sqlite::SqliteBackend;
    /// # async fn example() -> anyhow::Result<()> {
    /// let backend = SqliteBackend::new("./horus.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::with_pool_size(db_path, DEFAULT_MAX_CONNECTIONS, DEFAULT_ACQUIRE_TIMEOUT).await
    }

    /// Create a new SQLite backend
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Run migrations to create tables
    /// 3. Configure SQLite for concurrent readers (WAL mode, busy timeout)
    #[instrument(skip_all)]
    pub async fn with_pool_size(
        db_path: impl AsRef<Path>,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        info!("SQLite connection pool created ({} connections)", max_connections);

        debug!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    /// Helper to convert Unix milliseconds from SQLite to DateTime
    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn endpoint_from_row(row: &SqliteRow) -> Endpoint {
        Endpoint {
            id: row.get("id"),
            url: row.get("url"),
            created_at: Self::millis_to_timestamp(row.get("created_at")),
        }
    }

    fn measurement_from_row(row: &SqliteRow) -> MeasurementRow {
        MeasurementRow {
            id: row.get("id"),
            endpoint_id: row.get("site_id"),
            is_up: row.get("is_up"),
            status_code: row.get::<i64, _>("status_code") as u16,
            response_time_ms: row.get::<i64, _>("response_time_ms").max(0) as u64,
            checked_at: Self::millis_to_timestamp(row.get("checked_at")),
        }
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self))]
    async fn insert_endpoint(&self, url: &str) -> StorageResult<Endpoint> {
        let row = sqlx::query("INSERT INTO sites (url) VALUES (?) RETURNING id, url, created_at")
            .bind(url)
            .fetch_one(&self.pool)
            .await?;

        let endpoint = Self::endpoint_from_row(&row);
        debug!("registered endpoint {} ({})", endpoint.id, endpoint.url);
        Ok(endpoint)
    }

    #[instrument(skip(self))]
    async fn get_endpoint(&self, id: i64) -> StorageResult<Option<Endpoint>> {
        let row = sqlx::query("SELECT id, url, created_at FROM sites WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(Self::endpoint_from_row))
    }

    #[instrument(skip(self))]
    async fn list_endpoints(&self) -> StorageResult<Vec<Endpoint>> {
        let rows = sqlx::query(
            "SELECT id, url, created_at FROM sites ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        let endpoints: Vec<Endpoint> = rows.iter().map(Self::endpoint_from_row).collect();
        debug!("loaded {} endpoints", endpoints.len());
        Ok(endpoints)
    }

    #[instrument(skip(self, measurement), fields(endpoint_id = measurement.endpoint_id))]
    async fn record_measurement(&self, measurement: &Measurement) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO health_checks (site_id, is_up, status_code, response_time_ms)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(measurement.endpoint_id)
        .bind(measurement.is_up)
        .bind(measurement.status_code as i64)
        .bind(measurement.response_time_ms as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn recent_measurements(
        &self,
        endpoint_id: i64,
        limit: usize,
    ) -> StorageResult<Vec<MeasurementRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, site_id, is_up, status_code, response_time_ms, checked_at
            FROM health_checks
            WHERE site_id = ?
            ORDER BY checked_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(endpoint_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::measurement_from_row).collect())
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());
                metadata.insert("pool_size".to_string(), self.pool.size().to_string());
                metadata.insert("idle".to_string(), self.pool.num_idle().to_string());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
