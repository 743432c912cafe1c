//! Storage backends for endpoints and measurement history
//!
//! The pipeline needs exactly two operations from storage: read the registered endpoints
//! once per cycle and append one measurement per probe. The registration API adds
//! endpoint creation and the latest-measurement lookup used to derive current status.
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded database with a bounded connection pool
//! - **In-Memory**: No persistence, for tests and throwaway runs
//!
//! ## Usage
//!
//! ```no_run
//! use horus::storage::{StorageBackend, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./horus.db").await?;
//!     let endpoints = backend.list_endpoints().await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

use std::sync::Arc;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use schema::{EndpointStatus, MeasurementRow};

use crate::config::StorageConfig;

/// Build the backend selected by the configuration.
pub async fn open(config: &StorageConfig) -> StorageResult<Arc<dyn StorageBackend>> {
    match config {
        StorageConfig::None => Ok(Arc::new(memory::MemoryBackend::new())),
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite {
            path,
            max_connections,
            acquire_timeout,
        } => {
            let backend = sqlite::SqliteBackend::with_pool_size(
                path,
                *max_connections,
                std::time::Duration::from_secs(*acquire_timeout),
            )
            .await?;
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => Err(StorageError::ConnectionFailed(
            "built without the storage-sqlite feature".to_string(),
        )),
    }
}
