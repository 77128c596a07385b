//! Health store interface and backends
//!
//! The core talks to health data only through the [`HealthStore`] trait:
//!
//! - **memory**: in-process store, also the stub used throughout the tests
//! - **journal**: memory store persisted to a checksummed append-only journal
//! - **error**: Error types
//!
//! # Lifecycle
//!
//! ```text
//! Registry (static, always succeeds)
//!   → StoreHandle::get() (first call opens the configured backend)
//!   → shared Arc<dyn HealthStore> for every later request
//! ```
//!
//! A failed open is recorded once and reported to every request; it never
//! takes the process down.

pub mod error;
pub mod journal;
pub mod memory;

pub use error::{StoreError, StoreResult};
pub use journal::JournalStore;
pub use memory::MemoryStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::{HealthError, HealthResult};
use crate::health::types::{
    ActivitySummary, AggregationMode, AuthorizationStatus, DataType, RawSample, RawStatistics,
    SortOrder, StoreWrite, TimeInterval, WorkoutRecord,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// File name of the journal inside the data directory
pub const JOURNAL_FILE: &str = "journal.log";

/// The narrow interface the core needs from a platform health store
///
/// Implementations must be safe for concurrent use; the core adds no locking
/// of its own around a store.
#[async_trait]
pub trait HealthStore: Send + Sync {
    /// Short backend name for status output
    fn backend(&self) -> &str;

    async fn is_available(&self) -> bool;

    /// Ask for read and write access to the given types
    async fn request_authorization(
        &self,
        read: &[&'static DataType],
        write: &[&'static DataType],
    ) -> StoreResult<()>;

    async fn authorization_status(&self, data_type: &DataType) -> AuthorizationStatus;

    /// Native cumulative sum; `None` when no samples fall in the interval
    async fn query_cumulative_sum(
        &self,
        identifier: &str,
        interval: TimeInterval,
    ) -> StoreResult<Option<f64>>;

    async fn query_samples(
        &self,
        identifier: &str,
        interval: TimeInterval,
        limit: Option<usize>,
        sort: SortOrder,
    ) -> StoreResult<Vec<RawSample>>;

    async fn query_statistics(
        &self,
        identifier: &str,
        interval: TimeInterval,
        mode: AggregationMode,
    ) -> StoreResult<RawStatistics>;

    /// Workouts newest first, optionally filtered by activity token
    async fn query_workouts(
        &self,
        interval: TimeInterval,
        activity: Option<&str>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<WorkoutRecord>>;

    async fn query_activity_summary(&self, date: NaiveDate) -> StoreResult<Option<ActivitySummary>>;

    async fn save(&self, write: StoreWrite) -> StoreResult<()>;
}

/// Lazily opened, process-wide store
///
/// The first [`StoreHandle::get`] opens the backend named in the config; every
/// later call shares the same instance, or the same recorded failure.
pub struct StoreHandle {
    config: StoreConfig,
    cell: OnceCell<Result<Arc<dyn HealthStore>, String>>,
}

impl StoreHandle {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    /// Wrap an already-open store
    pub fn from_store(store: Arc<dyn HealthStore>) -> Self {
        Self {
            config: StoreConfig::default(),
            cell: OnceCell::new_with(Some(Ok(store))),
        }
    }

    /// Get the shared store, opening it on first use
    pub async fn get(&self) -> HealthResult<Arc<dyn HealthStore>> {
        let opened = self
            .cell
            .get_or_init(|| async {
                open_store(&self.config).map_err(|e| {
                    warn!("Failed to open {} store: {}", self.config.backend, e);
                    e.to_string()
                })
            })
            .await;

        match opened {
            Ok(store) => Ok(Arc::clone(store)),
            Err(message) => Err(HealthError::StoreFailure(StoreError::Backend(message.clone()))),
        }
    }
}

/// Open the backend named in the config
pub fn open_store(config: &StoreConfig) -> StoreResult<Arc<dyn HealthStore>> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory health store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Unavailable => {
            info!("Health store disabled by configuration");
            Ok(Arc::new(MemoryStore::unavailable()))
        }
        StoreBackend::Journal => {
            let path = Path::new(&config.data_dir).join(JOURNAL_FILE);
            let store = JournalStore::open(&path, config.sync)?;
            info!("Opened journal store at {}", path.display());
            Ok(Arc::new(store))
        }
    }
}
