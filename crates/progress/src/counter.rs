//! Per-job unit counter.

use std::sync::Arc;

use exprog_core::JobIdentity;
use exprog_storage::{Result, TtlStore};

/// Store key prefix for unit counters.
pub(crate) const COUNTER_PREFIX: &str = "export_progress_counter";

/// Counts units of work completed for a job.
///
/// The count lives in the backing store so concurrent workers and replicas
/// observe the same value. Store failures surface to the caller: progress
/// tracking is allowed to fail loudly, but losing a counter update must
/// never abort the underlying export.
#[derive(Clone)]
pub struct ProgressCounter {
    store: Arc<dyn TtlStore>,
}

impl ProgressCounter {
    /// Create a counter over the given store.
    pub fn new(store: Arc<dyn TtlStore>) -> Self {
        Self { store }
    }

    /// Record one completed unit of work. Atomic under concurrent callers.
    pub async fn increment(&self, id: &JobIdentity) -> Result<()> {
        self.store.increment(&id.store_key(COUNTER_PREFIX)).await?;
        Ok(())
    }

    /// Current count; zero when never incremented or previously cleared.
    pub async fn get(&self, id: &JobIdentity) -> Result<i64> {
        let raw = self.store.get(&id.store_key(COUNTER_PREFIX)).await?;
        Ok(raw.and_then(|value| value.parse().ok()).unwrap_or(0))
    }

    /// Remove the counter. Idempotent.
    pub async fn clear(&self, id: &JobIdentity) -> Result<()> {
        self.store.forget(&id.store_key(COUNTER_PREFIX)).await
    }
}
