//! Store trait abstraction.

use async_trait::async_trait;

/// Error type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur against the backing store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be decoded.
    #[error("invalid stored value: {0}")]
    Value(#[from] serde_json::Error),
}

/// Expiring key-value store the progress engine runs against.
///
/// Implementations must be shareable across tasks. No retries are expected
/// here; resilience belongs to the backing client.
#[async_trait]
pub trait TtlStore: Send + Sync {
    /// Fetch the value at `key`. Absent or expired keys yield `None`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` at `key`, expiring after `ttl_secs` seconds.
    /// A TTL of zero means the key never expires.
    async fn put(&self, key: &str, value: String, ttl_secs: u64) -> Result<()>;

    /// Atomically add one to the integer at `key`, initializing it to zero
    /// when absent. Returns the post-increment value.
    ///
    /// Atomicity is required: concurrent increments of the same key must
    /// never lose an update.
    async fn increment(&self, key: &str) -> Result<i64>;

    /// Delete `key`. Deleting an absent key is not an error.
    async fn forget(&self, key: &str) -> Result<()>;
}
