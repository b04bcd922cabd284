use async_trait::async_trait;
use thiserror::Error;

use crate::core::city::CityRecord;

/// Maximum number of records returned by [`CityStore::list_all`].
///
/// There is no pagination: records beyond the cap are silently omitted.
pub const LIST_ALL_LIMIT: usize = 10_000;

/// Error type for document store operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// The store has not been connected yet, or was already closed
    #[error("Store is not connected")]
    NotConnected,

    /// The cluster did not reach a serviceable state
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Error when the transport to the store fails
    #[error("Connection error: {0}")]
    Connection(String),

    /// Error when a store request times out
    #[error("Timeout error after {0} seconds")]
    Timeout(u64),

    /// The store answered with a status the operation does not expect
    #[error("Store returned status {status} during {operation}: {body}")]
    UnexpectedStatus {
        /// Store operation that was running
        operation: &'static str,
        /// HTTP status code returned by the store
        status: u16,
        /// Response body, kept for diagnostics
        body: String,
    },

    /// The store answered with a payload that could not be decoded
    #[error("Invalid store response: {0}")]
    Decode(String),

    /// Invalid client configuration (URL, credentials, ...)
    #[error("Invalid store configuration: {0}")]
    Configuration(String),
}

impl StoreError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Connection(_) | StoreError::Timeout(_) => true,
            StoreError::UnexpectedStatus { status, .. } => {
                matches!(status, 429 | 502 | 503 | 504)
            }
            _ => false,
        }
    }
}

/// Result type alias for document store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// CityStore defines the port (interface) to the document store holding city records.
///
/// Keys passed in are already normalized; adapters store them verbatim.
#[async_trait]
pub trait CityStore: Send + Sync + 'static {
    /// Establish the connection and provision the backing collection if absent.
    async fn connect(&self) -> StoreResult<()>;

    /// Release the connection.
    async fn close(&self) -> StoreResult<()>;

    /// Report whether the store is serving requests. Never fails.
    async fn health_check(&self) -> bool;

    /// Insert or replace the record keyed by `record.city`.
    ///
    /// The write is visible to subsequent reads once this returns.
    async fn upsert(&self, record: &CityRecord) -> StoreResult<()>;

    /// Point lookup by identifier.
    ///
    /// # Returns
    /// `Ok(None)` when the identifier is unknown, the stored population otherwise
    async fn get(&self, city: &str) -> StoreResult<Option<u64>>;

    /// Every record sorted by identifier ascending, capped at [`LIST_ALL_LIMIT`].
    async fn list_all(&self) -> StoreResult<Vec<CityRecord>>;

    /// Short name used in logs and metrics labels.
    fn backend_name(&self) -> &'static str;
}
