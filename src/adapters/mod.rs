pub mod elasticsearch;
pub mod http_handler;
pub mod memory_store;
pub mod middleware;

/// Re-export commonly used types from adapters
pub use elasticsearch::ElasticsearchStore;
pub use http_handler::{ApiError, router};
pub use memory_store::InMemoryStore;
