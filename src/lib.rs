//! citypop - a small HTTP service mapping city names to population counts.
//!
//! Records live in an Elasticsearch index; the service exposes create/update
//! and read endpoints over them. The crate follows a **hexagonal layout**:
//! the store is reached only through the [`CityStore`] port, with adapters for
//! Elasticsearch and for a process-local map, while request-level logic lives
//! in [`core`].
//!
//! # Endpoints
//! - `GET /health`: store health (200 / 503)
//! - `POST /city`: insert or update a city's population
//! - `GET /city/{name}`: population of one city (case and whitespace insensitive)
//! - `GET /cities`: every city, sorted by name (capped at 10,000 records)
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use citypop::{CityService, InMemoryStore, ports::CityStore};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let store = Arc::new(InMemoryStore::new());
//! store.connect().await?;
//! let app = citypop::adapters::router(CityService::new(store));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(()) }
//! ```
//!
//! # Error Handling
//! Ports and the core expose `thiserror` enums ([`StoreError`], [`ServiceError`]);
//! startup plumbing returns `eyre::Result<T>` with context attached via `WrapErr`.
pub mod config;
pub mod metrics;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

pub use crate::{
    adapters::{ElasticsearchStore, InMemoryStore},
    core::{CityRecord, CityService, ServiceError},
    ports::{CityStore, StoreError},
    utils::GracefulShutdown,
};
