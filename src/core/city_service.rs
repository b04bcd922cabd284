//! Core city population service.
//!
//! `CityService` sits between the HTTP adapter and the [`CityStore`] port. It
//! owns the request-level flow (validate, normalize, call the store, label the
//! outcome) while staying free of any HTTP concerns, so it can be exercised
//! directly against the in-memory adapter.
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::{
    core::city::{CityRecord, CitySubmission, ValidationErrors, normalize_city_name},
    metrics::{self, StoreOperationTimer},
    ports::city_store::{CityStore, StoreError, StoreResult},
};

/// Errors surfaced by [`CityService`]
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The submission violated one or more constraints
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// The requested city has never been written
    #[error("City '{0}' not found")]
    NotFound(String),

    /// Any other store failure
    #[error("Store operation '{operation}' failed: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

/// Whether an upsert created the record or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOperation {
    Insert,
    Update,
}

impl UpsertOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            UpsertOperation::Insert => "insert",
            UpsertOperation::Update => "update",
        }
    }

    /// Past-tense verb used in response messages.
    pub fn past_tense(self) -> &'static str {
        match self {
            UpsertOperation::Insert => "inserted",
            UpsertOperation::Update => "updated",
        }
    }
}

/// Result of a successful upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub record: CityRecord,
    pub operation: UpsertOperation,
}

/// Orchestrates validation and store access for city records.
///
/// Cheap to clone: the store handle is shared behind an `Arc`.
#[derive(Clone)]
pub struct CityService {
    store: Arc<dyn CityStore>,
}

impl CityService {
    pub fn new(store: Arc<dyn CityStore>) -> Self {
        Self { store }
    }

    /// Report store health; failures are already folded into `false` by the port.
    pub async fn health(&self) -> bool {
        let healthy = self.store.health_check().await;
        metrics::set_store_health_status(self.store.backend_name(), healthy);
        healthy
    }

    /// Validate a submission and write it.
    ///
    /// The prior lookup exists only to label the result as insert or update;
    /// the write itself replaces unconditionally.
    pub async fn upsert(&self, submission: &CitySubmission) -> Result<UpsertOutcome, ServiceError> {
        let record = submission.validate().map_err(|errors| {
            tracing::warn!(city = %submission.city, "Rejected city submission: {}", errors);
            ServiceError::Validation(errors)
        })?;

        let existing = self
            .observe("get", Some(&record.city), self.store.get(&record.city))
            .await?;
        let operation = if existing.is_some() {
            UpsertOperation::Update
        } else {
            UpsertOperation::Insert
        };

        self.observe("upsert", Some(&record.city), self.store.upsert(&record))
            .await?;

        tracing::info!(
            city = %record.city,
            population = record.population,
            operation = operation.as_str(),
            "City {}",
            operation.past_tense()
        );

        Ok(UpsertOutcome { record, operation })
    }

    /// Look up a city by name (normalized before the lookup).
    pub async fn get(&self, name: &str) -> Result<CityRecord, ServiceError> {
        let city = normalize_city_name(name);

        // Blank names can never be stored; skip the round trip
        if city.is_empty() {
            tracing::warn!("Lookup with a blank city name");
            return Err(ServiceError::NotFound(city));
        }

        match self.observe("get", Some(&city), self.store.get(&city)).await? {
            Some(population) => {
                tracing::info!(city = %city, "Retrieved population for city");
                Ok(CityRecord { city, population })
            }
            None => {
                tracing::warn!(city = %city, "City not found");
                Err(ServiceError::NotFound(city))
            }
        }
    }

    /// All records, sorted by city ascending.
    pub async fn list(&self) -> Result<Vec<CityRecord>, ServiceError> {
        self.observe("list_all", None, self.store.list_all()).await
    }

    /// Run a store call with timing, metrics and error logging attached.
    async fn observe<T>(
        &self,
        operation: &'static str,
        city: Option<&str>,
        call: impl Future<Output = StoreResult<T>>,
    ) -> Result<T, ServiceError> {
        let backend = self.store.backend_name();
        let _timer = StoreOperationTimer::new(backend, operation);

        match call.await {
            Ok(value) => {
                metrics::increment_store_operation_total(backend, operation, "ok");
                Ok(value)
            }
            Err(source) => {
                metrics::increment_store_operation_total(backend, operation, "error");
                match city {
                    Some(city) => tracing::error!(
                        backend,
                        operation,
                        city,
                        error = %source,
                        "Store operation failed"
                    ),
                    None => tracing::error!(
                        backend,
                        operation,
                        error = %source,
                        "Store operation failed"
                    ),
                }
                Err(ServiceError::Store { operation, source })
            }
        }
    }
}
