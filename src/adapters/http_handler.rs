use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    adapters::middleware::{
        request_id_middleware, request_timing_middleware, security_headers_middleware,
    },
    core::{
        CityRecord, CityService, CitySubmission, ServiceError, UpsertOperation,
        city::ValidationErrors,
    },
};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

#[derive(Debug, Serialize)]
pub struct UpsertResponse {
    pub message: String,
    pub city: String,
    pub population: u64,
    pub operation: UpsertOperation,
}

#[derive(Debug, Serialize)]
pub struct CitiesResponse {
    pub count: usize,
    pub cities: Vec<CityRecord>,
}

/// Errors returned by the HTTP handlers; each maps to one status code and a
/// `{"detail": ...}` body.
#[derive(Debug)]
pub enum ApiError {
    /// Body could not be decoded into a submission
    BadRequest(String),
    Validation(ValidationErrors),
    NotFound(String),
    /// Store failure; `context` names the failed endpoint action
    Internal { context: &'static str, cause: String },
}

impl ApiError {
    fn from_service(error: ServiceError, context: &'static str) -> Self {
        match error {
            ServiceError::Validation(errors) => ApiError::Validation(errors),
            ServiceError::NotFound(city) => ApiError::NotFound(city),
            ServiceError::Store { source, .. } => ApiError::Internal {
                context,
                cause: source.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, json!(message)),
            ApiError::Validation(errors) => (StatusCode::BAD_REQUEST, json!(errors)),
            ApiError::NotFound(city) => (
                StatusCode::NOT_FOUND,
                json!(format!("City '{city}' not found")),
            ),
            ApiError::Internal { context, cause } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!(format!("{context}: {cause}")),
            ),
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Build the application router with all middleware attached.
pub fn router(service: CityService) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/city", post(upsert_city))
        .route("/city/{name}", get(get_city))
        .route("/cities", get(list_cities))
        .layer(middleware::from_fn(request_timing_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(service)
}

/// `GET /health`: 200 when the store serves requests, 503 otherwise.
async fn health_check(State(service): State<CityService>) -> Response {
    if service.health().await {
        tracing::debug!("Health check passed");
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "OK",
                database: "connected",
            }),
        )
            .into_response()
    } else {
        tracing::error!("Store health check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                database: "disconnected",
            }),
        )
            .into_response()
    }
}

/// `POST /city`: validate, label insert/update, upsert.
async fn upsert_city(
    State(service): State<CityService>,
    payload: Result<Json<CitySubmission>, JsonRejection>,
) -> Result<Json<UpsertResponse>, ApiError> {
    let Json(submission) = payload.map_err(|rejection| {
        tracing::warn!("Malformed city submission: {}", rejection.body_text());
        ApiError::BadRequest(rejection.body_text())
    })?;

    let outcome = service
        .upsert(&submission)
        .await
        .map_err(|e| ApiError::from_service(e, "Failed to upsert city"))?;

    Ok(Json(UpsertResponse {
        message: format!("City {} successfully", outcome.operation.past_tense()),
        city: outcome.record.city,
        population: outcome.record.population,
        operation: outcome.operation,
    }))
}

/// `GET /city/{name}`: lookup by normalized name.
async fn get_city(
    State(service): State<CityService>,
    Path(name): Path<String>,
) -> Result<Json<CityRecord>, ApiError> {
    service
        .get(&name)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_service(e, "Failed to query city"))
}

/// `GET /cities`: every record sorted by city.
async fn list_cities(
    State(service): State<CityService>,
) -> Result<Json<CitiesResponse>, ApiError> {
    let cities = service
        .list()
        .await
        .map_err(|e| ApiError::from_service(e, "Failed to list cities"))?;

    Ok(Json(CitiesResponse {
        count: cities.len(),
        cities,
    }))
}
