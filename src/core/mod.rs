pub mod city;
pub mod city_service;

pub use city::{CityRecord, CitySubmission, ValidationErrors, normalize_city_name};
pub use city_service::{CityService, ServiceError, UpsertOperation, UpsertOutcome};
