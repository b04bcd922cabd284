//! City records and the validation applied to inbound submissions.
//!
//! A submission is accepted only once every constraint holds; the resulting
//! [`CityRecord`] always carries a normalized identifier, so everything
//! downstream (service, store adapters, responses) sees canonical keys.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum city name length, counted in characters after trimming.
pub const MAX_CITY_NAME_CHARS: usize = 100;

/// A validated city record. `city` is the normalized storage identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityRecord {
    pub city: String,
    pub population: u64,
}

impl CityRecord {
    pub fn new(city: impl Into<String>, population: u64) -> Self {
        Self {
            city: city.into(),
            population,
        }
    }
}

/// Raw inbound body of `POST /city`.
///
/// `population` is signed on purpose so that negative values reach validation
/// and are reported as a constraint violation rather than a decode failure.
#[derive(Debug, Clone, Deserialize)]
pub struct CitySubmission {
    pub city: String,
    pub population: i64,
}

/// Trim surrounding whitespace and lowercase.
pub fn normalize_city_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A single violated constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: &'static str,
    pub message: String,
}

/// All constraints a submission violated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<Violation>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(Violation {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|v| format!("{}: {}", v.field, v.message))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

impl std::error::Error for ValidationErrors {}

impl CitySubmission {
    /// Check every constraint and, if all hold, produce a normalized record.
    pub fn validate(&self) -> Result<CityRecord, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let trimmed = self.city.trim();
        if trimmed.is_empty() {
            errors.push("city", "City name cannot be empty or whitespace only");
        } else if trimmed.chars().count() > MAX_CITY_NAME_CHARS {
            errors.push(
                "city",
                format!("City name must be at most {MAX_CITY_NAME_CHARS} characters"),
            );
        }

        if self.population < 0 {
            errors.push("population", "Population must be a non-negative integer");
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(CityRecord {
            city: normalize_city_name(trimmed),
            population: self.population.unsigned_abs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(city: &str, population: i64) -> CitySubmission {
        CitySubmission {
            city: city.to_string(),
            population,
        }
    }

    #[test]
    fn test_normalize_city_name() {
        assert_eq!(normalize_city_name("  NEW york "), "new york");
        assert_eq!(normalize_city_name("Tokyo"), "tokyo");
        assert_eq!(normalize_city_name("\tSão Paulo\n"), "são paulo");
    }

    #[test]
    fn test_valid_submission_is_normalized() {
        let record = submission(" New York ", 8_336_817).validate().unwrap();
        assert_eq!(record, CityRecord::new("new york", 8_336_817));
    }

    #[test]
    fn test_zero_population_is_accepted() {
        let record = submission("Ghost Town", 0).validate().unwrap();
        assert_eq!(record.population, 0);
    }

    #[test]
    fn test_negative_population_rejected() {
        let errors = submission("X", -5).validate().unwrap_err();
        assert_eq!(errors.violations().len(), 1);
        assert_eq!(errors.violations()[0].field, "population");
    }

    #[test]
    fn test_whitespace_only_city_rejected() {
        let errors = submission("   ", 10).validate().unwrap_err();
        assert_eq!(errors.violations()[0].field, "city");
    }

    #[test]
    fn test_city_length_limit_counts_characters() {
        let at_limit = "é".repeat(MAX_CITY_NAME_CHARS);
        assert!(submission(&at_limit, 1).validate().is_ok());

        let too_long = "a".repeat(MAX_CITY_NAME_CHARS + 1);
        let errors = submission(&too_long, 1).validate().unwrap_err();
        assert!(errors.to_string().contains("at most 100 characters"));

        // Surrounding whitespace does not count towards the limit
        let padded = format!("  {}  ", "a".repeat(MAX_CITY_NAME_CHARS));
        assert!(submission(&padded, 1).validate().is_ok());
    }

    #[test]
    fn test_all_violations_are_reported() {
        let errors = submission("", -1).validate().unwrap_err();
        let fields: Vec<_> = errors.violations().iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["city", "population"]);
        assert_eq!(
            errors.to_string(),
            "city: City name cannot be empty or whitespace only; \
             population: Population must be a non-negative integer"
        );
    }

    #[test]
    fn test_validation_errors_serialize_as_list() {
        let mut errors = ValidationErrors::new();
        errors.push("population", "negative");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"field": "population", "message": "negative"}])
        );
    }
}
