use std::net::IpAddr;

use crate::config::models::{AppConfig, StoreBackend};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Characters Elasticsearch refuses in index names
const FORBIDDEN_INDEX_CHARS: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ',', '#', ' ', ':'];

/// Validation error types
#[derive(Debug, thiserror::Error, Clone)]
pub enum ValidationError {
    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid listen address '{address}': {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Application configuration validator
pub struct AppConfigValidator;

impl AppConfigValidator {
    /// Validate the whole configuration, reporting every problem at once
    pub fn validate(config: &AppConfig) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = Self::validate_host(&config.host) {
            errors.push(e);
        }

        if config.app_name.trim().is_empty() {
            errors.push(ValidationError::InvalidField {
                field: "app_name".to_string(),
                message: "Must not be empty".to_string(),
            });
        }

        if config.store_backend == StoreBackend::Elasticsearch {
            if let Err(e) = Self::validate_url(&config.elasticsearch_host, "elasticsearch_host") {
                errors.push(e);
            }
            if let Err(e) = Self::validate_index_name(&config.elasticsearch_index) {
                errors.push(e);
            }
            if config.elasticsearch_timeout_secs == 0 {
                errors.push(ValidationError::InvalidField {
                    field: "elasticsearch_timeout_secs".to_string(),
                    message: "Request timeout must be greater than 0".to_string(),
                });
            }
            if config.elasticsearch_basic_auth && config.elasticsearch_user.is_none() {
                errors.push(ValidationError::InvalidField {
                    field: "elasticsearch_user".to_string(),
                    message: "Basic auth is enabled but no user is configured".to_string(),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            })
        }
    }

    /// The listen host must be an IP literal or a plausible hostname
    fn validate_host(host: &str) -> ValidationResult<()> {
        if host.parse::<IpAddr>().is_ok() {
            return Ok(());
        }

        let is_hostname = !host.is_empty()
            && host.len() <= 253
            && host
                .split('.')
                .all(|label| {
                    !label.is_empty()
                        && !label.starts_with('-')
                        && !label.ends_with('-')
                        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
                });

        if is_hostname {
            Ok(())
        } else {
            Err(ValidationError::InvalidListenAddress {
                address: host.to_string(),
                reason: "Must be an IP address (e.g., '0.0.0.0') or a hostname".to_string(),
            })
        }
    }

    /// Validate URL format
    fn validate_url(url_str: &str, field_name: &str) -> ValidationResult<()> {
        match url::Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    return Err(ValidationError::InvalidField {
                        field: field_name.to_string(),
                        message: format!(
                            "URL scheme must be 'http' or 'https', got '{}'",
                            url.scheme()
                        ),
                    });
                }

                if url.host_str().is_none_or(str::is_empty) {
                    return Err(ValidationError::InvalidField {
                        field: field_name.to_string(),
                        message: "URL must have a valid host".to_string(),
                    });
                }

                Ok(())
            }
            Err(e) => Err(ValidationError::InvalidField {
                field: field_name.to_string(),
                message: format!("Invalid URL format '{url_str}': {e}"),
            }),
        }
    }

    /// Elasticsearch index naming rules
    fn validate_index_name(index: &str) -> ValidationResult<()> {
        let invalid = |message: &str| ValidationError::InvalidField {
            field: "elasticsearch_index".to_string(),
            message: format!("Index name '{index}' {message}"),
        };

        if index.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if index == "." || index == ".." {
            return Err(invalid("must not be '.' or '..'"));
        }
        if index.len() > 255 {
            return Err(invalid("must be at most 255 bytes"));
        }
        if index.chars().any(|c| c.is_uppercase()) {
            return Err(invalid("must be lowercase"));
        }
        if index.starts_with(['-', '_', '+']) {
            return Err(invalid("must not start with '-', '_' or '+'"));
        }
        if index.contains(FORBIDDEN_INDEX_CHARS) {
            return Err(invalid("contains a forbidden character"));
        }

        Ok(())
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        let mut message = format!("Found {} configuration error(s):\n", errors.len());
        for (i, error) in errors.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, error));
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfigValidator::validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_hosts() {
        assert!(AppConfigValidator::validate_host("0.0.0.0").is_ok());
        assert!(AppConfigValidator::validate_host("::1").is_ok());
        assert!(AppConfigValidator::validate_host("localhost").is_ok());
        assert!(AppConfigValidator::validate_host("api.internal").is_ok());
        assert!(AppConfigValidator::validate_host("").is_err());
        assert!(AppConfigValidator::validate_host("bad host").is_err());
        assert!(AppConfigValidator::validate_host("-bad.example").is_err());
    }

    #[test]
    fn test_urls() {
        assert!(AppConfigValidator::validate_url("http://localhost:9200", "f").is_ok());
        assert!(AppConfigValidator::validate_url("https://es.example.com", "f").is_ok());
        assert!(AppConfigValidator::validate_url("localhost:9200", "f").is_err());
        assert!(AppConfigValidator::validate_url("http://", "f").is_err());
        assert!(AppConfigValidator::validate_url("", "f").is_err());
        assert!(AppConfigValidator::validate_url("http://:9200", "f").is_err());
        assert!(AppConfigValidator::validate_url("http://a b", "f").is_err());
        assert!(AppConfigValidator::validate_url("ftp://es.example.com", "f").is_err());
    }

    #[test]
    fn test_index_names() {
        assert!(AppConfigValidator::validate_index_name("cities").is_ok());
        assert!(AppConfigValidator::validate_index_name("cities-2024.v1").is_ok());
        assert!(AppConfigValidator::validate_index_name("").is_err());
        assert!(AppConfigValidator::validate_index_name("Cities").is_err());
        assert!(AppConfigValidator::validate_index_name("_cities").is_err());
        assert!(AppConfigValidator::validate_index_name("my cities").is_err());
        assert!(AppConfigValidator::validate_index_name("a/b").is_err());
        assert!(AppConfigValidator::validate_index_name("..").is_err());
    }

    #[test]
    fn test_all_errors_are_reported() {
        let config = AppConfig {
            host: "bad host".to_string(),
            elasticsearch_host: "elasticsearch:9200".to_string(),
            elasticsearch_index: "Cities".to_string(),
            elasticsearch_timeout_secs: 0,
            elasticsearch_basic_auth: true,
            ..AppConfig::default()
        };

        let message = AppConfigValidator::validate(&config).unwrap_err().to_string();
        assert!(message.contains("Found 5 configuration error(s)"));
        assert!(message.contains("elasticsearch_user"));
    }

    #[test]
    fn test_memory_backend_skips_store_checks() {
        let config = AppConfig {
            store_backend: StoreBackend::Memory,
            elasticsearch_host: "not a url".to_string(),
            ..AppConfig::default()
        };
        assert!(AppConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_zero_retries_is_valid() {
        let config = AppConfig {
            elasticsearch_max_retries: 0,
            ..AppConfig::default()
        };
        assert!(AppConfigValidator::validate(&config).is_ok());
    }
}
