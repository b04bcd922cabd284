//! Configuration data structures for citypop.
//!
//! `AppConfig` keys map one-to-one onto environment variable names (lowercased),
//! so `ELASTICSEARCH_HOST` populates `elasticsearch_host`. Every field has a
//! default, which keeps an empty environment runnable.
use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

fn default_app_name() -> String {
    "city-population-api".to_string()
}

fn default_app_version() -> String {
    "1.0.0".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_elasticsearch_host() -> String {
    "http://elasticsearch:9200".to_string()
}

fn default_elasticsearch_index() -> String {
    "cities".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

/// Which [`CityStore`](crate::ports::CityStore) adapter the binary wires up.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Elasticsearch,
    /// Process-local map, for development without a cluster
    Memory,
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Elasticsearch => f.write_str("elasticsearch"),
            StoreBackend::Memory => f.write_str("memory"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_app_version")]
    pub app_version: String,
    /// Switches logging to the human-readable console format at debug level
    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub store_backend: StoreBackend,

    #[serde(default = "default_elasticsearch_host")]
    pub elasticsearch_host: String,
    #[serde(default = "default_elasticsearch_index")]
    pub elasticsearch_index: String,
    #[serde(default)]
    pub elasticsearch_user: Option<String>,
    #[serde(default, skip_serializing)]
    pub elasticsearch_password: Option<String>,
    /// Send `elasticsearch_user` / `elasticsearch_password` as basic auth.
    /// Off by default: credentials are accepted but not used unless enabled.
    #[serde(default)]
    pub elasticsearch_basic_auth: bool,
    #[serde(default = "default_timeout_secs")]
    pub elasticsearch_timeout_secs: u64,
    /// Retries after the first failed connect-phase request (0 disables retrying)
    #[serde(default = "default_max_retries")]
    pub elasticsearch_max_retries: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            app_version: default_app_version(),
            debug: false,
            host: default_host(),
            port: default_port(),
            store_backend: StoreBackend::default(),
            elasticsearch_host: default_elasticsearch_host(),
            elasticsearch_index: default_elasticsearch_index(),
            elasticsearch_user: None,
            elasticsearch_password: None,
            elasticsearch_basic_auth: false,
            elasticsearch_timeout_secs: default_timeout_secs(),
            elasticsearch_max_retries: default_max_retries(),
        }
    }
}

impl AppConfig {
    /// `host:port` string the HTTP listener binds to.
    pub fn listen_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            // Bare IPv6 literal
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Connection settings for the Elasticsearch adapter.
    pub fn elasticsearch(&self) -> ElasticsearchConfig {
        let credentials = if self.elasticsearch_basic_auth {
            self.elasticsearch_user.clone().map(|user| Credentials {
                username: user,
                password: self.elasticsearch_password.clone(),
            })
        } else {
            None
        };

        ElasticsearchConfig {
            url: self.elasticsearch_host.trim_end_matches('/').to_string(),
            index: self.elasticsearch_index.clone(),
            request_timeout: Duration::from_secs(self.elasticsearch_timeout_secs),
            max_retries: self.elasticsearch_max_retries,
            credentials,
        }
    }
}

/// Basic auth credentials for the store.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Settings consumed by [`ElasticsearchStore`](crate::adapters::ElasticsearchStore).
#[derive(Debug, Clone)]
pub struct ElasticsearchConfig {
    /// Base URL without trailing slash
    pub url: String,
    pub index: String,
    pub request_timeout: Duration,
    /// Retries after the first attempt of a connect-phase request, so each
    /// request is sent at most `max_retries + 1` times
    pub max_retries: u32,
    pub credentials: Option<Credentials>,
}

impl ElasticsearchConfig {
    pub fn new(url: impl Into<String>, index: impl Into<String>) -> Self {
        let url: String = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            index: index.into(),
            request_timeout: Duration::from_secs(default_timeout_secs()),
            max_retries: default_max_retries(),
            credentials: None,
        }
    }

    /// Set the per-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the connect-phase retry budget
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Enable basic auth
    pub fn credentials(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.app_name, "city-population-api");
        assert_eq!(config.listen_addr(), "0.0.0.0:8000");
        assert_eq!(config.store_backend, StoreBackend::Elasticsearch);

        let es = config.elasticsearch();
        assert_eq!(es.url, "http://elasticsearch:9200");
        assert_eq!(es.index, "cities");
        assert_eq!(es.request_timeout, Duration::from_secs(30));
        assert_eq!(es.max_retries, 3);
        assert!(es.credentials.is_none());
    }

    #[test]
    fn test_credentials_require_flag() {
        let mut config = AppConfig {
            elasticsearch_user: Some("elastic".to_string()),
            elasticsearch_password: Some("changeme".to_string()),
            ..AppConfig::default()
        };
        assert!(config.elasticsearch().credentials.is_none());

        config.elasticsearch_basic_auth = true;
        let credentials = config.elasticsearch().credentials.unwrap();
        assert_eq!(credentials.username, "elastic");
        assert!(!format!("{credentials:?}").contains("changeme"));
    }

    #[test]
    fn test_ipv6_listen_addr() {
        let config = AppConfig {
            host: "::1".to_string(),
            port: 9000,
            ..AppConfig::default()
        };
        assert_eq!(config.listen_addr(), "[::1]:9000");
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let es = ElasticsearchConfig::new("http://localhost:9200/", "cities");
        assert_eq!(es.url, "http://localhost:9200");
    }
}
