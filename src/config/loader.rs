use std::{collections::HashMap, path::Path};

use config::{Config, Environment, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::AppConfig;

/// Load configuration from an optional file overlaid by the process environment.
///
/// A missing file is not an error; every field has a default.
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    load_config_with_env(config_path, None)
}

/// Load configuration with an explicit environment map instead of the process
/// environment (`None` reads the real environment).
pub fn load_config_with_env(
    config_path: Option<&str>,
    env: Option<HashMap<String, String>>,
) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(config_path) = config_path {
        let path = Path::new(config_path);
        builder = builder.add_source(
            File::new(
                path.to_str()
                    .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", path.display()))?,
                file_format(path),
            )
            .required(false),
        );
    }

    let environment = Environment::default()
        .try_parsing(true)
        .ignore_empty(true)
        .source(env.map(|vars| vars.into_iter().collect()));

    let settings = builder
        .add_source(environment)
        .build()
        .context("Failed to build configuration")?;

    let app_config: AppConfig = settings
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    Ok(app_config)
}

/// Determine file format based on extension
fn file_format(path: &Path) -> FileFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        Some("ini") => FileFormat::Ini,
        _ => FileFormat::Toml,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::config::models::StoreBackend;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults_with_empty_environment() {
        let config = load_config_with_env(None, env(&[])).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.elasticsearch_index, "cities");
        assert!(!config.debug);
    }

    #[test]
    fn test_environment_overrides() {
        let config = load_config_with_env(
            None,
            env(&[
                ("PORT", "9100"),
                ("DEBUG", "true"),
                ("ELASTICSEARCH_HOST", "http://localhost:9200"),
                ("ELASTICSEARCH_INDEX", "towns"),
                ("ELASTICSEARCH_USER", "elastic"),
                ("STORE_BACKEND", "memory"),
            ]),
        )
        .unwrap();

        assert_eq!(config.port, 9100);
        assert!(config.debug);
        assert_eq!(config.elasticsearch_host, "http://localhost:9200");
        assert_eq!(config.elasticsearch_index, "towns");
        assert_eq!(config.elasticsearch_user.as_deref(), Some("elastic"));
        assert_eq!(config.store_backend, StoreBackend::Memory);
    }

    #[test]
    fn test_file_then_environment() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(
            temp_file,
            "port = 7000\nelasticsearch_index = \"from_file\"\napp_name = \"file-app\"\n"
        )
        .unwrap();

        let config = load_config_with_env(
            temp_file.path().to_str(),
            env(&[("ELASTICSEARCH_INDEX", "from_env")]),
        )
        .unwrap();

        assert_eq!(config.port, 7000);
        assert_eq!(config.app_name, "file-app");
        assert_eq!(config.elasticsearch_index, "from_env");
    }

    #[test]
    fn test_missing_file_is_allowed() {
        let config =
            load_config_with_env(Some("/definitely/not/here/citypop.toml"), env(&[])).unwrap();
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let result = load_config_with_env(None, env(&[("PORT", "not-a-port")]));
        assert!(result.is_err());
    }
}
