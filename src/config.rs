use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_MAX_PENDING_JOBS: usize = 1000;
const DEFAULT_BASE_URL: &str = "about:blank";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read runtime config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to parse base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Settings for one runtime. Every field has a default, so an empty file is
/// a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// `tracing_subscriber` filter directive.
    pub log_filter: String,
    /// Cap on promise jobs drained after each evaluation.
    pub max_pending_jobs: usize,
    /// Base for relative navigations and request URLs.
    pub base_url: String,
    /// Expose elements with an `id` as globals once the page is loaded.
    pub register_id_aliases: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            max_pending_jobs: DEFAULT_MAX_PENDING_JOBS,
            base_url: DEFAULT_BASE_URL.to_string(),
            register_id_aliases: true,
        }
    }
}

impl RuntimeConfig {
    /// Read a YAML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let contents = fs::read_to_string(path)?;
            serde_yaml::from_str::<Option<Self>>(&contents)?.unwrap_or_default()
        } else {
            Self::default()
        };
        config.validate()
    }

    /// Defaults overridden by `GAL_LOG`, `GAL_MAX_JOBS` and `GAL_BASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(filter) = lookup("GAL_LOG") {
            self.log_filter = filter;
        }
        if let Some(raw) = lookup("GAL_MAX_JOBS") {
            self.max_pending_jobs = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: "GAL_MAX_JOBS",
                value: raw.clone(),
            })?;
        }
        if let Some(base) = lookup("GAL_BASE_URL") {
            self.base_url = base;
        }
        self.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        Url::parse(&self.base_url)?;
        if self.max_pending_jobs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max_pending_jobs",
                value: "0".into(),
            });
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let config = RuntimeConfig::load(Path::new("/nonexistent/gal.yaml")).unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "log_filter: gal=trace\nbase_url: http://example.org/\nregister_id_aliases: false"
        )
        .unwrap();
        let config = RuntimeConfig::load(file.path()).unwrap();
        assert_eq!(config.log_filter, "gal=trace");
        assert_eq!(config.base_url, "http://example.org/");
        assert!(!config.register_id_aliases);
        assert_eq!(config.max_pending_jobs, 1000);
    }

    #[test]
    fn empty_file_is_valid() {
        let file = NamedTempFile::new().unwrap();
        assert_eq!(
            RuntimeConfig::load(file.path()).unwrap(),
            RuntimeConfig::default()
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "log_level: debug").unwrap();
        assert!(matches!(
            RuntimeConfig::load(file.path()),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn overrides_apply_and_validate() {
        let vars = HashMap::from([
            ("GAL_MAX_JOBS", "25"),
            ("GAL_BASE_URL", "https://example.com/app/"),
        ]);
        let config = RuntimeConfig::default()
            .with_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.max_pending_jobs, 25);
        assert_eq!(config.base_url, "https://example.com/app/");
        assert_eq!(config.log_filter, "info");

        let bad = RuntimeConfig::default()
            .with_overrides(|name| (name == "GAL_MAX_JOBS").then(|| "lots".to_string()));
        assert!(matches!(bad, Err(ConfigError::InvalidValue { .. })));

        let bad_url = RuntimeConfig::default()
            .with_overrides(|name| (name == "GAL_BASE_URL").then(|| "not a url".to_string()));
        assert!(matches!(bad_url, Err(ConfigError::InvalidUrl(_))));
    }
}
