//! File-based configuration.
//!
//! Resolution order:
//! 1. Explicit path (`--config` on the CLI)
//! 2. `~/.muninn/config.toml` (user)
//! 3. `/etc/muninn/config.toml` (system)
//!
//! Every section is optional; omitted fields keep their defaults.
//!
//! ```toml
//! [cache]
//! max_size = 5000
//! default_ttl = 600
//!
//! [retry]
//! max_attempts = 3
//! initial_delay = 0.2
//!
//! [[engine]]
//! id = "local-rag"
//! url = "http://127.0.0.1:8100/query"
//! capabilities = ["local", "domain-context"]
//! priority = 10
//! timeout = 5
//!
//! [[engine]]
//! id = "cloud-ai"
//! url = "https://ai.example.com/v1/answer"
//! capabilities = ["cloud", "reasoning"]
//! api_key_env = "CLOUD_AI_KEY"
//! priority = 20
//! ```
//!
//! Durations are given in seconds; fractions are allowed.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::analyzer::{AnalyzerConfig, ComplexityAnalyzer};
use crate::cache::CacheConfig;
use crate::engine::{EngineSettings, RetryConfig};
use crate::types::Capability;
use crate::{MuninnError, Result};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analyzer: AnalyzerConfig,
    pub cache: CacheConfig,
    /// Retry policy for engines that do not set their own.
    pub retry: RetryConfig,
    #[serde(rename = "engine")]
    pub engines: Vec<EngineConfig>,
}

/// One JSON-over-HTTP engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub id: String,
    /// Endpoint receiving `POST` requests.
    pub url: String,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    /// Environment variable holding a bearer token.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Path (relative to `url`'s origin) answering health probes.
    #[serde(default)]
    pub health_path: Option<String>,
    #[serde(flatten)]
    pub settings: EngineSettings,
}

impl Config {
    /// Load configuration from the first file found.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::find(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Err(MuninnError::Configuration(
                "No config file found. Create ~/.muninn/config.toml or /etc/muninn/config.toml"
                    .to_string(),
            )),
        }
    }

    /// Like [`Config::load`], but defaults when no file exists.
    ///
    /// An explicit path that does not exist is still an error.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::find(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            MuninnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        Self::parse(&content).map_err(|e| match e {
            MuninnError::Configuration(msg) => {
                MuninnError::Configuration(format!("{path:?}: {msg}"))
            }
            other => other,
        })
    }

    /// Parse TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| MuninnError::Configuration(format!("Failed to parse config: {e}")))
    }

    fn find(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(MuninnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".muninn").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        let system_config = PathBuf::from("/etc/muninn/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Check every section, including that analyzer regexes compile.
    pub fn validate(&self) -> Result<()> {
        ComplexityAnalyzer::new(self.analyzer.clone())?;
        self.cache.validate()?;
        self.retry.validate()?;

        let mut seen = HashSet::new();
        for engine in &self.engines {
            if engine.id.trim().is_empty() {
                return Err(MuninnError::Configuration(
                    "engine id must not be empty".to_string(),
                ));
            }
            if !seen.insert(engine.id.as_str()) {
                return Err(MuninnError::DuplicateEngine(engine.id.clone()));
            }
            if !engine.url.starts_with("http://") && !engine.url.starts_with("https://") {
                return Err(MuninnError::Configuration(format!(
                    "engine {}: url must be http(s), got {:?}",
                    engine.id, engine.url
                )));
            }
            engine
                .settings
                .validate()
                .map_err(|e| MuninnError::Configuration(format!("engine {}: {e}", engine.id)))?;
        }
        Ok(())
    }
}

/// Serde adapter for durations written as (fractional) seconds.
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = Config::parse("").unwrap();
        assert!(config.engines.is_empty());
        assert_eq!(config.cache, CacheConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn engines_and_durations_parse() {
        let config = Config::parse(
            r#"
            [cache]
            default_ttl = 1.5

            [[engine]]
            id = "local-rag"
            url = "http://127.0.0.1:8100/query"
            capabilities = ["local", "domain-context"]
            priority = 10
            timeout = 0.25
            "#,
        )
        .unwrap();
        assert_eq!(config.cache.default_ttl, Duration::from_millis(1500));
        let engine = &config.engines[0];
        assert_eq!(engine.capabilities, [Capability::Local, Capability::DomainContext]);
        assert_eq!(engine.settings.priority, 10);
        assert_eq!(engine.settings.timeout, Duration::from_millis(250));
        assert!(engine.settings.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn negative_duration_is_a_parse_error() {
        let err = Config::parse("[cache]\ndefault_ttl = -1").unwrap_err();
        assert!(matches!(err, MuninnError::Configuration(_)));
    }

    #[test]
    fn duplicate_engine_ids_rejected() {
        let config = Config::parse(
            r#"
            [[engine]]
            id = "a"
            url = "http://localhost:1"

            [[engine]]
            id = "a"
            url = "http://localhost:2"
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(MuninnError::DuplicateEngine(id)) if id == "a"
        ));
    }

    #[test]
    fn bad_regex_fails_validation() {
        let config = Config::parse(
            r#"
            [analyzer]
            technical_patterns = ["(cpu"]
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(MuninnError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn zero_cache_size_fails_validation() {
        let config = Config::parse("[cache]\nmax_size = 0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/muninn.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
