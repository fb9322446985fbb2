//! Runtime configuration.
//!
//! Configuration is loaded once (YAML or JSON), validated, and then shared
//! read-only by the fetcher, the stages and the scheduler. Durations use
//! humantime notation (`"10s"`, `"1m 30s"`).
//!
//! ```yaml
//! http:
//!   timeouts:
//!     alphafold_structure: { connect: 10s, read: 45s }
//!   retry:
//!     max_attempts: 3
//!     retry_on_status: [429, 500, 502, 503, 504]
//!     backoff_base: 1s
//!     backoff_multiplier: 2.0
//!     backoff_max: 10s
//! execution:
//!   max_concurrent_units: 4
//!   unit_deadline: 5m
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::http::classes;
use crate::providers::CompletionConfig;
use crate::resilience::RetryPolicy;

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// (connect, read) timeout pair for one endpoint class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeoutPair {
    #[serde(with = "humantime_duration")]
    pub connect: Duration,
    #[serde(with = "humantime_duration")]
    pub read: Duration,
}

impl TimeoutPair {
    pub const fn secs(connect: u64, read: u64) -> Self {
        Self {
            connect: Duration::from_secs(connect),
            read: Duration::from_secs(read),
        }
    }
}

fn default_timeouts() -> BTreeMap<String, TimeoutPair> {
    [
        (classes::ALPHAFOLD_METADATA, TimeoutPair::secs(10, 20)),
        (classes::ALPHAFOLD_STRUCTURE, TimeoutPair::secs(10, 45)),
        (classes::UNIPROT_SEARCH, TimeoutPair::secs(10, 20)),
        (classes::UNIPROT_ANNOTATION, TimeoutPair::secs(10, 15)),
        (classes::AZURE_OPENAI, TimeoutPair::secs(10, 60)),
        (classes::DEFAULT, TimeoutPair::secs(10, 30)),
    ]
    .into_iter()
    .map(|(class, pair)| (class.to_string(), pair))
    .collect()
}

/// HTTP settings shared by every outbound call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Timeouts per endpoint class. Classes missing here use `default`.
    pub timeouts: BTreeMap<String, TimeoutPair>,
    pub retry: RetryPolicy,
    /// Max cached GET bodies per run; 0 disables the cache.
    pub cache_capacity: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeouts: default_timeouts(),
            retry: RetryPolicy::default(),
            cache_capacity: 256,
        }
    }
}

impl HttpConfig {
    /// Timeouts for a class, falling back to the `default` class.
    pub fn timeouts_for(&self, class: &str) -> TimeoutPair {
        self.timeouts
            .get(class)
            .or_else(|| self.timeouts.get(classes::DEFAULT))
            .copied()
            .unwrap_or(TimeoutPair::secs(10, 30))
    }
}

/// Upstream data sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub alphafold_base_url: String,
    pub uniprot_base_url: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            alphafold_base_url: "https://alphafold.ebi.ac.uk/api".to_string(),
            uniprot_base_url: "https://rest.uniprot.org/uniprotkb".to_string(),
        }
    }
}

/// Text-generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: Option<String>,
    pub deployment: String,
    pub api_version: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "azure_openai".to_string(),
            endpoint: None,
            deployment: "gpt-4o".to_string(),
            api_version: "2024-02-15-preview".to_string(),
            temperature: 0.3,
            max_tokens: 1500,
        }
    }
}

impl LlmConfig {
    /// Completion settings for every reasoning call.
    pub fn completion(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.deployment.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Units whose pipelines may run at the same time. 1 is fully sequential.
    pub max_concurrent_units: usize,

    #[serde(with = "humantime_duration::option")]
    pub unit_deadline: Option<Duration>,

    #[serde(with = "humantime_duration::option")]
    pub run_deadline: Option<Duration>,

    /// Structure confidence (0-100) below which the plan adjuster reacts.
    pub low_confidence_threshold: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_units: 1,
            unit_deadline: None,
            run_deadline: None,
            low_confidence_threshold: 50.0,
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    pub http: HttpConfig,
    pub sources: SourcesConfig,
    pub llm: LlmConfig,
    pub execution: ExecutionConfig,
}

impl RuntimeConfig {
    /// Parse from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file, choosing the format by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// Apply `AZURE_OPENAI_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(endpoint) = std::env::var("AZURE_OPENAI_ENDPOINT") {
            self.llm.endpoint = Some(endpoint);
        }
        if let Ok(deployment) = std::env::var("AZURE_OPENAI_DEPLOYMENT") {
            self.llm.deployment = deployment;
        }
        if let Ok(version) = std::env::var("AZURE_OPENAI_API_VERSION") {
            self.llm.api_version = version;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.http.retry.validate()?;

        for (class, pair) in &self.http.timeouts {
            if pair.connect.is_zero() || pair.read.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "http.timeouts.{} must be non-zero",
                    class
                )));
            }
        }

        for (field, url) in [
            ("sources.alphafold_base_url", &self.sources.alphafold_base_url),
            ("sources.uniprot_base_url", &self.sources.uniprot_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::Invalid(format!(
                    "{} must start with http:// or https://",
                    field
                )));
            }
        }

        if self.llm.provider != "azure_openai" {
            return Err(ConfigError::Invalid(format!(
                "llm.provider '{}' is not supported",
                self.llm.provider
            )));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(
                "llm.temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.execution.max_concurrent_units == 0 {
            return Err(ConfigError::Invalid(
                "execution.max_concurrent_units must be at least 1".to_string(),
            ));
        }

        if !(0.0..=100.0).contains(&self.execution.low_confidence_threshold) {
            return Err(ConfigError::Invalid(
                "execution.low_confidence_threshold must be between 0 and 100".to_string(),
            ));
        }

        Ok(())
    }
}

/// Serde helpers for humantime durations.
pub(crate) mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => super::serialize(d, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(deserializer)? {
                Some(text) => humantime::parse_duration(&text)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.http.timeouts_for(classes::ALPHAFOLD_STRUCTURE),
            TimeoutPair::secs(10, 45)
        );
        assert_eq!(config.http.retry.max_attempts, 3);
        assert_eq!(config.execution.max_concurrent_units, 1);
        assert_eq!(config.llm.deployment, "gpt-4o");
    }

    #[test]
    fn test_unknown_class_uses_default() {
        let config = HttpConfig::default();
        assert_eq!(config.timeouts_for("pdb_lookup"), TimeoutPair::secs(10, 30));
    }

    #[test]
    fn test_yaml_with_humantime() {
        let yaml = r#"
http:
  timeouts:
    default: { connect: 2s, read: 5s }
  retry:
    max_attempts: 5
    backoff_base: 500ms
    backoff_max: 4s
execution:
  max_concurrent_units: 4
  unit_deadline: 2m
"#;
        let config = RuntimeConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.http.timeouts_for("anything"), TimeoutPair::secs(2, 5));
        assert_eq!(config.http.retry.backoff_base, Duration::from_millis(500));
        assert_eq!(config.http.retry.backoff_multiplier, 2.0);
        assert_eq!(config.execution.unit_deadline, Some(Duration::from_secs(120)));
        assert_eq!(config.execution.run_deadline, None);
        assert_eq!(config.sources, SourcesConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let yaml = "execution:\n  max_concurrent_units: 0\n";
        assert!(matches!(
            RuntimeConfig::from_yaml(yaml),
            Err(ConfigError::Invalid(_))
        ));

        let json = r#"{"sources": {"alphafold_base_url": "ftp://example"}}"#;
        assert!(RuntimeConfig::from_json(json).is_err());

        let json = r#"{"http": {"retry": {"backoff_base": "not a duration"}}}"#;
        assert!(matches!(
            RuntimeConfig::from_json(json),
            Err(ConfigError::JsonError(_))
        ));
    }

    #[test]
    fn test_round_trip_keeps_durations_readable() {
        let yaml = serde_yaml::to_string(&RuntimeConfig::default()).unwrap();
        assert!(yaml.contains("backoff_max: 10s"));
    }
}
