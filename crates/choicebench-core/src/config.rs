//! Run configuration loaded from YAML.
//!
//! Every field except `models` has a default. Unknown keys are rejected, so
//! a misspelled or unsupported setting fails loudly. Decoding is always
//! greedy and has no setting. The configuration is validated once at
//! startup; an invalid file aborts before any call is made.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Retry settings for inference calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    /// Total attempts per call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(default = "default_min_delay", with = "duration_str")]
    pub min_delay: Duration,

    /// Upper bound on any single delay
    #[serde(default = "default_max_delay", with = "duration_str")]
    pub max_delay: Duration,

    /// Growth factor between consecutive delays
    #[serde(default = "default_factor")]
    pub factor: f32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            min_delay: default_min_delay(),
            max_delay: default_max_delay(),
            factor: default_factor(),
        }
    }
}

/// Configuration for a benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Model identifiers, evaluated in order
    #[serde(default)]
    pub models: Vec<String>,

    /// Few-shot exemplars per prompt
    #[serde(default = "default_n_fewshot")]
    pub n_fewshot: usize,

    /// Evaluate only the first N items of each subject
    #[serde(default)]
    pub max_samples: Option<usize>,

    /// Concurrent inference calls per subject
    #[serde(default = "default_num_concurrent")]
    pub num_concurrent: usize,

    /// Directory for results and summary
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory holding one `<subject>.jsonl` per subject
    #[serde(default = "default_dataset_dir")]
    pub dataset_dir: PathBuf,

    /// Restrict the run to these subjects (all when unset)
    #[serde(default)]
    pub subjects: Option<Vec<String>>,

    /// Output token cap per call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-request timeout
    #[serde(default = "default_request_timeout", with = "duration_str")]
    pub request_timeout: Duration,

    /// Retry policy for inference calls
    #[serde(default)]
    pub retry: RetrySettings,

    /// Provider section, passed to the provider factory.
    /// `type` selects the provider; remaining keys are provider-specific.
    #[serde(default = "default_provider")]
    pub provider: JsonValue,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            n_fewshot: default_n_fewshot(),
            max_samples: None,
            num_concurrent: default_num_concurrent(),
            output_dir: default_output_dir(),
            dataset_dir: default_dataset_dir(),
            subjects: None,
            max_tokens: default_max_tokens(),
            request_timeout: default_request_timeout(),
            retry: RetrySettings::default(),
            provider: default_provider(),
        }
    }
}

impl RunConfig {
    /// Create a config for the given models with default settings.
    pub fn new(models: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            models: models.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Parse and validate a config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a config from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = Self::from_yaml(&contents)?;
        tracing::debug!(
            path = %path.display(),
            models = config.models.len(),
            n_fewshot = config.n_fewshot,
            num_concurrent = config.num_concurrent,
            "Loaded run configuration"
        );
        Ok(config)
    }

    /// The provider type named in the `provider` section.
    pub fn provider_type(&self) -> &str {
        self.provider["type"].as_str().unwrap_or(DEFAULT_PROVIDER)
    }

    /// Validate field values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::MissingField("models".to_string()));
        }

        let mut seen = std::collections::HashSet::new();
        for model in &self.models {
            if model.trim().is_empty() {
                return Err(invalid("model identifiers must not be empty"));
            }
            if !seen.insert(model) {
                return Err(invalid(format!("duplicate model: {model}")));
            }
        }

        if self.num_concurrent == 0 {
            return Err(invalid("num_concurrent must be at least 1"));
        }

        if self.max_samples == Some(0) {
            return Err(invalid("max_samples must be positive when set"));
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("output_dir".to_string()));
        }

        if self.dataset_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("dataset_dir".to_string()));
        }

        if let Some(subjects) = &self.subjects {
            if subjects.is_empty() {
                return Err(invalid("subjects must list at least one subject when set"));
            }
        }

        if self.max_tokens == 0 {
            return Err(invalid("max_tokens must be at least 1"));
        }

        if self.request_timeout.is_zero() {
            return Err(invalid("request_timeout must be positive"));
        }

        self.validate_retry()?;

        if !self.provider.is_object() {
            return Err(invalid("provider must be a mapping"));
        }

        Ok(())
    }

    fn validate_retry(&self) -> Result<(), ConfigError> {
        let retry = &self.retry;
        if retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts must be at least 1"));
        }
        if retry.min_delay > retry.max_delay {
            return Err(invalid(format!(
                "retry.min_delay ({}) exceeds retry.max_delay ({})",
                humantime::format_duration(retry.min_delay),
                humantime::format_duration(retry.max_delay)
            )));
        }
        if retry.factor.is_nan() || retry.factor < 1.0 {
            return Err(invalid("retry.factor must be at least 1.0"));
        }
        Ok(())
    }
}

/// Provider used when the config names none.
pub const DEFAULT_PROVIDER: &str = "openai";

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

fn default_n_fewshot() -> usize {
    5
}

fn default_num_concurrent() -> usize {
    10
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_dataset_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_max_tokens() -> u32 {
    10
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    5
}

fn default_min_delay() -> Duration {
    Duration::from_secs(4)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_factor() -> f32 {
    2.0
}

fn default_provider() -> JsonValue {
    serde_json::json!({ "type": DEFAULT_PROVIDER })
}

/// Durations written as humantime strings (`"4s"`, `"1m 30s"`).
mod duration_str {
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
}
