//! API key resolution for inference providers.
//!
//! A key is looked up in the `provider` config section first and then in an
//! environment variable. Blank values count as missing. Once resolved the key
//! lives in a [`SecretString`], whose `Debug` output is redacted, and is only
//! read back with [`ApiKey::expose`] when the request header is set.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Where to look for a provider's key.
#[derive(Debug, Clone, Copy)]
pub struct KeyLookup {
    /// Field of the `provider` section
    pub config_key: &'static str,

    /// Environment variable consulted when the field is absent
    pub env_var: &'static str,

    /// Human-readable name for error messages
    pub label: &'static str,
}

impl KeyLookup {
    fn in_section(&self, section: &JsonValue) -> Option<String> {
        section[self.config_key]
            .as_str()
            .filter(|value| !value.trim().is_empty())
            .map(str::to_string)
    }

    fn in_env(&self) -> Option<String> {
        std::env::var(self.env_var)
            .ok()
            .filter(|value| !value.trim().is_empty())
    }

    /// Resolve the key, config first.
    pub fn resolve(&self, section: &JsonValue) -> Result<ApiKey, ProviderError> {
        if let Some(value) = self.in_section(section) {
            return Ok(ApiKey::new(value, KeySource::Config));
        }
        if let Some(value) = self.in_env() {
            return Ok(ApiKey::new(value, KeySource::Env(self.env_var)));
        }
        Err(ProviderError::NotConfigured(format!(
            "{} missing: set provider.{} or {}",
            self.label, self.config_key, self.env_var
        )))
    }

    /// Whether [`resolve`](Self::resolve) would succeed.
    pub fn is_available(&self, section: &JsonValue) -> bool {
        self.in_section(section).is_some() || self.in_env().is_some()
    }
}

/// Where a resolved key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Config,
    Env(&'static str),
    Inline,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Config => f.write_str("provider config"),
            KeySource::Env(var) => write!(f, "${var}"),
            KeySource::Inline => f.write_str("inline"),
        }
    }
}

/// A provider API key.
#[derive(Debug)]
pub struct ApiKey {
    secret: SecretString,
    source: KeySource,
}

impl ApiKey {
    pub fn new(value: impl Into<String>, source: KeySource) -> Self {
        Self {
            secret: SecretString::from(value.into()),
            source,
        }
    }

    /// A key passed directly in code.
    pub fn inline(value: impl Into<String>) -> Self {
        Self::new(value, KeySource::Inline)
    }

    /// The raw key.
    pub fn expose(&self) -> &str {
        self.secret.expose_secret()
    }

    pub fn is_blank(&self) -> bool {
        self.expose().trim().is_empty()
    }

    pub fn source(&self) -> KeySource {
        self.source
    }
}
