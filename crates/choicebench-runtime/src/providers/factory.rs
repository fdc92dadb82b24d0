//! Provider factories keyed by the `type` field of the config's
//! `provider` section.
//!
//! ```ignore
//! let registry = ProviderRegistry::with_defaults();
//! let provider = registry.create_from_config(&run_config.provider)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{LlmProvider, ProviderError};

/// Creates providers of one type from their config section.
pub trait ProviderFactory: Send + Sync {
    /// Value of `provider.type` this factory answers to, e.g. `"openai"`.
    fn provider_type(&self) -> &'static str;

    /// Create a provider from its config section.
    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError>;

    /// Validate a config section without creating a provider.
    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError>;
}

/// Registry of available provider factories.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any with the same type.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories
            .insert(factory.provider_type().to_string(), factory);
    }

    /// Create a provider of `provider_type` from `config`.
    pub fn create(
        &self,
        provider_type: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.factory(provider_type)?.create(config)
    }

    /// Create a provider from a config section carrying its own `type`.
    pub fn create_from_config(
        &self,
        config: &JsonValue,
    ) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.create(section_type(config), config)
    }

    /// Validate a config section carrying its own `type`.
    pub fn validate(&self, config: &JsonValue) -> Result<(), ProviderError> {
        self.factory(section_type(config))?.validate_config(config)
    }

    /// List available provider types.
    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_provider(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    fn factory(&self, provider_type: &str) -> Result<&Arc<dyn ProviderFactory>, ProviderError> {
        self.factories.get(provider_type).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Unknown provider type: '{}'. Available: {:?}",
                provider_type,
                self.available_types()
            ))
        })
    }

    /// Registry with every built-in provider registered.
    #[cfg(feature = "openai")]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::OpenAiProviderFactory));
        registry
    }

    /// Registry with every built-in provider registered.
    #[cfg(not(feature = "openai"))]
    pub fn with_defaults() -> Self {
        Self::new()
    }
}

fn section_type(config: &JsonValue) -> &str {
    config["type"]
        .as_str()
        .unwrap_or(choicebench_core::DEFAULT_PROVIDER)
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, CompletionConfig, CompletionResponse, TokenUsage};
    use async_trait::async_trait;

    struct EchoProvider {
        name: String,
    }

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse {
                content: messages.last().map(|m| m.content.clone()).unwrap_or_default(),
                usage: TokenUsage::default(),
                model: config.model.clone(),
                stop_reason: None,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    struct EchoProviderFactory;

    impl ProviderFactory for EchoProviderFactory {
        fn provider_type(&self) -> &'static str {
            "echo"
        }

        fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
            self.validate_config(config)?;
            let name = config["name"].as_str().unwrap_or("echo").to_string();
            Ok(Arc::new(EchoProvider { name }))
        }

        fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
            if config.get("name").is_some_and(|n| !n.is_string()) {
                return Err(ProviderError::NotConfigured("name must be a string".into()));
            }
            Ok(())
        }
    }

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoProviderFactory));
        registry
    }

    #[test]
    fn test_create_from_config_section() {
        let config = serde_json::json!({ "type": "echo", "name": "local-echo" });
        let provider = registry().create_from_config(&config).unwrap();
        assert_eq!(provider.name(), "local-echo");
    }

    #[test]
    fn test_unknown_provider_type() {
        let config = serde_json::json!({ "type": "carrier-pigeon" });
        match registry().create_from_config(&config) {
            Err(ProviderError::NotConfigured(msg)) => {
                assert!(msg.contains("Unknown provider type"));
                assert!(msg.contains("echo"));
            }
            other => panic!(
                "Expected NotConfigured, got {:?}",
                other.map(|p| p.name().to_string())
            ),
        }
    }

    #[test]
    fn test_validate() {
        let registry = registry();
        assert!(registry.validate(&serde_json::json!({ "type": "echo" })).is_ok());
        assert!(registry
            .validate(&serde_json::json!({ "type": "echo", "name": 7 }))
            .is_err());
        assert!(registry.validate(&serde_json::json!({ "type": "nope" })).is_err());
    }

    #[test]
    fn test_available_types() {
        let mut registry = ProviderRegistry::new();
        assert!(registry.available_types().is_empty());

        registry.register(Arc::new(EchoProviderFactory));
        assert_eq!(registry.available_types(), vec!["echo"]);
        assert!(registry.has_provider("echo"));
    }

    #[cfg(feature = "openai")]
    #[test]
    fn test_defaults_include_openai() {
        assert!(ProviderRegistry::with_defaults().has_provider("openai"));
    }
}
