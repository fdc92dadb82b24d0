//! OpenAI-compatible chat completions provider.
//!
//! Works against any endpoint that speaks the `/chat/completions` protocol
//! (OpenAI, Azure-style gateways, vLLM, llama.cpp server).

use super::{
    factory::ProviderFactory,
    secrets::{ApiKey, KeyLookup},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
    GREEDY_TEMPERATURE,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable name for the OpenAI API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const API_KEY: KeyLookup = KeyLookup {
    config_key: "api_key",
    env_var: OPENAI_API_KEY_ENV,
    label: "OpenAI API key",
};

/// OpenAI-compatible provider.
pub struct OpenAiProvider {
    api_key: ApiKey,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &self.api_key)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: ApiKey::inline(api_key),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create from the `provider` config section.
    ///
    /// `api_key` falls back to `OPENAI_API_KEY`; `base_url` defaults to the
    /// public OpenAI endpoint.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let api_key = API_KEY.resolve(config)?;

        let base_url = config["base_url"]
            .as_str()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            base_url,
            client,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

impl<'a> ChatRequest<'a> {
    fn new(messages: &'a [ChatMessage], config: &'a CompletionConfig) -> Self {
        Self {
            model: &config.model,
            messages,
            temperature: GREEDY_TEMPERATURE,
            max_tokens: config.max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = ChatRequest::new(&messages, config);

        // Expose the key only at the point of use
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose())
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::AuthError);
        }

        if !status.is_success() {
            // Gateways do not always send the JSON error envelope
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);

            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        parse_chat_response(body, &config.model)
    }

    async fn health_check(&self) -> bool {
        !self.api_key.is_blank() && self.base_url.starts_with("http")
    }

    fn name(&self) -> &str {
        "openai"
    }
}

fn parse_chat_response(
    body: ChatResponse,
    requested_model: &str,
) -> Result<CompletionResponse, ProviderError> {
    let usage = body
        .usage
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    let choice = body
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::ParseError("response has no choices".to_string()))?;

    Ok(CompletionResponse {
        content: choice.message.content.unwrap_or_default(),
        usage,
        model: body.model.unwrap_or_else(|| requested_model.to_string()),
        stop_reason: choice.finish_reason,
    })
}

/// Factory for OpenAI-compatible providers.
///
/// ## Configuration Format
/// ```yaml
/// provider:
///   type: openai
///   api_key: sk-...                  # optional, falls back to OPENAI_API_KEY
///   base_url: http://localhost:8000/v1  # optional
/// ```
pub struct OpenAiProviderFactory;

impl ProviderFactory for OpenAiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "openai"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.validate_config(config)?;
        Ok(Arc::new(OpenAiProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !API_KEY.is_available(config) {
            return Err(ProviderError::NotConfigured(format!(
                "OpenAI API key required: set 'api_key' in the provider config or {} env",
                OPENAI_API_KEY_ENV
            )));
        }

        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProviderError::NotConfigured(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::secrets::KeySource;

    #[test]
    fn test_provider_creation() {
        let provider = OpenAiProvider::new("test-key");
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_from_config() {
        let config = serde_json::json!({
            "type": "openai",
            "api_key": "config-api-key",
            "base_url": "http://localhost:8000/v1/"
        });

        let provider = OpenAiProvider::from_config(&config).unwrap();
        assert_eq!(provider.base_url, "http://localhost:8000/v1");
        assert_eq!(provider.api_key.expose(), "config-api-key");
        assert_eq!(provider.api_key.source(), KeySource::Config);
    }

    #[test]
    fn test_factory_rejects_bad_base_url() {
        let config = serde_json::json!({ "api_key": "k", "base_url": "localhost:8000" });
        assert!(OpenAiProviderFactory.validate_config(&config).is_err());
        assert!(OpenAiProviderFactory.create(&config).is_err());
    }

    #[test]
    fn test_factory_create() {
        let config = serde_json::json!({ "api_key": "k" });
        let provider = OpenAiProviderFactory.create(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret_key = "sk-super-secret-key-12345";
        let debug_output = format!("{:?}", OpenAiProvider::new(secret_key));
        assert!(!debug_output.contains(secret_key));
        assert!(debug_output.contains("REDACTED"));
    }

    #[tokio::test]
    async fn test_health_check() {
        assert!(OpenAiProvider::new("key").health_check().await);
        assert!(!OpenAiProvider::new("").health_check().await);
    }

    #[test]
    fn test_request_shape() {
        let messages = vec![ChatMessage::user("Question: ...\nAnswer:")];
        let config = CompletionConfig::default();
        let json = serde_json::to_value(ChatRequest::new(&messages, &config)).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["max_tokens"], 10);
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_request_is_greedy_for_any_run_config() {
        let run = choicebench_core::RunConfig::from_yaml("models: [gpt-4o]\nmax_tokens: 3")
            .unwrap();
        let config = CompletionConfig::from(&run);
        let messages = vec![ChatMessage::user("Answer:")];

        let json = serde_json::to_value(ChatRequest::new(&messages, &config)).unwrap();
        assert_eq!(json["model"], "gpt-4o");
        assert_eq!(json["max_tokens"], 3);
        assert_eq!(json["temperature"], 0.0);
    }

    #[test]
    fn test_parse_chat_response() {
        let body: ChatResponse = serde_json::from_str(
            r#"{
                "model": "gpt-4o-mini-2024-07-18",
                "choices": [{
                    "message": {"role": "assistant", "content": "B"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 120, "completion_tokens": 1, "total_tokens": 121}
            }"#,
        )
        .unwrap();

        let response = parse_chat_response(body, "gpt-4o-mini").unwrap();
        assert_eq!(response.content, "B");
        assert_eq!(response.model, "gpt-4o-mini-2024-07-18");
        assert_eq!(response.usage.total(), 121);
        assert_eq!(response.stop_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_parse_empty_choices() {
        let body: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            parse_chat_response(body, "m"),
            Err(ProviderError::ParseError(_))
        ));
    }

    #[test]
    fn test_null_content_is_empty_answer() {
        let body: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        let response = parse_chat_response(body, "m").unwrap();
        assert_eq!(response.content, "");
        assert_eq!(response.model, "m");
    }
}
