//! OpenAiCompatGenerator -- [`TextGenerator`] over any OpenAI-compatible
//! `/chat/completions` endpoint (OpenAI, Ollama, vLLM, LM Studio, ...).
//!
//! The prompt is sent as a single user message. When an output schema hint
//! is given it is forwarded as `response_format: {type: "json_schema"}` so
//! providers that support structured output return the memory object
//! directly; providers that ignore it still produce text the two-stage
//! parser can handle.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use rapport_core::llm::TextGenerator;
use rapport_types::config::GeneratorConfig;
use rapport_types::llm::{GenerationError, OutputJsonSchema};

/// Text generator backed by an OpenAI-compatible chat completions API.
pub struct OpenAiCompatGenerator {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: Option<f64>,
}

// No Debug derive: the client and key stay out of logs.

impl OpenAiCompatGenerator {
    /// Create a generator from connection settings.
    ///
    /// `api_key` may be `None` for local endpoints that do not authenticate.
    pub fn new(config: &GeneratorConfig, api_key: Option<SecretString>) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::InvalidRequest(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request<'a>(
        &'a self,
        prompt: &'a str,
        hint: Option<&'a OutputJsonSchema>,
    ) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatRequestMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            response_format: hint.map(|json_schema| ResponseFormat::JsonSchema { json_schema }),
        }
    }
}

impl TextGenerator for OpenAiCompatGenerator {
    fn name(&self) -> &str {
        "openai_compat"
    }

    #[tracing::instrument(
        name = "generate",
        skip(self, prompt, hint),
        fields(
            gen_ai.operation.name = "chat",
            gen_ai.provider.name = "openai_compat",
            gen_ai.request.model = %self.model,
            gen_ai.request.max_tokens = self.max_tokens,
            gen_ai.response.finish_reasons = tracing::field::Empty,
            gen_ai.usage.output_tokens = tracing::field::Empty,
        )
    )]
    async fn generate(
        &self,
        prompt: &str,
        hint: Option<&OutputJsonSchema>,
    ) -> Result<Option<String>, GenerationError> {
        let body = self.build_request(prompt, hint);

        let mut request = self.client.post(self.url()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| GenerationError::Provider {
            message: format!("HTTP request failed: {e}"),
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after_ms);
            let error_body = response.text().await.unwrap_or_default();
            return Err(map_status(status.as_u16(), &error_body, retry_after));
        }

        let completion: ChatResponse = response.json().await.map_err(|e| {
            GenerationError::Deserialization(format!("failed to parse response: {e}"))
        })?;

        let span = tracing::Span::current();
        if let Some(reason) = completion.choices.first().and_then(|c| c.finish_reason.as_deref()) {
            span.record("gen_ai.response.finish_reasons", reason);
        }
        if let Some(usage) = &completion.usage {
            span.record("gen_ai.usage.output_tokens", usage.completion_tokens);
        }

        Ok(completion.into_text())
    }
}

/// Map a non-success HTTP status to a [`GenerationError`].
fn map_status(status: u16, body: &str, retry_after_ms: Option<u64>) -> GenerationError {
    match status {
        401 | 403 => GenerationError::AuthenticationFailed,
        429 => GenerationError::RateLimited { retry_after_ms },
        400 | 404 | 422 => GenerationError::InvalidRequest(format!("HTTP {status}: {body}")),
        _ => GenerationError::Provider {
            message: format!("HTTP {status}: {body}"),
        },
    }
}

/// `Retry-After` in delta-seconds form, as milliseconds.
fn parse_retry_after_ms(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().map(|secs| secs.saturating_mul(1000))
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatRequestMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseFormat<'a> {
    JsonSchema { json_schema: &'a OutputJsonSchema },
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

impl ChatResponse {
    /// Text of the first choice. No choices, or a choice without content, is
    /// an empty response.
    fn into_text(self) -> Option<String> {
        self.choices.into_iter().next().and_then(|c| c.message.content)
    }
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
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn generator() -> OpenAiCompatGenerator {
        let config = GeneratorConfig {
            base_url: "http://localhost:11434/v1/".to_string(),
            model: "llama3.1".to_string(),
            temperature: Some(0.2),
            ..GeneratorConfig::default()
        };
        OpenAiCompatGenerator::new(&config, None).unwrap()
    }

    #[test]
    fn url_joins_base_without_double_slash() {
        assert_eq!(generator().url(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn request_without_hint_is_plain_chat() {
        let generator = generator();
        let body = serde_json::to_value(generator.build_request("hello", None)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "llama3.1",
                "messages": [{"role": "user", "content": "hello"}],
                "max_tokens": 1024,
                "temperature": 0.2,
            })
        );
    }

    #[test]
    fn request_with_hint_carries_json_schema_format() {
        let generator = generator();
        let hint = OutputJsonSchema {
            name: "MemoryExtraction".to_string(),
            schema: json!({"type": "object"}),
            strict: Some(true),
        };
        let body = serde_json::to_value(generator.build_request("hello", Some(&hint))).unwrap();
        assert_eq!(
            body["response_format"],
            json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "MemoryExtraction",
                    "schema": {"type": "object"},
                    "strict": true,
                }
            })
        );
    }

    #[test]
    fn response_text_comes_from_first_choice() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [
                {"message": {"role": "assistant", "content": "{\"summary\":\"x\"}"}, "finish_reason": "stop"}
            ],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5}
        }))
        .unwrap();
        assert_eq!(response.into_text().as_deref(), Some("{\"summary\":\"x\"}"));
    }

    #[test]
    fn empty_choices_is_no_text() {
        let response: ChatResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(response.into_text().is_none());

        let response: ChatResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": null}}]})).unwrap();
        assert!(response.into_text().is_none());
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(map_status(401, "", None), GenerationError::AuthenticationFailed));
        assert!(matches!(
            map_status(429, "", Some(2000)),
            GenerationError::RateLimited { retry_after_ms: Some(2000) }
        ));
        assert!(matches!(map_status(400, "bad", None), GenerationError::InvalidRequest(_)));
        match map_status(503, "overloaded", None) {
            GenerationError::Provider { message } => assert_eq!(message, "HTTP 503: overloaded"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn retry_after_seconds() {
        assert_eq!(parse_retry_after_ms("3"), Some(3000));
        assert_eq!(parse_retry_after_ms("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(
            parse_retry_after_ms("18446744073709551615"),
            Some(u64::MAX)
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_provider_error() {
        let config = GeneratorConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..GeneratorConfig::default()
        };
        let generator = OpenAiCompatGenerator::new(&config, None).unwrap();
        let result = generator.generate("hi", None).await;
        assert!(matches!(result, Err(GenerationError::Provider { .. })));
    }
}
