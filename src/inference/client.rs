//! OpenAI-compatible inference client.
//!
//! Sends chat completion requests to a configured provider endpoint and
//! returns the completion text, optionally collecting an SSE stream. Retries
//! transient transport failures before giving up.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::capability::ModelCapability;
use super::config::{ModelConfig, ModelRole, ModelsConfig, ProviderConfig};
use super::errors::InferenceError;
use super::streaming::{collect_stream_text, parse_non_streaming_response, parse_sse_stream};
use super::types::{ChatCompletionRequest, ChatMessage, ReasoningToggle};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total request timeout for non-streaming calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Total request timeout for streaming calls.
///
/// Long drafts from the reasoning and writing models can take minutes to
/// stream in full; the non-streaming limit would cut them off mid-answer.
const STREAM_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Base delay between transport attempts (multiplied by the attempt number).
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// Client for one role's model on an OpenAI-compatible endpoint.
pub struct InferenceClient {
    http: HttpClient,
    /// Display label: `"<role>:<model>"`.
    label: String,
    base_url: String,
    api_key: Option<String>,
    model: ModelConfig,
}

impl InferenceClient {
    /// Create a client for `role` from the loaded configuration.
    ///
    /// Does NOT check connectivity; that happens on the first request.
    pub fn for_role(config: &ModelsConfig, role: ModelRole) -> Result<Self, InferenceError> {
        let (model, provider) = config.resolve(role)?;
        Self::new(role, model.clone(), provider)
    }

    pub fn new(
        role: ModelRole,
        model: ModelConfig,
        provider: &ProviderConfig,
    ) -> Result<Self, InferenceError> {
        let timeout = if model.stream {
            STREAM_REQUEST_TIMEOUT
        } else {
            REQUEST_TIMEOUT
        };

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: provider.base_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            label: format!("{role}:{}", model.model),
            base_url: provider.base_url.trim_end_matches('/').to_string(),
            api_key: provider.api_key.clone().filter(|k| !k.is_empty()),
            model,
        })
    }

    /// The configured model identifier.
    pub fn model_name(&self) -> &str {
        &self.model.model
    }

    fn build_request(&self, messages: &[ChatMessage]) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.model.clone(),
            messages: messages.to_vec(),
            temperature: self.model.temperature,
            max_tokens: self.model.max_tokens,
            stream: self.model.stream,
            reasoning: self.model.reasoning.map(|enabled| ReasoningToggle { enabled }),
        }
    }

    // ─── Chat Completion ─────────────────────────────────────────────────

    /// Send a chat completion request, retrying retriable transport errors.
    pub async fn chat_completion(&self, messages: &[ChatMessage]) -> Result<String, InferenceError> {
        let body = self.build_request(messages);
        let attempts = self.model.transport_attempts.max(1);
        let mut last_error: Option<InferenceError> = None;

        for attempt in 1..=attempts {
            let started = Instant::now();
            match self.try_request(&body).await {
                Ok(text) => {
                    tracing::debug!(
                        model = %self.label,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        chars = text.len(),
                        "completion received"
                    );
                    return Ok(text);
                }
                Err(e) if e.is_retriable() && attempt < attempts => {
                    tracing::warn!(
                        model = %self.label,
                        attempt,
                        error = %e,
                        "retriable inference error, retrying"
                    );
                    last_error = Some(e);
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(InferenceError::StreamError {
            reason: "no inference attempt was made".into(),
        }))
    }

    /// Attempt a single request to the endpoint.
    async fn try_request(&self, body: &ChatCompletionRequest) -> Result<String, InferenceError> {
        let url = format!("{}/chat/completions", self.base_url);

        // Metadata only; bodies can be huge
        tracing::info!(
            url = %url,
            model = %body.model,
            message_count = body.messages.len(),
            max_tokens = body.max_tokens,
            stream = body.stream,
            "=== LLM REQUEST ==="
        );

        let mut request = self.http.post(&url).json(body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }
        if body.stream {
            request = request.header("Accept", "text/event-stream");
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    duration_secs: if body.stream {
                        STREAM_REQUEST_TIMEOUT.as_secs()
                    } else {
                        REQUEST_TIMEOUT.as_secs()
                    },
                }
            } else {
                InferenceError::ConnectionFailed {
                    endpoint: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }

        if body.stream {
            return collect_stream_text(parse_sse_stream(response.bytes_stream())).await;
        }

        let body_text = response.text().await.map_err(|e| InferenceError::StreamError {
            reason: format!("failed to read response body: {e}"),
        })?;

        parse_non_streaming_response(&body_text)
    }
}

#[async_trait]
impl ModelCapability for InferenceClient {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, InferenceError> {
        self.chat_completion(messages).await
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ProviderConfig {
        ProviderConfig {
            base_url: "http://localhost:11111/v1/".to_string(),
            api_key: Some(String::new()),
        }
    }

    fn model(stream: bool, reasoning: Option<bool>) -> ModelConfig {
        ModelConfig {
            provider: "local".to_string(),
            model: "model-a".to_string(),
            temperature: 0.3,
            max_tokens: 256,
            reasoning,
            stream,
            transport_attempts: 1,
        }
    }

    #[test]
    fn test_new_normalizes_endpoint_and_key() {
        let client = InferenceClient::new(ModelRole::Planning, model(false, None), &provider()).unwrap();
        assert_eq!(client.base_url, "http://localhost:11111/v1");
        assert!(client.api_key.is_none(), "empty api key should be dropped");
        assert_eq!(client.name(), "planning:model-a");
        assert_eq!(client.model_name(), "model-a");
    }

    #[test]
    fn test_build_request_carries_model_settings() {
        let client =
            InferenceClient::new(ModelRole::Reasoning, model(true, Some(true)), &provider()).unwrap();
        let req = client.build_request(&[ChatMessage::user("hello")]);
        assert!(req.stream);
        assert_eq!(req.max_tokens, 256);
        assert!(req.reasoning.map(|r| r.enabled).unwrap_or(false));
        assert_eq!(req.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_failure() {
        let provider = ProviderConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: None,
        };
        let client = InferenceClient::new(ModelRole::Intent, model(false, None), &provider).unwrap();
        let err = client.generate(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(
            matches!(err, InferenceError::ConnectionFailed { .. } | InferenceError::Timeout { .. }),
            "unexpected error: {err}"
        );
    }
}
