//! The OpenAI-compatible chat-completions provider.
//!
//! Talks to any endpoint implementing `POST {base_url}/chat/completions`
//! with bearer auth and the standard `{model, messages, temperature,
//! max_tokens}` body. HTTP is performed through the
//! [`crate::transport::Transport`] abstraction rather than a bare
//! `reqwest::Client`, so the mesh-aware address-family fallback applies
//! transparently to LLM traffic on a private network.

use super::{GenerationParams, LlmProvider, LlmResponse, TokenUsage};
use crate::error::{LlmError, TransportError};
use crate::transport::{Method, Transport, TransportResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct OpenAiCompatProvider {
    transport: Arc<dyn Transport>,
    base_url: String,
    api_key: String,
    model: String,
    provider_name: String,
    request_timeout: Duration,
}

impl OpenAiCompatProvider {
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: String,
        api_key: String,
        model: String,
        provider_name: String,
        request_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            base_url,
            api_key,
            model,
            provider_name,
            request_timeout,
        }
    }

    fn auth_headers(&self) -> Vec<(String, String)> {
        vec![
            ("authorization".to_string(), format!("Bearer {}", self.api_key)),
            ("content-type".to_string(), "application/json".to_string()),
        ]
    }

    /// `base_url` is the OpenAI-compatible `/v1` root; the mesh-native
    /// tags listing (Ollama's `/api/tags`) hangs off the server root
    /// instead, so strip a trailing `/v1` before appending `/api/tags`.
    fn mesh_native_root(&self) -> &str {
        self.base_url.strip_suffix("/v1").unwrap_or(&self.base_url)
    }

    async fn send_chat_request(
        &self,
        request: &ChatCompletionRequest<'_>,
        cancel: CancellationToken,
    ) -> Result<TransportResponse, LlmError> {
        let body = serde_json::to_vec(request).map_err(|e| LlmError::Malformed {
            reason: format!("failed to serialize request: {e}"),
            raw_content: None,
        })?;

        self.transport
            .request(
                Method::Post,
                &format!("{}/chat/completions", self.base_url),
                &self.auth_headers(),
                body,
                self.request_timeout,
                cancel,
            )
            .await
            .map_err(LlmError::Transport)
    }
}

fn map_non_success(response: &TransportResponse) -> LlmError {
    if response.status == 429 {
        let retry_after = response
            .header("retry-after")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);
        return LlmError::RateLimited {
            retry_after_secs: retry_after,
        };
    }
    LlmError::Api {
        status: response.status,
        message: String::from_utf8_lossy(&response.bytes).to_string(),
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn complete(
        &self,
        system: &str,
        user_message: &str,
        params: &GenerationParams,
        cancel: CancellationToken,
    ) -> Result<LlmResponse, LlmError> {
        let system_prompt = params.system_prompt.as_deref().unwrap_or(system);

        tracing::debug!(
            provider = %self.provider_name,
            model = %self.model,
            max_tokens = params.max_tokens,
            "LLM request",
        );

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_message,
                },
            ],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream: false,
        };

        let response = self.send_chat_request(&request, cancel).await?;

        if response.status < 200 || response.status >= 300 {
            return Err(map_non_success(&response));
        }

        let body: ChatCompletionResponse = serde_json::from_slice(&response.bytes).map_err(|e| {
            LlmError::Malformed {
                reason: format!("failed to parse chat completion response: {e}"),
                raw_content: Some(String::from_utf8_lossy(&response.bytes).to_string()),
            }
        })?;

        let text = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        let usage = body.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
            input_tokens: u.prompt_tokens.unwrap_or(0),
            output_tokens: u.completion_tokens.unwrap_or(0),
        });

        tracing::debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            chars = text.len(),
            "LLM response",
        );

        Ok(LlmResponse {
            text,
            usage,
            model: body.model,
        })
    }

    async fn list_models(&self, cancel: CancellationToken) -> Result<(), LlmError> {
        let response = self
            .transport
            .request(
                Method::Get,
                &format!("{}/models", self.base_url),
                &self.auth_headers(),
                Vec::new(),
                self.request_timeout,
                cancel,
            )
            .await
            .map_err(LlmError::Transport)?;

        if response.status < 200 || response.status >= 300 {
            return Err(map_non_success(&response));
        }
        Ok(())
    }

    async fn list_tags(&self, cancel: CancellationToken) -> Result<(), LlmError> {
        let response = self
            .transport
            .request(
                Method::Get,
                &format!("{}/api/tags", self.mesh_native_root()),
                &self.auth_headers(),
                Vec::new(),
                self.request_timeout,
                cancel,
            )
            .await
            .map_err(LlmError::Transport)?;

        if response.status < 200 || response.status >= 300 {
            return Err(map_non_success(&response));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ReqwestTransport;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: String) -> OpenAiCompatProvider {
        OpenAiCompatProvider::new(
            Arc::new(ReqwestTransport::new()),
            base_url,
            "test-key".into(),
            "gpt-4o-mini".into(),
            "openai".into(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn complete_success() {
        let server = MockServer::start().await;

        let body = serde_json::json!({
            "choices": [{"message": {"content": "Hello world"}}],
            "model": "gpt-4o-mini",
            "usage": {"prompt_tokens": 10, "completion_tokens": 5}
        });

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let provider = provider(server.uri());

        let resp = provider
            .complete("system", "hello", &GenerationParams::default(), CancellationToken::new())
            .await
            .expect("complete");

        assert_eq!(resp.text, "Hello world");
        assert_eq!(resp.model, "gpt-4o-mini");
        assert_eq!(resp.usage.input_tokens, 10);
        assert_eq!(resp.usage.output_tokens, 5);
    }

    #[tokio::test]
    async fn complete_missing_usage_defaults_to_zero() {
        let server = MockServer::start().await;

        let body = serde_json::json!({
            "choices": [{"message": {"content": "OK"}}],
            "model": "llama3.1"
        });

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let provider = provider(server.uri());

        let resp = provider
            .complete("system", "hello", &GenerationParams::default(), CancellationToken::new())
            .await
            .expect("complete");

        assert_eq!(resp.usage.input_tokens, 0);
        assert_eq!(resp.usage.output_tokens, 0);
    }

    #[tokio::test]
    async fn error_429_maps_to_rate_limited() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429)
                    .append_header("retry-after", "30")
                    .set_body_string("rate limited"),
            )
            .mount(&server)
            .await;

        let provider = provider(server.uri());

        let err = provider
            .complete("system", "hello", &GenerationParams::default(), CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            LlmError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 30),
            other => panic!("expected RateLimited, got: {other}"),
        }
    }

    #[tokio::test]
    async fn error_401_maps_to_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let provider = provider(server.uri());

        let err = provider
            .complete("system", "hello", &GenerationParams::default(), CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("invalid api key"));
            }
            other => panic!("expected Api, got: {other}"),
        }
    }

    #[tokio::test]
    async fn error_500_maps_to_api_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let provider = provider(server.uri());

        let err = provider
            .complete("system", "hello", &GenerationParams::default(), CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            LlmError::Api { status, .. } => assert_eq!(status, 500),
            other => panic!("expected Api, got: {other}"),
        }
    }

    #[tokio::test]
    async fn system_prompt_override() {
        let server = MockServer::start().await;

        let body = serde_json::json!({
            "choices": [{"message": {"content": "overridden"}}],
            "model": "test"
        });

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&body))
            .mount(&server)
            .await;

        let provider = provider(server.uri());

        let params = GenerationParams {
            system_prompt: Some("Override prompt".to_string()),
            ..Default::default()
        };

        let resp = provider
            .complete("original system", "hello", &params, CancellationToken::new())
            .await
            .expect("complete");

        assert_eq!(resp.text, "overridden");
    }

    #[tokio::test]
    async fn list_models_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let provider = provider(server.uri());
        provider.list_models(CancellationToken::new()).await.expect("list_models");
    }

    #[tokio::test]
    async fn list_tags_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": []})))
            .mount(&server)
            .await;

        let provider = provider(server.uri());
        provider.list_tags(CancellationToken::new()).await.expect("list_tags");
    }

    #[test]
    fn mesh_native_root_strips_trailing_v1() {
        let provider = provider("http://localhost:11434/v1".into());
        assert_eq!(provider.mesh_native_root(), "http://localhost:11434");
    }

    #[test]
    fn provider_name() {
        let provider = provider("http://localhost".into());
        assert_eq!(provider.name(), "openai");
    }
}
