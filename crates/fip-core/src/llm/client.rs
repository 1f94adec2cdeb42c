//! Retry, circuit-breaking, and structured-JSON completion layered
//! around any [`LlmProvider`].
//!
//! The three-state breaker lives in [`super::circuit`];
//! [`RetryingLlmClient::chat_completion_json`] layers a
//! parse → repair → corrective-retry ladder on top for callers that
//! need a validated JSON object back rather than raw text.

use super::circuit::{CircuitBreaker, Permit};
use super::{GenerationParams, LlmProvider, LlmResponse};
use crate::error::{LlmError, TransportError};
use crate::json_repair;
use rand::Rng;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_secs(1);
const JITTER_FRACTION: f64 = 0.30;

/// Result of [`RetryingLlmClient::chat_completion_json`]: the validated
/// value plus the raw assistant text it was parsed from, so callers can
/// log/audit the source text alongside the structured result.
pub struct JsonCompletion<T> {
    pub data: T,
    pub raw_content: String,
}

pub struct RetryingLlmClient {
    provider: Arc<dyn LlmProvider>,
    breaker: CircuitBreaker,
}

impl RetryingLlmClient {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            breaker: CircuitBreaker::new(),
        }
    }

    /// Retries on transport errors or HTTP {429, 502, 503, 504}, up to
    /// 3 attempts with exponential backoff starting at 1s and up to
    /// ±30% jitter, guarded by the circuit breaker.
    pub async fn chat_completion(
        &self,
        system: &str,
        user_message: &str,
        params: &GenerationParams,
        cancel: CancellationToken,
    ) -> Result<LlmResponse, LlmError> {
        match self.breaker.permit() {
            Permit::Rejected => {
                return Err(LlmError::Unavailable {
                    reason: "circuit breaker open".to_string(),
                })
            }
            Permit::Closed | Permit::HalfOpenProbe => {}
        }

        let mut last_error = None;

        for attempt in 1..=MAX_ATTEMPTS {
            match self
                .provider
                .complete(system, user_message, params, cancel.clone())
                .await
            {
                Ok(response) => {
                    self.breaker.record_success();
                    return Ok(response);
                }
                Err(err) => {
                    tracing::warn!(attempt, model = self.provider.name(), error = %err, "LLM call failed");
                    let retryable = is_retryable(&err);
                    last_error = Some(err);

                    if !retryable || attempt == MAX_ATTEMPTS {
                        self.breaker.record_failure();
                        break;
                    }

                    if !self.wait_backoff(attempt, &cancel).await {
                        self.breaker.record_failure();
                        return Err(LlmError::Transport(TransportError::Cancelled {
                            host: self.provider.name().to_string(),
                        }));
                    }
                }
            }
        }

        Err(LlmError::Unavailable {
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "exhausted retries".to_string()),
        })
    }

    /// Returns `false` if cancelled during the backoff sleep.
    async fn wait_backoff(&self, attempt: u32, cancel: &CancellationToken) -> bool {
        let delay = backoff_delay(attempt);
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = cancel.cancelled() => false,
        }
    }

    /// Raw parse, then JSON repair, then up to `max_retries` corrective
    /// retries that feed the bad assistant reply back with a
    /// correction request.
    pub async fn chat_completion_json<T, V>(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        validate: V,
        params: &GenerationParams,
        max_retries: u32,
        cancel: CancellationToken,
    ) -> Result<JsonCompletion<T>, LlmError>
    where
        T: DeserializeOwned,
        V: Fn(&T) -> Result<(), String>,
    {
        let mut conversation_user_prompt = user_prompt.to_string();

        for retry in 0..=max_retries {
            let response = self
                .chat_completion(system_prompt, &conversation_user_prompt, params, cancel.clone())
                .await?;

            match parse_and_validate(&response.text, &validate) {
                Ok((data, repaired)) => {
                    if repaired {
                        tracing::debug!(retry, "LLM JSON response required repair");
                    }
                    return Ok(JsonCompletion {
                        data,
                        raw_content: response.text,
                    });
                }
                Err(reason) if retry < max_retries => {
                    tracing::debug!(retry, reason = %reason, "LLM JSON response failed validation, retrying");
                    conversation_user_prompt = format!(
                        "{user_prompt}\n\nYour previous reply was:\n{}\n\nThat reply was invalid: {reason}. \
                         Reply again with ONLY a single valid JSON object/array matching the required schema.",
                        response.text
                    );
                }
                Err(reason) => {
                    return Err(LlmError::Malformed {
                        reason,
                        raw_content: Some(response.text),
                    });
                }
            }
        }

        unreachable!("loop always returns on the final iteration")
    }

    /// Cheap, non-blocking proxy for LLM health: whether the circuit
    /// breaker is currently open. Used by `/ready`, which must report
    /// LLM reachability without paying for a live probe on every poll.
    pub fn breaker_is_open(&self) -> bool {
        self.breaker.is_open()
    }

    /// Tiered health probe: `/models` listing, then a mesh-native
    /// `tags` listing, then a 1-token chat completion — 5s deadline for
    /// the two cheap tiers and 15s for the completion fallback. Returns
    /// `true` on the first tier that succeeds.
    pub async fn health_probe(&self) -> bool {
        let short = Duration::from_secs(5);
        let long = Duration::from_secs(15);

        if tokio::time::timeout(short, self.provider.list_models(CancellationToken::new()))
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
        {
            return true;
        }

        if tokio::time::timeout(short, self.provider.list_tags(CancellationToken::new()))
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
        {
            return true;
        }

        let params = GenerationParams {
            max_tokens: 1,
            temperature: 0.0,
            system_prompt: None,
        };
        tokio::time::timeout(
            long,
            self.provider
                .complete("health check", "ping", &params, CancellationToken::new()),
        )
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false)
    }
}

/// Parses `raw` as JSON, falling back to [`json_repair::repair`] if the
/// raw parse fails, then validates. The returned `bool` is `true` when
/// the repair fallback was the one that actually produced a parse, so
/// the caller can log that exactly once per response.
fn parse_and_validate<T, V>(raw: &str, validate: &V) -> Result<(T, bool), String>
where
    T: DeserializeOwned,
    V: Fn(&T) -> Result<(), String>,
{
    let (parsed, repaired): (T, bool) = match serde_json::from_str(raw) {
        Ok(parsed) => (parsed, false),
        Err(_) => {
            let parsed = serde_json::from_str(&json_repair::repair(raw))
                .map_err(|e| format!("could not parse JSON even after repair: {e}"))?;
            (parsed, true)
        }
    };

    validate(&parsed)?;
    Ok((parsed, repaired))
}

fn is_retryable(err: &LlmError) -> bool {
    match err {
        LlmError::Transport(_) => true,
        LlmError::RateLimited { .. } => true,
        LlmError::Api { status, .. } => matches!(status, 502 | 503 | 504),
        LlmError::Malformed { .. } | LlmError::NotConfigured | LlmError::Unavailable { .. } => false,
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let base = BASE_BACKOFF.as_secs_f64() * 2f64.powi(exponent as i32);
    let jitter = rand::thread_rng().gen_range(-JITTER_FRACTION..=JITTER_FRACTION);
    let jittered = (base * (1.0 + jitter)).max(0.0);
    Duration::from_secs_f64(jittered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyProvider {
        fail_times: AtomicU32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl LlmProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn complete(
            &self,
            _system: &str,
            _user_message: &str,
            _params: &GenerationParams,
            _cancel: CancellationToken,
        ) -> Result<LlmResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Err(LlmError::Transport(TransportError::Timeout {
                    host: "test".to_string(),
                    elapsed_ms: 1,
                }));
            }
            Ok(LlmResponse {
                text: r#"{"ok": true}"#.to_string(),
                usage: super::super::TokenUsage::default(),
                model: "test".to_string(),
            })
        }

        async fn list_models(&self, _cancel: CancellationToken) -> Result<(), LlmError> {
            Ok(())
        }

        async fn list_tags(&self, _cancel: CancellationToken) -> Result<(), LlmError> {
            Ok(())
        }
    }

    struct AlwaysFailsProvider;

    #[async_trait]
    impl LlmProvider for AlwaysFailsProvider {
        fn name(&self) -> &str {
            "always-fails"
        }

        async fn complete(
            &self,
            _system: &str,
            _user_message: &str,
            _params: &GenerationParams,
            _cancel: CancellationToken,
        ) -> Result<LlmResponse, LlmError> {
            Err(LlmError::Api {
                status: 503,
                message: "down".to_string(),
            })
        }

        async fn list_models(&self, _cancel: CancellationToken) -> Result<(), LlmError> {
            Err(LlmError::Api {
                status: 503,
                message: "down".to_string(),
            })
        }

        async fn list_tags(&self, _cancel: CancellationToken) -> Result<(), LlmError> {
            Err(LlmError::Api {
                status: 503,
                message: "down".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn retries_on_transport_error_then_succeeds() {
        let provider = Arc::new(FlakyProvider {
            fail_times: AtomicU32::new(1),
            calls: AtomicU32::new(0),
        });
        let client = RetryingLlmClient::new(provider.clone());

        let result = client
            .chat_completion(
                "system",
                "user",
                &GenerationParams::default(),
                CancellationToken::new(),
            )
            .await;

        assert!(result.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn circuit_opens_after_five_consecutive_failures() {
        let provider = Arc::new(AlwaysFailsProvider);
        let client = RetryingLlmClient::new(provider);

        for _ in 0..5 {
            let result = client
                .chat_completion(
                    "system",
                    "user",
                    &GenerationParams::default(),
                    CancellationToken::new(),
                )
                .await;
            assert!(result.is_err());
        }

        assert!(client.breaker.is_open());

        let result = client
            .chat_completion(
                "system",
                "user",
                &GenerationParams::default(),
                CancellationToken::new(),
            )
            .await;
        match result.unwrap_err() {
            LlmError::Unavailable { reason } => assert!(reason.contains("circuit")),
            other => panic!("expected Unavailable, got {other}"),
        }
    }

    #[tokio::test]
    async fn json_completion_repairs_fenced_output() {
        struct FencedProvider;

        #[async_trait]
        impl LlmProvider for FencedProvider {
            fn name(&self) -> &str {
                "fenced"
            }

            async fn complete(
                &self,
                _system: &str,
                _user_message: &str,
                _params: &GenerationParams,
                _cancel: CancellationToken,
            ) -> Result<LlmResponse, LlmError> {
                Ok(LlmResponse {
                    text: "```json\n{\"ok\": true}\n```".to_string(),
                    usage: super::super::TokenUsage::default(),
                    model: "test".to_string(),
                })
            }

            async fn list_models(&self, _cancel: CancellationToken) -> Result<(), LlmError> {
                Ok(())
            }

            async fn list_tags(&self, _cancel: CancellationToken) -> Result<(), LlmError> {
                Ok(())
            }
        }

        #[derive(serde::Deserialize)]
        struct Payload {
            ok: bool,
        }

        let client = RetryingLlmClient::new(Arc::new(FencedProvider));
        let result = client
            .chat_completion_json::<Payload, _>(
                "system",
                "user",
                |p: &Payload| if p.ok { Ok(()) } else { Err("not ok".to_string()) },
                &GenerationParams::default(),
                1,
                CancellationToken::new(),
            )
            .await
            .expect("should repair fenced JSON");

        assert!(result.data.ok);
    }

    #[test]
    fn parse_and_validate_signals_repair_on_fenced_json() {
        #[derive(serde::Deserialize)]
        struct Payload {
            ok: bool,
        }

        let (data, repaired) =
            parse_and_validate::<Payload, _>("```json\n{\"ok\": true}\n```", &|_: &Payload| Ok(()))
                .expect("should repair fenced JSON");
        assert!(data.ok);
        assert!(repaired, "fenced JSON required the repair fallback");
    }

    #[test]
    fn parse_and_validate_does_not_signal_repair_on_clean_json() {
        #[derive(serde::Deserialize)]
        struct Payload {
            ok: bool,
        }

        let (data, repaired) =
            parse_and_validate::<Payload, _>(r#"{"ok": true}"#, &|_: &Payload| Ok(())).unwrap();
        assert!(data.ok);
        assert!(!repaired);
    }

    #[test]
    fn backoff_grows_exponentially_within_jitter_bounds() {
        let d1 = backoff_delay(1);
        let d2 = backoff_delay(2);
        assert!(d1.as_secs_f64() <= 1.3);
        assert!(d2.as_secs_f64() <= 2.6);
        assert!(d2.as_secs_f64() >= 1.4);
    }
}
