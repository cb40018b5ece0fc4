// RetryDispatcher - one configuration, one endpoint, bounded retries
//
// The original send is attempt 0 and always happens. A failure is retried only
// when its structured code is in the policy's retryable set or the HTTP status
// is exactly 500; retry n waits n * base delay. Cancellation aborts both the
// in-flight request and any pending delay.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::errors::{DispatchError, SettingsError};
use super::models::{RequestConfiguration, RequestPayload, SuccessPayload};
use super::policy::RetryPolicy;
use super::traits::Dispatch;
use super::utils::truncate_chars;

/// Fixed prefix of the authorization header; the configured secret follows it.
pub const API_KEY_PREFIX: &str = "Api-Key ";

/// Longest slice of a non-JSON error body kept in a failure.
const MAX_ERROR_TEXT: usize = 512;

#[derive(Debug, Clone)]
enum PolicySource {
    /// Re-read `ERROR_*` settings at the start of every dispatch cycle
    Environment,
    Fixed(RetryPolicy),
}

#[derive(Debug, Clone)]
pub struct RetryDispatcher {
    client: Client,
    authorization: HeaderValue,
    policy: PolicySource,
}

impl RetryDispatcher {
    /// Dispatcher whose retry policy is loaded from the environment per dispatch cycle.
    pub fn new(client: Client, api_key: &str) -> Result<Self, SettingsError> {
        let mut authorization = HeaderValue::from_str(&format!("{}{}", API_KEY_PREFIX, api_key))
            .map_err(|e| SettingsError::Invalid {
                name: "API_KEY",
                reason: e.to_string(),
            })?;
        authorization.set_sensitive(true);

        Ok(Self {
            client,
            authorization,
            policy: PolicySource::Environment,
        })
    }

    /// Bare single-shot instantiation: no retries at all.
    pub fn single_shot(client: Client, api_key: &str) -> Result<Self, SettingsError> {
        Ok(Self::new(client, api_key)?.with_policy(RetryPolicy::disabled()))
    }

    /// Pin the policy instead of reading it from the environment.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = PolicySource::Fixed(policy);
        self
    }

    pub fn current_policy(&self) -> RetryPolicy {
        match &self.policy {
            PolicySource::Environment => RetryPolicy::from_env(),
            PolicySource::Fixed(policy) => policy.clone(),
        }
    }

    pub async fn dispatch_with_policy(
        &self,
        endpoint: &str,
        config: &RequestConfiguration,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<SuccessPayload, DispatchError> {
        let payload = config.to_payload();
        let cancelled = || DispatchError::Cancelled {
            endpoint: endpoint.to_string(),
        };
        let mut attempt: u32 = 0;

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                outcome = self.send_once(endpoint, &payload, attempt + 1) => outcome,
            };

            match outcome {
                Ok(success) => {
                    if attempt > 0 {
                        info!(endpoint, attempt, "dispatch succeeded after retry");
                    }
                    return Ok(success);
                }
                Err(error) if attempt < policy.max_retries && error.is_retryable(policy) => {
                    attempt += 1;
                    let delay = policy.delay_for(attempt);
                    warn!(
                        endpoint,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        code = error.code().unwrap_or("-"),
                        "retryable failure: {}",
                        error
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(cancelled()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(error) => {
                    debug!(endpoint, attempt, "terminal failure: {}", error);
                    return Err(error);
                }
            }
        }
    }

    async fn send_once(
        &self,
        endpoint: &str,
        payload: &RequestPayload<'_>,
        attempts: u32,
    ) -> Result<SuccessPayload, DispatchError> {
        let transport = |source| DispatchError::Transport {
            endpoint: endpoint.to_string(),
            source,
        };

        let response = self
            .client
            .post(endpoint)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, self.authorization.clone())
            .json(payload)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(transport)?;
        let body = serde_json::from_slice::<Value>(&bytes).ok();

        match body {
            Some(body) if status.is_success() && !is_error_body(&body) => Ok(SuccessPayload(body)),
            Some(body) => Err(upstream_failure(endpoint, status, Some(&body), &bytes, attempts)),
            None if status.is_success() => Err(DispatchError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: "response body is not JSON".to_string(),
            }),
            None => Err(upstream_failure(endpoint, status, None, &bytes, attempts)),
        }
    }
}

#[async_trait]
impl Dispatch for RetryDispatcher {
    fn name(&self) -> &'static str {
        match self.policy {
            PolicySource::Fixed(ref p) if p.max_retries == 0 => "single-shot",
            _ => "retry",
        }
    }

    async fn dispatch(
        &self,
        endpoint: &str,
        config: &RequestConfiguration,
        cancel: &CancellationToken,
    ) -> Result<SuccessPayload, DispatchError> {
        let policy = self.current_policy();
        self.dispatch_with_policy(endpoint, config, &policy, cancel)
            .await
    }
}

fn is_error_body(body: &Value) -> bool {
    body.get("status").and_then(Value::as_str) == Some("error")
}

fn upstream_failure(
    endpoint: &str,
    status: StatusCode,
    body: Option<&Value>,
    raw: &[u8],
    attempts: u32,
) -> DispatchError {
    let code = body
        .and_then(|b| b.pointer("/error/code"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let text = match body {
        Some(b) => b.get("text").and_then(Value::as_str).map(str::to_string),
        None if raw.is_empty() => None,
        None => Some(truncate_chars(&String::from_utf8_lossy(raw), MAX_ERROR_TEXT)),
    };

    DispatchError::Upstream {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        code,
        text,
        attempts,
    }
}
