//! ============================================================================
//! Chain RPC Transport - JSON-RPC with Retry & Backoff
//! ============================================================================
//! Shared transport for every chain gateway:
//! - JSON-RPC 2.0 envelope over HTTP (reqwest, rustls)
//! - Per-call timeout
//! - Error classification (retryable vs permanent)
//! - Exponential backoff with jitter, small fixed retry budget
//!
//! Public chain RPC endpoints are flaky; a single transient failure must not
//! deny access to a legitimate holder. Exhausting the budget surfaces
//! `ChainUnavailable`.
//! ============================================================================

use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::GateError;

/// Configuration for RPC retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt (total attempts = max_retries + 1)
    pub max_retries: u32,
    /// Base delay between retries (multiplied by 2^attempt)
    pub base_delay_ms: u64,
    /// Maximum delay between retries
    pub max_delay_ms: u64,
    /// Per-call HTTP timeout
    pub request_timeout: Duration,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 400,
            max_delay_ms: 2000,
            request_timeout: Duration::from_secs(10),
            jitter: true,
        }
    }
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorKind {
    /// Likely transient, worth another attempt
    Retryable,
    /// Will not get better by retrying
    Permanent,
    /// Rate limited, back off more aggressively
    RateLimited,
}

/// Classify an RPC/transport error string to decide whether to retry
pub fn classify_error(error: &str) -> ErrorKind {
    let lower = error.to_lowercase();

    if lower.contains("rate limit")
        || lower.contains("too many requests")
        || lower.contains("429")
    {
        return ErrorKind::RateLimited;
    }

    // Protocol-level rejections the endpoint will keep repeating
    if lower.contains("invalid params")
        || lower.contains("invalid request")
        || lower.contains("not found")
        || lower.contains("parse error")
        || lower.contains("-32602")
        || lower.contains("-32601")
        || lower.contains("-32600")
    {
        return ErrorKind::Permanent;
    }

    if lower.contains("connection")
        || lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("network")
        || lower.contains("temporarily")
        || lower.contains("502")
        || lower.contains("503")
        || lower.contains("504")
    {
        return ErrorKind::Retryable;
    }

    // Default to retryable for unknown errors
    ErrorKind::Retryable
}

/// Calculate delay with exponential backoff and optional jitter
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let multiplier = 2u64.saturating_pow(attempt.min(63));
    let base_delay = config.base_delay_ms.saturating_mul(multiplier);
    let capped_delay = base_delay.min(config.max_delay_ms);

    let final_delay = if config.jitter {
        // 0-50% jitter on top of the capped delay
        let jitter_factor = 1.0 + (rand_simple() * 0.5);
        (capped_delay as f64 * jitter_factor) as u64
    } else {
        capped_delay
    };

    Duration::from_millis(final_delay)
}

/// Simple pseudo-random number generator (0.0 to 1.0), time-seeded.
/// Good enough for retry jitter.
fn rand_simple() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// JSON-RPC 2.0 client bound to one endpoint
pub struct JsonRpcClient {
    http: reqwest::Client,
    endpoint: String,
    retry: RetryConfig,
}

impl JsonRpcClient {
    pub fn new(endpoint: impl Into<String>, retry: RetryConfig) -> Result<Self, GateError> {
        let http = reqwest::Client::builder()
            .timeout(retry.request_timeout)
            .build()
            .map_err(|e| GateError::ChainUnavailable(format!("http client setup: {}", e)))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            retry,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Issue one JSON-RPC call with the configured retry budget.
    /// Returns the `result` field on success.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, GateError> {
        let mut last_error = String::new();

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                let delay = calculate_delay(attempt - 1, &self.retry);
                debug!("rpc retry {} for {} after {:?}", attempt, method, delay);
                sleep(delay).await;
            }

            match self.call_once(method, &params).await {
                Ok(result) => return Ok(result),
                Err(CallFailure::Permanent(msg)) => {
                    warn!("rpc {} failed permanently: {}", method, msg);
                    return Err(GateError::ChainUnavailable(msg));
                }
                Err(CallFailure::Malformed(msg)) => {
                    return Err(GateError::MalformedResponse(msg));
                }
                Err(CallFailure::Transient(msg, rate_limited)) => {
                    warn!(
                        "rpc {} attempt {} failed: {}",
                        method,
                        attempt + 1,
                        msg
                    );
                    if rate_limited {
                        let delay = Duration::from_millis(self.retry.max_delay_ms);
                        warn!("rate limited, waiting {:?}", delay);
                        sleep(delay).await;
                    }
                    last_error = msg;
                }
            }
        }

        Err(GateError::ChainUnavailable(format!(
            "{}: retry budget ({}) exhausted, last error: {}",
            method, self.retry.max_retries, last_error
        )))
    }

    async fn call_once(&self, method: &str, params: &Value) -> Result<Value, CallFailure> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| transient_or_permanent(&e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(transient_or_permanent(&format!("http {}: {}", status, text)));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| CallFailure::Malformed(format!("{}: {}", method, e)))?;

        if let Some(err) = envelope.get("error") {
            let msg = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown rpc error");
            let code = err.get("code").and_then(Value::as_i64).unwrap_or(0);
            return Err(transient_or_permanent(&format!("{} ({})", msg, code)));
        }

        envelope
            .get("result")
            .cloned()
            .ok_or_else(|| CallFailure::Malformed(format!("{}: no result in envelope", method)))
    }
}

enum CallFailure {
    Transient(String, bool),
    Permanent(String),
    Malformed(String),
}

fn transient_or_permanent(msg: &str) -> CallFailure {
    match classify_error(msg) {
        ErrorKind::Permanent => CallFailure::Permanent(msg.to_string()),
        ErrorKind::RateLimited => CallFailure::Transient(msg.to_string(), true),
        ErrorKind::Retryable => CallFailure::Transient(msg.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert_eq!(classify_error("connection refused"), ErrorKind::Retryable);
        assert_eq!(classify_error("operation timed out"), ErrorKind::Retryable);
        assert_eq!(classify_error("HTTP 429 Too Many Requests"), ErrorKind::RateLimited);
        assert_eq!(classify_error("rate limit exceeded"), ErrorKind::RateLimited);
        assert_eq!(classify_error("Invalid params (-32602)"), ErrorKind::Permanent);
        assert_eq!(classify_error("Method not found"), ErrorKind::Permanent);
        // Lets the Solana gateway map burned ids to AssetNotFound without
        // spending the retry budget first
        assert_eq!(classify_error("Asset Not Found"), ErrorKind::Permanent);
        assert_eq!(classify_error("unknown error xyz"), ErrorKind::Retryable);
    }

    #[test]
    fn test_calculate_delay_deterministic_without_jitter() {
        let config = RetryConfig {
            jitter: false,
            ..Default::default()
        };
        assert_eq!(calculate_delay(0, &config), Duration::from_millis(400));
        assert_eq!(calculate_delay(1, &config), Duration::from_millis(800));
        assert_eq!(calculate_delay(2, &config), Duration::from_millis(1600));
        // Capped at max_delay_ms
        assert_eq!(calculate_delay(5, &config), Duration::from_millis(2000));
    }

    #[test]
    fn test_calculate_delay_with_jitter_in_range() {
        let config = RetryConfig {
            jitter: true,
            base_delay_ms: 1000,
            max_delay_ms: 10000,
            ..Default::default()
        };
        for _ in 0..10 {
            let delay = calculate_delay(0, &config);
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(1500));
        }
    }

    #[test]
    fn test_retry_config_default_budget_is_small() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 2);
        assert!(config.request_timeout <= Duration::from_secs(30));
    }
}
