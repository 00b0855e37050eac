//! HTTP client for the remote inference worker.

use std::time::Duration;

use log::warn;
use secrecy::{ExposeSecret, SecretString};

use crate::config::GatewayConfig;

use super::error::InferenceError;
use super::protocol::{AnalyzeRequest, AnalyzeResponse, TaskResult};
use super::Analyzer;

/// Maximum length of an error body quoted back in messages, to keep worker
/// responses out of log floods.
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn truncate_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated)", &body[..end])
    } else {
        body.to_string()
    }
}

/// Tunable parameters for the bounded-retry backoff strategy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per request (first try included).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the delay between retries.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            max_attempts: config.max_request_attempts,
            initial_delay: Duration::from_millis(config.retry_initial_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            multiplier: 2.0,
        }
    }

    /// Next backoff delay, clamped to `max_delay`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let next_ms = (current.as_millis() as f64 * self.multiplier) as u64;
        Duration::from_millis(next_ms).min(self.max_delay)
    }
}

/// Stateless adapter speaking to the remote analyze endpoint.
pub struct InferenceClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    retry: RetryPolicy,
}

// The credential must never leak through Debug output.
impl std::fmt::Debug for InferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("retry", &self.retry)
            .finish()
    }
}

impl InferenceClient {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, InferenceError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| InferenceError::Client(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.inference_endpoint.trim_end_matches('/').to_string(),
            api_key: config.resolve_api_key(),
            retry: RetryPolicy::from_config(config),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn analyze_url(&self) -> String {
        format!("{}/analyze", self.endpoint)
    }

    fn send_once(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse, InferenceError> {
        let mut builder = self.http.post(self.analyze_url()).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().map_err(classify_transport)?;
        let status = response.status();
        let body = response.text().map_err(classify_transport)?;

        if !status.is_success() {
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        serde_json::from_str::<Vec<TaskResult>>(&body)
            .map(AnalyzeResponse::new)
            .map_err(|e| InferenceError::Parse(e.to_string()))
    }
}

fn classify_transport(error: reqwest::Error) -> InferenceError {
    if error.is_timeout() {
        InferenceError::Transport("request timed out".to_string())
    } else {
        InferenceError::Transport(error.to_string())
    }
}

impl Analyzer for InferenceClient {
    fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse, InferenceError> {
        let _span = tracing::info_span!(
            "inference.analyze",
            document_id = %request.document_id,
            pages = request.page_indices.len(),
            tasks = request.tasks.len(),
        )
        .entered();

        let mut attempt = 1u32;
        let mut delay = self.retry.initial_delay;

        loop {
            match self.send_once(request) {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    warn!(
                        "Inference request for document {} failed on attempt {}: {}; retrying in {:?}",
                        request.document_id, attempt, e, delay
                    );
                    std::thread::sleep(delay);
                    delay = self.retry.next_delay(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::TaskPrompt;
    use crate::job::TaskKind;
    use secrecy::SecretString;
    use std::collections::HashMap;

    fn request() -> AnalyzeRequest {
        AnalyzeRequest {
            document_id: "doc-1".to_string(),
            page_indices: vec![0],
            tasks: vec![TaskPrompt {
                task: TaskKind::Layout,
                prompt: "p".to_string(),
            }],
            model_version: "qwen2.5-vl-72b".to_string(),
            attachments: vec![],
            context: HashMap::new(),
        }
    }

    fn unreachable_client(max_attempts: u32) -> InferenceClient {
        let config = GatewayConfig {
            // Nothing listens on port 9; connections are refused immediately.
            inference_endpoint: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: 2,
            ..Default::default()
        };
        InferenceClient::from_config(&config)
            .unwrap()
            .with_retry(RetryPolicy {
                max_attempts,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                multiplier: 2.0,
            })
    }

    #[test]
    fn test_backoff_sequence_doubles_and_clamps() {
        let retry = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        };
        let mut delay = retry.initial_delay;
        let expected = [1, 2, 4, 8, 16, 30, 30];
        for &secs in &expected {
            assert_eq!(delay.as_secs(), secs);
            delay = retry.next_delay(delay);
        }
    }

    #[test]
    fn test_truncate_body() {
        let short = "oops";
        assert_eq!(truncate_body(short), "oops");

        let long = "x".repeat(500);
        let truncated = truncate_body(&long);
        assert!(truncated.ends_with("... (truncated)"));
        assert!(truncated.len() < long.len());
    }

    #[test]
    fn test_unreachable_endpoint_is_transport_error() {
        let client = unreachable_client(2);
        let result = client.analyze(&request());
        match result {
            Err(InferenceError::Transport(_)) => {}
            other => panic!("Expected transport error, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_never_exposes_api_key() {
        let config = GatewayConfig::default();
        let mut client = InferenceClient::from_config(&config).unwrap();
        client.api_key = Some(SecretString::from("super-secret-token".to_string()));

        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("super-secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_endpoint_trailing_slash_normalized() {
        let config = GatewayConfig {
            inference_endpoint: "http://worker:8000/".to_string(),
            ..Default::default()
        };
        let client = InferenceClient::from_config(&config).unwrap();
        assert_eq!(client.analyze_url(), "http://worker:8000/analyze");
    }
}
