//! Exponential backoff for outbound model requests.
//!
//! Retries 408, 429, 5xx and network failures. Other 4xx statuses fail on the
//! first attempt.

use anyhow::Result;
use reqwest::{Response, StatusCode};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

pub(crate) fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// Run `operation` until it yields a 2xx response, a non-retryable status, or
/// `max_attempts` is used up. `service` names the upstream in logs and errors.
pub async fn with_retry<F, Fut>(config: &RetryConfig, service: &str, operation: F) -> Result<Response>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<Response>>,
{
    let attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut last_error = String::from("no attempt made");

    for attempt in 1..=attempts {
        match operation().await {
            Ok(response) if response.status().is_success() => {
                if attempt > 1 {
                    tracing::info!("{} succeeded on attempt {}", service, attempt);
                }
                return Ok(response);
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                if !is_retryable_status(status) {
                    anyhow::bail!("{} API Error ({}): {}", service, status, body);
                }
                tracing::warn!(
                    "{} returned {} on attempt {}/{}: {}",
                    service,
                    status,
                    attempt,
                    attempts,
                    body.chars().take(200).collect::<String>()
                );
                last_error = format!("{} ({}): {}", service, status, body);
            }
            Err(e) => {
                tracing::warn!("{} network error on attempt {}/{}: {:#}", service, attempt, attempts, e);
                last_error = format!("{}: {:#}", service, e);
            }
        }

        if attempt < attempts {
            let sleep_time = delay + jitter(delay);
            tracing::debug!("{} retrying in {:.2}s", service, sleep_time.as_secs_f64());
            tokio::time::sleep(sleep_time).await;
            delay = Duration::from_secs_f64(
                (delay.as_secs_f64() * config.backoff_factor).min(config.max_delay.as_secs_f64()),
            );
        }
    }

    anyhow::bail!("All {} retry attempts exhausted. Last error: {}", attempts, last_error)
}

/// Up to a tenth of `delay`, seeded from the clock.
fn jitter(delay: Duration) -> Duration {
    let spread = (delay.as_millis() / 10) as u64;
    if spread == 0 {
        return Duration::ZERO;
    }
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    Duration::from_millis(nanos % spread)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_factor: 2.0,
        }
    }

    async fn call(server: &MockServer) -> Result<Response> {
        let client = reqwest::Client::new();
        with_retry(&fast(), "test", move || {
            let request = client.get(server.uri());
            async move { request.send().await.context("send failed") }
        })
        .await
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::REQUEST_TIMEOUT));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .with_priority(2)
            .mount(&server)
            .await;

        let response = call(&server).await.unwrap();
        assert_eq!(response.text().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_client_error_fails_fast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let err = call(&server).await.unwrap_err();
        assert!(err.to_string().contains("401"));
        assert!(err.to_string().contains("bad key"));
    }

    #[tokio::test]
    async fn test_exhausted_reports_last_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(3)
            .mount(&server)
            .await;

        let err = call(&server).await.unwrap_err();
        assert!(err.to_string().contains("exhausted"));
        assert!(err.to_string().contains("boom"));
    }
}
