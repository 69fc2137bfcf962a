//! Shared HTTP client for every upstream service.
//!
//! Transient failures (connection errors, 5xx, 408, 429) are retried with
//! exponential backoff by `reqwest-retry`. Whatever still fails is mapped onto
//! [`AirAwareError`] by [`check_status`].

use crate::config::HttpConfig;
use crate::{AirAwareError, Result};
use reqwest::{Response, StatusCode, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::RetryTransientMiddleware;
use reqwest_retry::policies::ExponentialBackoff;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Build the retrying client used by all data source clients
pub fn build_client(config: &HttpConfig) -> Result<ClientWithMiddleware> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds.into()))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| AirAwareError::config(format!("Failed to create HTTP client: {e}")))?;

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);

    Ok(ClientBuilder::new(client)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// Spaces out requests to a service that allows only one call per interval.
///
/// Callers queue on the lock, so concurrent lookups go out one at a time.
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Wait until the next request is allowed and record it
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let wait = self.min_interval.saturating_sub(previous.elapsed());
            if !wait.is_zero() {
                debug!("Rate limit: waiting {:.3}s", wait.as_secs_f64());
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Join `path` onto `base` and attach query parameters.
pub fn endpoint(base: &str, path: &str, params: &[(&str, String)]) -> Result<Url> {
    let joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    let parsed = if params.is_empty() {
        Url::parse(&joined)
    } else {
        Url::parse_with_params(&joined, params)
    };
    parsed.map_err(|e| AirAwareError::config(format!("Invalid URL '{joined}': {e}")))
}

/// Map a non-success response onto the error taxonomy.
pub async fn check_status(response: Response, service: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            warn!("{service} rejected credentials ({status})");
            AirAwareError::api_status(format!("{service} unauthorized: {snippet}"), status.as_u16())
        }
        StatusCode::NOT_FOUND => AirAwareError::not_found(format!("{service} returned 404")),
        StatusCode::TOO_MANY_REQUESTS => {
            warn!("{service} rate limit exceeded and retry attempts exhausted");
            AirAwareError::api_status(format!("{service} rate limited"), status.as_u16())
        }
        _ => {
            let reason = error_reason(&body)
                .or_else(|| (!snippet.trim().is_empty()).then(|| snippet.trim().to_string()))
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());
            AirAwareError::api_status(
                format!("{service} request failed with status: {status} - {reason}"),
                status.as_u16(),
            )
        }
    })
}

/// Pull a human readable reason out of a JSON error body
/// (`{"error": true, "reason": ".."}` from Open-Meteo, `{"detail": ".."}` from OpenAQ).
fn error_reason(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["reason", "detail", "message"]
        .iter()
        .find_map(|field| value.get(*field)?.as_str())
        .map(str::to_string)
}

/// GET a URL and decode its JSON body.
pub async fn get_json<T: DeserializeOwned>(
    client: &ClientWithMiddleware,
    url: Url,
    headers: &[(&str, &str)],
    service: &str,
) -> Result<T> {
    let started = Instant::now();
    let mut request = client.get(url.clone());
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let response = check_status(request.send().await?, service).await?;
    let body = response.bytes().await?;
    debug!(
        "{service} responded with {} bytes in {:.3}s",
        body.len(),
        started.elapsed().as_secs_f64()
    );

    serde_json::from_slice(&body).map_err(|e| {
        AirAwareError::parse(format!("Failed to parse {service} response from {url}: {e}"))
    })
}
