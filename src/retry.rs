// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff for Kubernetes and DNS API reads.
//!
//! Transient failures (429, 5xx, connection errors) are retried with jittered
//! exponential backoff; permanent failures (4xx, misconfiguration) fail fast.
//! Mutations of DNS records are never routed through here: a lost response may
//! hide an update that was applied.

use crate::dns_errors::{DnsError, ProviderError};
use anyhow::Result;
use rand::Rng;
use reqwest::StatusCode;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Maximum total time to spend retrying Kubernetes calls (2 minutes)
const KUBE_MAX_ELAPSED_TIME_SECS: u64 = 120;

/// Initial Kubernetes retry interval (100ms)
const KUBE_INITIAL_INTERVAL_MILLIS: u64 = 100;

/// Maximum interval between Kubernetes retries (15 seconds)
const KUBE_MAX_INTERVAL_SECS: u64 = 15;

/// Initial DNS API retry interval (250ms)
const HTTP_INITIAL_INTERVAL_MILLIS: u64 = 250;

/// Maximum interval between DNS API retries (10 seconds)
const HTTP_MAX_INTERVAL_SECS: u64 = 10;

/// Maximum total time to spend retrying DNS API calls (1 minute)
const HTTP_MAX_ELAPSED_TIME_SECS: u64 = 60;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Simple exponential backoff with jitter.
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Maximum total elapsed time
    pub max_elapsed_time: Option<Duration>,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
    start_time: Instant,
}

impl ExponentialBackoff {
    fn new(initial_interval: Duration, max_interval: Duration, max_elapsed_time: Duration) -> Self {
        Self {
            current_interval: initial_interval,
            max_interval,
            max_elapsed_time: Some(max_elapsed_time),
            multiplier: BACKOFF_MULTIPLIER,
            randomization_factor: RANDOMIZATION_FACTOR,
            start_time: Instant::now(),
        }
    }

    /// Get the next backoff interval, or None if max elapsed time exceeded.
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if let Some(max_elapsed) = self.max_elapsed_time {
            if self.start_time.elapsed() >= max_elapsed {
                return None;
            }
        }

        let interval = self.current_interval;
        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(self.apply_jitter(interval))
    }

    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let jittered = rand::thread_rng().gen_range((secs - delta)..=(secs + delta));

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// Backoff for Kubernetes secret reads and writes: 100ms doubling to 15s, 2 minutes total.
#[must_use]
pub fn kube_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(KUBE_INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(KUBE_MAX_INTERVAL_SECS),
        Duration::from_secs(KUBE_MAX_ELAPSED_TIME_SECS),
    )
}

/// Backoff for DNS API reads: 250ms doubling to 10s, 1 minute total.
#[must_use]
pub fn http_backoff() -> ExponentialBackoff {
    ExponentialBackoff::new(
        Duration::from_millis(HTTP_INITIAL_INTERVAL_MILLIS),
        Duration::from_secs(HTTP_MAX_INTERVAL_SECS),
        Duration::from_secs(HTTP_MAX_ELAPSED_TIME_SECS),
    )
}

/// Determine if an HTTP status code is retryable (429 and gateway/server errors).
#[must_use]
pub fn is_retryable_http_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Retry a Kubernetes API call with exponential backoff.
///
/// # Errors
///
/// Returns the last error once a non-retryable error is seen or the backoff is
/// exhausted.
pub async fn retry_api_call<T, F, Fut>(mut operation: F, operation_name: &str) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, kube::Error>>,
{
    let mut backoff = kube_backoff();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                debug!(operation = operation_name, attempt, "Kubernetes API call succeeded");
                return Ok(value);
            }
            Err(e) if !is_retryable_kube_error(&e) => {
                error!(
                    operation = operation_name,
                    error = %e,
                    "Non-retryable Kubernetes API error, failing immediately"
                );
                return Err(e.into());
            }
            Err(e) => {
                let Some(duration) = backoff.next_backoff() else {
                    error!(operation = operation_name, attempt, error = %e, "Backoff exhausted, giving up");
                    return Err(anyhow::anyhow!(
                        "Backoff exhausted after {attempt} attempts: {e}"
                    ));
                };
                warn!(
                    operation = operation_name,
                    attempt,
                    retry_after = ?duration,
                    error = %e,
                    "Retryable Kubernetes API error, will retry"
                );
                tokio::time::sleep(duration).await;
            }
        }
    }
}

/// Retry a DNS API read with exponential backoff.
///
/// # Errors
///
/// Returns the last [`DnsError`] once a non-retryable error is seen or the backoff
/// is exhausted.
pub async fn retry_http_call<T, F, Fut>(
    mut operation: F,
    operation_name: &str,
) -> Result<T, DnsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DnsError>>,
{
    let mut backoff = http_backoff();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !is_retryable_dns_error(&e) => return Err(e),
            Err(e) => {
                let Some(duration) = backoff.next_backoff() else {
                    error!(operation = operation_name, attempt, error = %e, "Backoff exhausted, giving up");
                    return Err(e);
                };
                warn!(
                    operation = operation_name,
                    attempt,
                    retry_after = ?duration,
                    error = %e,
                    "Retryable DNS API error, will retry"
                );
                tokio::time::sleep(duration).await;
            }
        }
    }
}

/// Retry on rate limiting, server errors and connection errors.
#[must_use]
pub fn is_retryable_kube_error(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(api_err) => {
            api_err.code == 429 || (api_err.code >= 500 && api_err.code < 600)
        }
        kube::Error::Service(_) => true,
        _ => false,
    }
}

/// Retry on connection failures, timeouts and retryable HTTP statuses.
#[must_use]
pub fn is_retryable_dns_error(err: &DnsError) -> bool {
    match err {
        DnsError::Provider(
            ProviderError::HttpConnectionFailed { .. } | ProviderError::HttpRequestTimeout { .. },
        ) => true,
        DnsError::Provider(ProviderError::UnexpectedHttpResponse { status_code, .. }) => {
            StatusCode::from_u16(*status_code).is_ok_and(is_retryable_http_status)
        }
        _ => false,
    }
}
