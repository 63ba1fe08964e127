//! Bounded-retry JSON delivery to the collector.
//!
//! One call performs up to `max_retries + 1` POST attempts with exponential
//! backoff between them. Failures are split into retryable (network errors,
//! timeouts, 5xx and other unexpected statuses) and terminal (2xx success,
//! or 400/401/403: a malformed request or bad credentials will not get
//! better on retry). Outcomes are logged, never propagated: delivery must
//! not disrupt the user-facing flow that triggered it.

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;

/// Per-attempt request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(4000);

/// Retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Backoff before the first retry; doubles per attempt.
const BASE_BACKOFF: Duration = Duration::from_millis(500);

/// Delivery policy for one call.
#[derive(Debug, Clone)]
pub struct DeliveryOptions {
    /// Per-attempt timeout; the in-flight request is aborted when it fires.
    pub timeout: Duration,
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Terminal state of one delivery call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The collector answered 2xx.
    Delivered,
    /// The collector answered 400/401/403; not retried.
    Rejected(StatusCode),
    /// All attempts failed (unexpected status, network error or timeout).
    Exhausted,
}

impl DeliveryOutcome {
    /// True when the event reached the collector.
    pub fn is_delivered(self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// Statuses that indicate the request itself is bad; retrying cannot help.
fn is_non_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
    )
}

/// Backoff before the retry following attempt `attempt` (counted from 0).
fn backoff_delay(attempt: u32) -> Duration {
    BASE_BACKOFF * 2u32.saturating_pow(attempt)
}

/// POSTs `payload` as JSON to `url`, retrying per `options`.
///
/// `headers` are merged over the default `Content-Type: application/json`.
/// Each attempt owns its timeout: aborting one attempt never leaks a timer
/// into the next. The returned outcome is informational; callers in the
/// bot fire-and-forget this future and never inspect it.
pub async fn deliver<T>(
    client: &reqwest::Client,
    url: &str,
    payload: &T,
    headers: HeaderMap,
    options: &DeliveryOptions,
) -> DeliveryOutcome
where
    T: Serialize + ?Sized,
{
    let mut attempt: u32 = 0;
    loop {
        let result = client
            .post(url)
            .json(payload)
            .headers(headers.clone())
            .timeout(options.timeout)
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    log::debug!("Event delivered to {} (attempt {})", url, attempt + 1);
                    return DeliveryOutcome::Delivered;
                }
                if is_non_retryable(status) {
                    log::warn!("Collector rejected event with {}, not retrying", status);
                    return DeliveryOutcome::Rejected(status);
                }
                if attempt >= options.max_retries {
                    log::warn!(
                        "Collector returned {} after {} attempt(s), giving up",
                        status,
                        attempt + 1
                    );
                    return DeliveryOutcome::Exhausted;
                }
                log::debug!(
                    "Collector returned {} (attempt {}), retrying in {:?}",
                    status,
                    attempt + 1,
                    backoff_delay(attempt)
                );
            }
            Err(err) => {
                if attempt >= options.max_retries {
                    log::error!("Failed to deliver event to {}: {}", url, err);
                    return DeliveryOutcome::Exhausted;
                }
                log::debug!(
                    "Delivery attempt {} failed ({}), retrying in {:?}",
                    attempt + 1,
                    err,
                    backoff_delay(attempt)
                );
            }
        }

        tokio::time::sleep(backoff_delay(attempt)).await;
        attempt += 1;
    }
}
