//! HTTP error classification shared by the analysis service adapters.

use reqwest::{header::RETRY_AFTER, Response, StatusCode};
use std::time::Duration;

use crate::services::retry::{FailureKind, Retryable};

/// Maximum characters of an error body kept for diagnostics.
const BODY_PREVIEW_CHARS: usize = 500;

/// Upper bound on a server-supplied retry hint.
pub const MAX_RETRY_HINT: Duration = Duration::from_secs(3600);

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: StatusCode,
        retry_after: Option<Duration>,
        body: String,
    },
}

impl Retryable for UpstreamError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            UpstreamError::Http(e) if e.is_timeout() || e.is_connect() => FailureKind::Transient,
            UpstreamError::Http(_) => FailureKind::Permanent,
            UpstreamError::Status {
                status, retry_after, ..
            } => classify_status(*status, *retry_after),
        }
    }
}

pub fn classify_status(status: StatusCode, retry_after: Option<Duration>) -> FailureKind {
    if status == StatusCode::TOO_MANY_REQUESTS {
        FailureKind::RateLimited { retry_after }
    } else if status == StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
        FailureKind::Transient
    } else {
        FailureKind::Permanent
    }
}

/// Pass successful responses through; turn anything else into a classified error.
pub async fn check_response(service: &'static str, response: Response) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let header_hint = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after_header);
    let body = response.text().await.unwrap_or_default();
    let retry_after = header_hint.or_else(|| parse_retry_delay_body(&body));

    Err(UpstreamError::Status {
        service,
        status,
        retry_after,
        body: truncate(&body),
    })
}

/// `Retry-After: <seconds>`, capped at `MAX_RETRY_HINT`. HTTP-date values are ignored.
pub fn parse_retry_after_header(value: &str) -> Option<Duration> {
    let secs = value.trim().parse::<f64>().ok().filter(|s| s.is_finite() && *s >= 0.0)?;
    let hint = Duration::try_from_secs_f64(secs).unwrap_or(MAX_RETRY_HINT);
    Some(hint.min(MAX_RETRY_HINT))
}

/// Google-style `RetryInfo` detail: `{"error": {"details": [{"retryDelay": "17s"}]}}`.
pub fn parse_retry_delay_body(body: &str) -> Option<Duration> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/details")?
        .as_array()?
        .iter()
        .filter_map(|detail| detail.get("retryDelay")?.as_str())
        .find_map(|delay| parse_retry_after_header(delay.trim().trim_end_matches('s')))
}

fn truncate(body: &str) -> String {
    if body.chars().count() <= BODY_PREVIEW_CHARS {
        body.to_string()
    } else {
        body.chars().take(BODY_PREVIEW_CHARS).collect()
    }
}
