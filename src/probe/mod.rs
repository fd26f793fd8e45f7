//! Probe module for URL health checks.
//!
//! A probe never fails outward: every error is folded into a [`ProbeOutcome`]
//! carrying a status code and an error message.

mod http;

pub use http::*;

use std::future::Future;
use std::time::Duration;
use serde::Serialize;
use thiserror::Error;

/// Status recorded when no real HTTP status could be obtained.
pub const SENTINEL_STATUS: u16 = 500;

/// Default per-probe time budget.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("client setup failed: {0}")]
    Client(String),
}

impl ProbeError {
    /// The HTTP status to record for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            ProbeError::Status(code) => *code,
            _ => SENTINEL_STATUS,
        }
    }
}

/// Metrics captured by one probe attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeOutcome {
    pub status_code: u16,
    pub html_size: u64,
    pub link_count: u64,
    pub response_time_ms: u64,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn failed(err: &ProbeError) -> Self {
        Self {
            status_code: err.status_code(),
            html_size: 0,
            link_count: 0,
            response_time_ms: 0,
            error: Some(err.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Something that can probe a URL within a time budget.
pub trait Prober: Send + Sync + 'static {
    fn probe(&self, url: &str, timeout: Duration) -> impl Future<Output = ProbeOutcome> + Send;
}

/// Count opening anchor tags by the literal `<a ` pattern.
///
/// This is a rough heuristic, not HTML parsing: `<A ` and `<a>` are not
/// counted, and `<a ` inside scripts or comments is.
pub fn count_links(body: &[u8]) -> u64 {
    body.windows(3).filter(|w| *w == b"<a ").count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_links() {
        assert_eq!(count_links(b"<a href=1><a href=2>"), 2);
        assert_eq!(count_links(b"<html><body>no anchors</body></html>"), 0);
        assert_eq!(count_links(b""), 0);
        assert_eq!(count_links(b"<A HREF=x><a>"), 0);
    }

    #[test]
    fn test_failed_outcome_uses_sentinel() {
        let outcome = ProbeOutcome::failed(&ProbeError::Network("dns error".to_string()));
        assert_eq!(outcome.status_code, SENTINEL_STATUS);
        assert_eq!(outcome.html_size, 0);
        assert_eq!(outcome.link_count, 0);
        assert!(outcome.is_failure());

        let outcome = ProbeOutcome::failed(&ProbeError::Status(404));
        assert_eq!(outcome.status_code, 404);
    }
}
