//! HTTP probe implementation.

use std::time::{Duration, Instant};
use super::{count_links, ProbeError, ProbeOutcome, Prober};

/// Probes URLs with a single GET, sharing one connection pool.
#[derive(Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("checkhtml/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> Result<ProbeOutcome, ProbeError> {
        let start = Instant::now();

        let response = self
            .client
            .get(normalize_url(url))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        // Read the full body to measure complete transfer time
        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, timeout))?;

        Ok(ProbeOutcome {
            status_code: status.as_u16(),
            html_size: body.len() as u64,
            link_count: count_links(&body),
            response_time_ms: start.elapsed().as_millis() as u64,
            error: None,
        })
    }
}

impl Prober for HttpProber {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        // The request timeout covers the body too; this bounds anything it misses.
        let result = match tokio::time::timeout(timeout, self.fetch(url, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(timeout)),
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) => ProbeOutcome::failed(&e),
        }
    }
}

fn normalize_url(address: &str) -> String {
    let address = address.trim();
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

fn map_reqwest_error(e: reqwest::Error, timeout: Duration) -> ProbeError {
    if e.is_timeout() {
        ProbeError::Timeout(timeout)
    } else if let Some(status) = e.status() {
        ProbeError::Status(status.as_u16())
    } else {
        ProbeError::Network(e.to_string())
    }
}
