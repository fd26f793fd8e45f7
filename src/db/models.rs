//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::probe::ProbeOutcome;

/// A monitored URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: i64,
    pub url: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            id: 0,
            url: String::new(),
            active: true,
            created_at: Utc::now(),
        }
    }
}

/// The outcome of one probe attempt against a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub target_id: i64,
    pub status_code: u16,
    /// Body length in bytes, 0 on failure
    pub html_size: u64,
    pub link_count: u64,
    pub response_time_ms: u64,
    pub checked_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    /// Attach a probe outcome to its target, stamped at completion time.
    pub fn from_outcome(target_id: i64, outcome: ProbeOutcome, checked_at: DateTime<Utc>) -> Self {
        Self {
            target_id,
            status_code: outcome.status_code,
            html_size: outcome.html_size,
            link_count: outcome.link_count,
            response_time_ms: outcome.response_time_ms,
            checked_at,
            error: outcome.error,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}
