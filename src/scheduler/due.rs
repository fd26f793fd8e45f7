//! Due-check selection.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::db::{CheckResult, Target};

/// Whether `target` should be probed at `now`.
///
/// A target that was never checked is always due. Otherwise it is due once
/// `min_interval` has fully elapsed since its last attempt, whatever that
/// attempt's outcome. A last check stamped in the future is never due.
pub fn is_due(
    _target: &Target,
    last_result: Option<&CheckResult>,
    now: DateTime<Utc>,
    min_interval: Duration,
) -> bool {
    let Some(last) = last_result else {
        return true;
    };

    let elapsed = now.signed_duration_since(last.checked_at);
    match elapsed.to_std() {
        Ok(elapsed) => elapsed >= min_interval,
        // Negative elapsed time
        Err(_) => false,
    }
}
