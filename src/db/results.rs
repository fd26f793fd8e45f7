//! Storage contracts consumed by the check cycle.
//!
//! Two result persistence variants exist and a deployment picks exactly one:
//! an append-only history table, or the latest result kept inline on the
//! target row. The cycle only ever sees [`ResultStore`].

use std::sync::Arc;

use super::{CheckResult, DbError, Store, Target};

/// Read-only enumeration of targets to monitor.
pub trait TargetSource: Send + Sync {
    fn list_active(&self) -> Result<Vec<Target>, DbError>;
}

/// Where probe results go and where the last one is read back from.
pub trait ResultStore: Send + Sync {
    /// The most recent recorded attempt for a target, if any.
    fn latest(&self, target_id: i64) -> Result<Option<CheckResult>, DbError>;

    /// Record one completed attempt.
    fn record(&self, result: &CheckResult) -> Result<(), DbError>;

    /// Recorded attempts, newest first.
    fn history(&self, target_id: i64, limit: u32) -> Result<Vec<CheckResult>, DbError>;
}

impl TargetSource for Store {
    fn list_active(&self) -> Result<Vec<Target>, DbError> {
        self.get_active_targets()
    }
}

/// Append-only result history.
pub struct HistoryResults {
    store: Arc<Store>,
}

impl HistoryResults {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

impl ResultStore for HistoryResults {
    fn latest(&self, target_id: i64) -> Result<Option<CheckResult>, DbError> {
        self.store.latest_check_result(target_id)
    }

    fn record(&self, result: &CheckResult) -> Result<(), DbError> {
        self.store.append_check_result(result)
    }

    fn history(&self, target_id: i64, limit: u32) -> Result<Vec<CheckResult>, DbError> {
        self.store.get_check_results(target_id, limit)
    }
}

/// Last-write-wins result fields stored on the target itself.
pub struct LatestOnlyResults {
    store: Arc<Store>,
}

impl LatestOnlyResults {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

impl ResultStore for LatestOnlyResults {
    fn latest(&self, target_id: i64) -> Result<Option<CheckResult>, DbError> {
        self.store.get_inline_latest(target_id)
    }

    fn record(&self, result: &CheckResult) -> Result<(), DbError> {
        self.store.update_latest_check(result)
    }

    fn history(&self, target_id: i64, limit: u32) -> Result<Vec<CheckResult>, DbError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self.latest(target_id)?.into_iter().collect())
    }
}
