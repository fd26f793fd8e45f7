//! One pass over all active targets.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::{is_due, Clock};
use crate::db::{CheckResult, DbError, ResultStore, Target, TargetSource};
use crate::probe::{Prober, DEFAULT_PROBE_TIMEOUT};

/// Tunables for a check cycle.
#[derive(Debug, Clone)]
pub struct CycleOptions {
    pub probe_timeout: Duration,
    /// Upper bound on probes in flight within one cycle
    pub max_concurrent_probes: usize,
    /// When false every active target is probed on every cycle
    pub dedup: bool,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            max_concurrent_probes: 5,
            dedup: true,
        }
    }
}

/// Counts from one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Targets probed and recorded, successful or not
    pub probed: usize,
    pub skipped: usize,
    /// Probed targets whose probe failed
    pub failed: usize,
    /// Targets whose result could not be looked up or recorded
    pub store_errors: usize,
    /// Set when targets could not be listed at all
    pub aborted: bool,
}

enum TargetStep {
    Skipped,
    Recorded { failed: bool },
    StoreError,
}

impl CycleSummary {
    fn add(&mut self, step: TargetStep) {
        match step {
            TargetStep::Skipped => self.skipped += 1,
            TargetStep::Recorded { failed } => {
                self.probed += 1;
                if failed {
                    self.failed += 1;
                }
            }
            TargetStep::StoreError => self.store_errors += 1,
        }
    }
}

/// Probes due targets and records their results.
pub struct CheckCycle<P: Prober> {
    targets: Arc<dyn TargetSource>,
    results: Arc<dyn ResultStore>,
    prober: Arc<P>,
    clock: Arc<dyn Clock>,
    options: CycleOptions,
}

impl<P: Prober> Clone for CheckCycle<P> {
    fn clone(&self) -> Self {
        Self {
            targets: self.targets.clone(),
            results: self.results.clone(),
            prober: self.prober.clone(),
            clock: self.clock.clone(),
            options: self.options.clone(),
        }
    }
}

impl<P: Prober> CheckCycle<P> {
    pub fn new(
        targets: Arc<dyn TargetSource>,
        results: Arc<dyn ResultStore>,
        prober: Arc<P>,
        clock: Arc<dyn Clock>,
        options: CycleOptions,
    ) -> Self {
        Self {
            targets,
            results,
            prober,
            clock,
            options,
        }
    }

    pub fn results(&self) -> &Arc<dyn ResultStore> {
        &self.results
    }

    pub fn prober(&self) -> &Arc<P> {
        &self.prober
    }

    pub fn probe_timeout(&self) -> Duration {
        self.options.probe_timeout
    }

    /// Run one cycle, logging rather than returning failures.
    pub async fn run_cycle(&self, min_interval: Duration) -> CycleSummary {
        tracing::info!("Check cycle: starting");

        match self.try_run_cycle(min_interval).await {
            Ok(summary) => {
                tracing::info!(
                    probed = summary.probed,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    store_errors = summary.store_errors,
                    "Check cycle: finished"
                );
                summary
            }
            Err(e) => {
                tracing::error!("Check cycle: failed to list targets: {}", e);
                CycleSummary {
                    aborted: true,
                    ..Default::default()
                }
            }
        }
    }

    /// Run one cycle. Only a failure to list targets is returned as an error;
    /// per-target failures are counted in the summary.
    pub async fn try_run_cycle(&self, min_interval: Duration) -> Result<CycleSummary, DbError> {
        let targets = self.targets.list_active()?;

        let semaphore = Arc::new(Semaphore::new(self.options.max_concurrent_probes.max(1)));
        let mut tasks = JoinSet::new();
        let mut seen = HashSet::new();
        let mut summary = CycleSummary::default();

        for target in targets {
            if !seen.insert(target.id) {
                continue;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(p) => p,
                Err(_) => break,
            };
            let cycle = self.clone();

            tasks.spawn(async move {
                let _permit = permit; // Hold permit until done
                cycle.step(&target, min_interval).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(step) => summary.add(step),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => tracing::error!("Check cycle: task cancelled: {}", e),
            }
        }

        Ok(summary)
    }

    async fn step(&self, target: &Target, min_interval: Duration) -> TargetStep {
        if self.options.dedup {
            let last = match self.results.latest(target.id) {
                Ok(last) => last,
                Err(e) => {
                    tracing::error!("Failed to load last result for {}: {}", target.url, e);
                    return TargetStep::StoreError;
                }
            };

            if !is_due(target, last.as_ref(), self.clock.now(), min_interval) {
                tracing::debug!("Skipping {} (checked recently)", target.url);
                return TargetStep::Skipped;
            }
        }

        match self.check_target(target).await {
            Ok(result) => TargetStep::Recorded {
                failed: result.is_failure(),
            },
            Err(e) => {
                tracing::error!("Failed to record result for {}: {}", target.url, e);
                TargetStep::StoreError
            }
        }
    }

    /// Probe one target now and record the result, regardless of when it was
    /// last checked.
    pub async fn check_target(&self, target: &Target) -> Result<CheckResult, DbError> {
        let outcome = self.prober.probe(&target.url, self.options.probe_timeout).await;
        let result = CheckResult::from_outcome(target.id, outcome, self.clock.now());

        match &result.error {
            None => tracing::info!(
                "Checked {} ({} in {}ms)",
                target.url,
                result.status_code,
                result.response_time_ms
            ),
            Some(err) => tracing::warn!("Error checking {}: {}", target.url, err),
        }

        self.results.record(&result)?;
        Ok(result)
    }
}
