//! In-memory store of Monte Carlo runs

use super::cancel::CancellationToken;
use super::stats::MonteCarloAggregate;
use super::{MonteCarloConfig, MonteCarloError, MonteCarloResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

/// Runs kept before finished ones are evicted
pub const MAX_STORED_RUNS: usize = 20;

/// Extra finished runs dropped on eviction so it does not run on every create
const EVICTION_HEADROOM: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonteCarloStatus {
    Pending,
    Running,
    Completed,
    Cancelled,
    Error,
}

impl MonteCarloStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Error)
    }
}

impl fmt::Display for MonteCarloStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloRun {
    pub id: RunId,
    pub config: MonteCarloConfig,
    pub status: MonteCarloStatus,
    pub iterations_completed: usize,
    pub iterations_failed: usize,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<MonteCarloAggregate>,
    pub error: Option<String>,
    #[serde(skip)]
    cancel: CancellationToken,
}

impl MonteCarloRun {
    fn new(config: MonteCarloConfig) -> Self {
        Self {
            id: RunId::new(),
            config,
            status: MonteCarloStatus::Pending,
            iterations_completed: 0,
            iterations_failed: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn progress(&self) -> RunProgress {
        let total = self.config.num_iterations;
        let done = self.iterations_completed + self.iterations_failed;
        RunProgress {
            id: self.id,
            status: self.status,
            iterations_completed: self.iterations_completed,
            iterations_failed: self.iterations_failed,
            total_iterations: total,
            progress_pct: if total == 0 {
                0.0
            } else {
                done as f64 / total as f64 * 100.0
            },
            error: self.error.clone(),
        }
    }
}

/// Status snapshot of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunProgress {
    pub id: RunId,
    pub status: MonteCarloStatus,
    pub iterations_completed: usize,
    pub iterations_failed: usize,
    pub total_iterations: usize,
    pub progress_pct: f64,
    pub error: Option<String>,
}

/// Concurrent registry of runs, keyed by [`RunId`]
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: DashMap<RunId, MonteCarloRun>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config and register a pending run
    pub fn create(&self, config: MonteCarloConfig) -> MonteCarloResult<RunId> {
        config.validate()?;
        self.evict_finished();
        let run = MonteCarloRun::new(config);
        let id = run.id;
        self.runs.insert(id, run);
        debug!(run = %id, "registered Monte Carlo run");
        Ok(id)
    }

    /// Drop the oldest finished runs once the registry is full
    fn evict_finished(&self) {
        let len = self.runs.len();
        if len < MAX_STORED_RUNS {
            return;
        }
        let mut finished: Vec<(DateTime<Utc>, RunId)> = self
            .runs
            .iter()
            .filter(|entry| entry.status.is_finished())
            .filter_map(|entry| entry.completed_at.map(|at| (at, entry.id)))
            .collect();
        finished.sort();
        let excess = len - MAX_STORED_RUNS + EVICTION_HEADROOM;
        let evicted = finished
            .into_iter()
            .take(excess)
            .filter(|(_, id)| self.runs.remove(id).is_some())
            .count();
        if evicted > 0 {
            info!(evicted, remaining = self.runs.len(), "evicted finished Monte Carlo runs");
        }
    }

    pub fn get(&self, id: &RunId) -> Option<MonteCarloRun> {
        self.runs.get(id).map(|r| r.clone())
    }

    pub fn status(&self, id: &RunId) -> MonteCarloResult<RunProgress> {
        self.runs
            .get(id)
            .map(|r| r.progress())
            .ok_or(MonteCarloError::RunNotFound(*id))
    }

    pub fn list(&self) -> Vec<RunProgress> {
        let mut runs: Vec<_> = self.runs.iter().map(|r| (r.created_at, r.progress())).collect();
        runs.sort_by_key(|(created, _)| *created);
        runs.into_iter().map(|(_, p)| p).collect()
    }

    /// Request cancellation; only a running run can be cancelled
    pub fn cancel(&self, id: &RunId) -> MonteCarloResult<bool> {
        let mut run = self.runs.get_mut(id).ok_or(MonteCarloError::RunNotFound(*id))?;
        if run.status != MonteCarloStatus::Running || !run.cancel.cancel() {
            return Ok(false);
        }
        run.status = MonteCarloStatus::Cancelled;
        info!(run = %id, "Monte Carlo run cancellation requested");
        Ok(true)
    }

    /// Aggregate of a completed run
    pub fn results(&self, id: &RunId) -> MonteCarloResult<MonteCarloAggregate> {
        let run = self.runs.get(id).ok_or(MonteCarloError::RunNotFound(*id))?;
        match (&run.status, &run.result) {
            (MonteCarloStatus::Completed, Some(result)) => Ok(result.clone()),
            (status, _) => Err(MonteCarloError::RunNotComplete { id: *id, status: *status }),
        }
    }

    pub fn remove(&self, id: &RunId) -> Option<MonteCarloRun> {
        self.runs.remove(id).map(|(_, run)| run)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Mark a run as running and hand out what the workers need
    pub(crate) fn begin(&self, id: &RunId) -> MonteCarloResult<(MonteCarloConfig, CancellationToken)> {
        let mut run = self.runs.get_mut(id).ok_or(MonteCarloError::RunNotFound(*id))?;
        run.status = MonteCarloStatus::Running;
        run.started_at = Some(Utc::now());
        Ok((run.config.clone(), run.cancel.clone()))
    }

    pub(crate) fn record_iteration(&self, id: &RunId, succeeded: bool) {
        if let Some(mut run) = self.runs.get_mut(id) {
            if succeeded {
                run.iterations_completed += 1;
            } else {
                run.iterations_failed += 1;
            }
        }
    }

    pub(crate) fn finish_completed(&self, id: &RunId, aggregate: MonteCarloAggregate) {
        self.finish(id, |run| {
            run.status = MonteCarloStatus::Completed;
            run.result = Some(aggregate);
        });
    }

    pub(crate) fn finish_cancelled(&self, id: &RunId) {
        self.finish(id, |run| run.status = MonteCarloStatus::Cancelled);
    }

    pub(crate) fn finish_error(&self, id: &RunId, message: String) {
        self.finish(id, |run| {
            run.status = MonteCarloStatus::Error;
            run.error = Some(message);
        });
    }

    /// A cancelled run stays cancelled whatever the workers report
    fn finish(&self, id: &RunId, apply: impl FnOnce(&mut MonteCarloRun)) {
        if let Some(mut run) = self.runs.get_mut(id) {
            if run.is_cancelled() {
                run.status = MonteCarloStatus::Cancelled;
            } else {
                apply(&mut run);
            }
            run.completed_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MonteCarloConfig {
        MonteCarloConfig {
            num_iterations: 4,
            ..MonteCarloConfig::default()
        }
    }

    #[test]
    fn create_registers_pending_run() {
        let registry = RunRegistry::new();
        let id = registry.create(config()).unwrap();
        let progress = registry.status(&id).unwrap();
        assert_eq!(progress.status, MonteCarloStatus::Pending);
        assert_eq!(progress.total_iterations, 4);
        assert_eq!(progress.progress_pct, 0.0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let registry = RunRegistry::new();
        let bad = MonteCarloConfig {
            contamination_rate: 2.0,
            ..config()
        };
        assert!(matches!(registry.create(bad), Err(MonteCarloError::Config(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_run_is_not_found() {
        let registry = RunRegistry::new();
        assert!(matches!(registry.status(&RunId::new()), Err(MonteCarloError::RunNotFound(_))));
        assert!(matches!(registry.cancel(&RunId::new()), Err(MonteCarloError::RunNotFound(_))));
    }

    #[test]
    fn only_running_runs_cancel() {
        let registry = RunRegistry::new();
        let id = registry.create(config()).unwrap();
        assert!(!registry.cancel(&id).unwrap());

        let (_, token) = registry.begin(&id).unwrap();
        assert!(registry.cancel(&id).unwrap());
        assert!(token.is_cancelled());
        assert_eq!(registry.status(&id).unwrap().status, MonteCarloStatus::Cancelled);
        assert!(!registry.cancel(&id).unwrap());
    }

    #[test]
    fn cancelled_run_ignores_late_completion() {
        let registry = RunRegistry::new();
        let id = registry.create(config()).unwrap();
        registry.begin(&id).unwrap();
        registry.cancel(&id).unwrap();
        registry.finish_completed(&id, MonteCarloAggregate::from_results(4, &[]));

        let run = registry.get(&id).unwrap();
        assert_eq!(run.status, MonteCarloStatus::Cancelled);
        assert!(run.result.is_none());
        assert!(run.completed_at.is_some());
        assert!(matches!(
            registry.results(&id),
            Err(MonteCarloError::RunNotComplete {
                status: MonteCarloStatus::Cancelled,
                ..
            })
        ));
    }

    #[test]
    fn progress_counts_failures() {
        let registry = RunRegistry::new();
        let id = registry.create(config()).unwrap();
        registry.begin(&id).unwrap();
        registry.record_iteration(&id, true);
        registry.record_iteration(&id, false);
        let progress = registry.status(&id).unwrap();
        assert_eq!(progress.iterations_completed, 1);
        assert_eq!(progress.iterations_failed, 1);
        assert_eq!(progress.progress_pct, 50.0);
    }

    #[test]
    fn full_registry_evicts_oldest_finished_runs() {
        let registry = RunRegistry::new();
        let base = Utc::now();
        let mut ids = Vec::new();
        for i in 0..MAX_STORED_RUNS {
            let id = registry.create(config()).unwrap();
            registry.begin(&id).unwrap();
            registry.finish_error(&id, "boom".to_string());
            registry.runs.get_mut(&id).unwrap().completed_at = Some(base + chrono::Duration::seconds(i as i64));
            ids.push(id);
        }
        assert_eq!(registry.len(), MAX_STORED_RUNS);

        let newest = registry.create(config()).unwrap();
        assert_eq!(registry.len(), MAX_STORED_RUNS - EVICTION_HEADROOM + 1);
        assert!(registry.get(&ids[0]).is_none());
        assert!(registry.get(&ids[MAX_STORED_RUNS - 1]).is_some());
        assert!(registry.get(&newest).is_some());
    }

    #[test]
    fn unfinished_runs_are_never_evicted() {
        let registry = RunRegistry::new();
        for _ in 0..MAX_STORED_RUNS {
            registry.create(config()).unwrap();
        }
        registry.create(config()).unwrap();
        assert_eq!(registry.len(), MAX_STORED_RUNS + 1);
    }
}
