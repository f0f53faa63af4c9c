//! Iteration execution on a bounded worker pool

use super::cancel::CancellationToken;
use super::registry::{RunId, RunRegistry};
use super::stats::MonteCarloAggregate;
use super::{MonteCarloConfig, MonteCarloResult};
use crate::investigation::IdentificationOutcome;
use crate::simulation::{OutbreakSimulator, SimulationReport, SimulationResult};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

/// Headline numbers of one iteration
#[derive(Debug, Clone, Serialize)]
pub struct IterationResult {
    pub iteration: usize,
    pub random_seed: u64,

    pub farm_scope_expansion: f64,
    pub tlc_scope_expansion: f64,
    pub tlcs_location_expansion: f64,
    pub path_expansion: f64,
    pub timing_expansion: f64,

    pub deterministic_farms: usize,
    pub probabilistic_farms: usize,
    pub deterministic_tlcs: usize,
    pub probabilistic_tlcs: usize,
    pub deterministic_tlcs_locations: usize,
    pub probabilistic_tlcs_locations: usize,

    pub deterministic_outcome: IdentificationOutcome,
    pub probabilistic_outcome: IdentificationOutcome,
    pub deterministic_source_rank: usize,
    pub probabilistic_source_rank: usize,

    pub total_cases: usize,
    pub deterministic_investigation_days: f64,
    pub probabilistic_investigation_days: f64,
    pub deterministic_work_hours: f64,
    pub probabilistic_work_hours: f64,
}

impl IterationResult {
    pub fn from_report(iteration: usize, random_seed: u64, report: &SimulationReport) -> Self {
        let det = &report.comparison.deterministic;
        let prob = &report.comparison.probabilistic;
        let expansion = &report.comparison.comparison;
        Self {
            iteration,
            random_seed,
            farm_scope_expansion: expansion.farm_scope_expansion,
            tlc_scope_expansion: expansion.tlc_scope_expansion,
            tlcs_location_expansion: expansion.tlcs_location_expansion,
            path_expansion: expansion.path_expansion,
            timing_expansion: expansion.timing_expansion,
            deterministic_farms: det.farms_in_scope,
            probabilistic_farms: prob.farms_in_scope,
            deterministic_tlcs: det.tlcs_in_scope,
            probabilistic_tlcs: prob.tlcs_in_scope,
            deterministic_tlcs_locations: det.tlcs_locations,
            probabilistic_tlcs_locations: prob.tlcs_locations,
            deterministic_outcome: det.identification_outcome,
            probabilistic_outcome: prob.identification_outcome,
            deterministic_source_rank: det.source_rank,
            probabilistic_source_rank: prob.source_rank,
            total_cases: report.metrics.total_cases,
            deterministic_investigation_days: det.investigation_timing.total_calendar_days,
            probabilistic_investigation_days: prob.investigation_timing.total_calendar_days,
            deterministic_work_hours: det.investigation_timing.total_work_hours,
            probabilistic_work_hours: prob.investigation_timing.total_work_hours,
        }
    }
}

/// Run one seeded iteration to completion on the current thread
pub fn run_iteration(
    config: &MonteCarloConfig,
    iteration: usize,
    seed: u64,
    start_date: NaiveDate,
) -> SimulationResult<IterationResult> {
    let report = OutbreakSimulator::new(config.to_simulation_config(seed, start_date)).run_comparison()?;
    Ok(IterationResult::from_report(iteration, seed, &report))
}

/// How one scheduled piece of work ended
enum Attempt<T> {
    Finished(T),
    Panicked(String),
    TimedOut,
    Skipped,
}

/// Run `work` on the blocking pool once a worker slot is free
///
/// The permit moves into the blocking closure, so work that outlives its
/// timeout keeps the slot until it returns.
async fn attempt<T, F>(semaphore: Arc<Semaphore>, token: CancellationToken, limit: Duration, work: F) -> Attempt<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let Ok(permit) = semaphore.acquire_owned().await else {
        return Attempt::Skipped;
    };
    if token.is_cancelled() {
        return Attempt::Skipped;
    }
    let handle = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        work()
    });
    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(value)) => Attempt::Finished(value),
        Ok(Err(join_err)) => Attempt::Panicked(join_err.to_string()),
        Err(_) => Attempt::TimedOut,
    }
}

/// Execute every iteration of a registered run and store the outcome
///
/// Iterations run on the blocking pool, at most `worker_count` at a time,
/// each under the configured timeout. Timeouts and failures count against
/// the run but do not stop it. Cancellation is checked as each iteration
/// finishes; a cancelled run keeps no aggregate.
pub async fn execute_run(registry: Arc<RunRegistry>, id: RunId) -> MonteCarloResult<()> {
    let (config, token) = registry.begin(&id)?;
    let config = Arc::new(config);
    let workers = config.worker_count();
    let timeout = Duration::from_secs(config.iteration_timeout_secs);
    let base_seed = config.base_random_seed.unwrap_or_else(rand::random);
    let start_date = config.resolved_start_date();
    info!(run = %id, iterations = config.num_iterations, workers, %start_date, "Monte Carlo run started");

    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();
    for iteration in 0..config.num_iterations {
        let config = Arc::clone(&config);
        let seed = base_seed.wrapping_add(iteration as u64);
        let work = move || run_iteration(&config, iteration, seed, start_date);
        let pending = attempt(Arc::clone(&semaphore), token.clone(), timeout, work);
        tasks.spawn(async move { (iteration, pending.await) });
    }

    let mut results = Vec::with_capacity(config.num_iterations);
    while let Some(joined) = tasks.join_next().await {
        if token.is_cancelled() {
            tasks.abort_all();
            break;
        }
        match joined {
            Ok((_, Attempt::Finished(Ok(result)))) => {
                results.push(result);
                registry.record_iteration(&id, true);
            }
            Ok((iteration, Attempt::Finished(Err(err)))) => {
                warn!(run = %id, iteration, error = %err, "Monte Carlo iteration failed");
                registry.record_iteration(&id, false);
            }
            Ok((iteration, Attempt::Panicked(message))) => {
                warn!(run = %id, iteration, error = %message, "Monte Carlo iteration panicked");
                registry.record_iteration(&id, false);
            }
            Ok((iteration, Attempt::TimedOut)) => {
                warn!(run = %id, iteration, timeout_secs = config.iteration_timeout_secs, "Monte Carlo iteration timed out");
                registry.record_iteration(&id, false);
            }
            Ok((_, Attempt::Skipped)) => {}
            Err(join_err) => {
                warn!(run = %id, error = %join_err, "Monte Carlo task aborted");
                registry.record_iteration(&id, false);
            }
        }
    }

    if token.is_cancelled() {
        registry.finish_cancelled(&id);
        info!(run = %id, collected = results.len(), "Monte Carlo run cancelled");
        return Ok(());
    }
    if results.is_empty() {
        registry.finish_error(&id, "all iterations failed".to_string());
        return Ok(());
    }

    results.sort_by_key(|r| r.iteration);
    debug!(run = %id, collected = results.len(), "aggregating Monte Carlo results");
    let aggregate = MonteCarloAggregate::from_results(config.num_iterations, &results);
    info!(
        run = %id,
        completed = aggregate.num_iterations_completed,
        failed = aggregate.num_iterations_failed,
        "Monte Carlo run completed"
    );
    registry.finish_completed(&id, aggregate);
    Ok(())
}

/// Register a run and execute it in the background
pub fn start_run(
    registry: &Arc<RunRegistry>,
    config: MonteCarloConfig,
) -> MonteCarloResult<(RunId, JoinHandle<MonteCarloResult<()>>)> {
    let id = registry.create(config)?;
    let handle = tokio::spawn(execute_run(Arc::clone(registry), id));
    Ok((id, handle))
}
