//! Monte Carlo batches through the run registry

use chrono::NaiveDate;
use outbreak_trace::monte_carlo::run_iteration;
use outbreak_trace::{
    execute_run, start_run, MonteCarloConfig, MonteCarloError, MonteCarloStatus, RunRegistry,
};
use std::sync::Arc;
use std::time::Duration;

fn small_batch(iterations: usize) -> MonteCarloConfig {
    MonteCarloConfig {
        num_farms: 3,
        num_retailers: 6,
        simulation_days: 14,
        num_iterations: iterations,
        base_random_seed: Some(100),
        num_workers: Some(2),
        ..MonteCarloConfig::default()
    }
}

#[tokio::test]
async fn batch_completes_and_aggregates() {
    let registry = Arc::new(RunRegistry::new());
    let id = registry.create(small_batch(4)).unwrap();
    execute_run(Arc::clone(&registry), id).await.unwrap();

    let progress = registry.status(&id).unwrap();
    assert_eq!(progress.status, MonteCarloStatus::Completed);
    assert_eq!(progress.iterations_completed + progress.iterations_failed, 4);
    assert!((progress.progress_pct - 100.0).abs() < 1e-9);

    let aggregate = registry.results(&id).unwrap();
    assert_eq!(aggregate.num_iterations, 4);
    assert_eq!(
        aggregate.num_iterations_completed + aggregate.num_iterations_failed,
        aggregate.num_iterations
    );
    assert_eq!(aggregate.farm_scope_expansion.count(), aggregate.num_iterations_completed);
    assert_eq!(aggregate.deterministic_identification.total, aggregate.num_iterations_completed);

    let ci = aggregate.farm_expansion_ci_95;
    assert!(ci.lower <= aggregate.farm_scope_expansion.mean);
    assert!(aggregate.farm_scope_expansion.mean <= ci.upper);
    let stats = &aggregate.farm_scope_expansion;
    assert!(stats.min <= stats.p25 && stats.p25 <= stats.median && stats.median <= stats.p75);
    assert!(stats.p75 <= stats.max);

    let run = registry.get(&id).unwrap();
    assert!(run.started_at.is_some());
    assert!(run.completed_at.is_some());
}

#[tokio::test]
async fn base_seed_reproduces_batch() {
    let registry = Arc::new(RunRegistry::new());
    let first = registry.create(small_batch(3)).unwrap();
    let second = registry.create(small_batch(3)).unwrap();
    execute_run(Arc::clone(&registry), first).await.unwrap();
    execute_run(Arc::clone(&registry), second).await.unwrap();

    let a = registry.results(&first).unwrap();
    let b = registry.results(&second).unwrap();
    assert_eq!(a.farm_scope_expansion.values, b.farm_scope_expansion.values);
    assert_eq!(a.total_cases.values, b.total_cases.values);
    assert_eq!(
        a.probabilistic_identification.yes_count,
        b.probabilistic_identification.yes_count
    );
}

#[test]
fn iteration_is_a_pure_function_of_its_seed() {
    let config = small_batch(1);
    let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let a = run_iteration(&config, 0, 77, start).unwrap();
    let b = run_iteration(&config, 5, 77, start).unwrap();
    assert_eq!(a.random_seed, 77);
    assert_eq!(b.iteration, 5);
    assert_eq!(a.total_cases, b.total_cases);
    assert_eq!(a.farm_scope_expansion, b.farm_scope_expansion);
    assert_eq!(a.deterministic_outcome, b.deterministic_outcome);
    assert_eq!(a.probabilistic_source_rank, b.probabilistic_source_rank);
}

#[tokio::test]
async fn results_wait_for_completion() {
    let registry = RunRegistry::new();
    let id = registry.create(small_batch(2)).unwrap();
    assert!(matches!(
        registry.results(&id),
        Err(MonteCarloError::RunNotComplete {
            status: MonteCarloStatus::Pending,
            ..
        })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_run_keeps_no_aggregate() {
    let registry = Arc::new(RunRegistry::new());
    let mut config = small_batch(400);
    config.num_workers = Some(1);
    let (id, handle) = start_run(&registry, config).unwrap();

    let mut cancelled = false;
    for _ in 0..500 {
        if registry.cancel(&id).unwrap() {
            cancelled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(cancelled, "run never reached the running state");

    handle.await.unwrap().unwrap();
    let run = registry.get(&id).unwrap();
    assert_eq!(run.status, MonteCarloStatus::Cancelled);
    assert!(run.result.is_none());
    assert!(run.completed_at.is_some());
    assert!(run.iterations_completed + run.iterations_failed < 400);
    assert!(matches!(
        registry.results(&id),
        Err(MonteCarloError::RunNotComplete {
            status: MonteCarloStatus::Cancelled,
            ..
        })
    ));
}
