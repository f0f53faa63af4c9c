//! outbreak-trace CLI: single outbreak comparisons and Monte Carlo batches.
//!
//! Usage:
//!   outbreak-trace simulate [--config FILE] [--seed N] [--farms N] [--retailers N] [--days N]
//!   outbreak-trace monte-carlo [--config FILE] [--iterations N] [--seed N] [--workers N]

use clap::{Parser, Subcommand};
use outbreak_trace::{execute_run, load_config, AppConfig, OutbreakSimulator, RunRegistry};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "outbreak-trace",
    version,
    about = "Compare outbreak investigations with exact and calculated lot codes"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one outbreak and investigate it in both tracking modes
    Simulate {
        /// YAML config file
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        farms: Option<usize>,
        #[arg(long)]
        retailers: Option<usize>,
        /// Simulated days of product flow
        #[arg(long)]
        days: Option<i64>,
    },
    /// Run a batch of seeded outbreaks and print aggregate statistics
    MonteCarlo {
        /// YAML config file
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        iterations: Option<usize>,
        /// Base seed; iteration i uses seed + i
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        workers: Option<usize>,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn read_config(path: Option<PathBuf>) -> Result<AppConfig, String> {
    match path {
        Some(path) => load_config(&path).map_err(|e| format!("{}: {}", path.display(), e)),
        None => Ok(AppConfig::default()),
    }
}

fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: failed to serialize output: {}", e);
            1
        }
    }
}

fn cmd_simulate(
    config: Option<PathBuf>,
    seed: Option<u64>,
    farms: Option<usize>,
    retailers: Option<usize>,
    days: Option<i64>,
) -> i32 {
    let mut simulation = match read_config(config) {
        Ok(c) => c.simulation,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if seed.is_some() {
        simulation.random_seed = seed;
    }
    if let Some(farms) = farms {
        simulation.network.num_farms = farms;
    }
    if let Some(retailers) = retailers {
        simulation.network.num_retailers = retailers;
    }
    if let Some(days) = days {
        simulation.simulation_days = days;
    }

    match OutbreakSimulator::new(simulation).run_comparison() {
        Ok(report) => print_json(&report),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_monte_carlo(
    config: Option<PathBuf>,
    iterations: Option<usize>,
    seed: Option<u64>,
    workers: Option<usize>,
) -> i32 {
    let mut monte_carlo = match read_config(config) {
        Ok(c) => c.monte_carlo,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if let Some(iterations) = iterations {
        monte_carlo.num_iterations = iterations;
    }
    if seed.is_some() {
        monte_carlo.base_random_seed = seed;
    }
    if workers.is_some() {
        monte_carlo.num_workers = workers;
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            return 1;
        }
    };

    rt.block_on(async {
        let registry = Arc::new(RunRegistry::new());
        let id = match registry.create(monte_carlo) {
            Ok(id) => id,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        };
        if let Err(e) = execute_run(Arc::clone(&registry), id).await {
            eprintln!("Error: {}", e);
            return 1;
        }
        match registry.results(&id) {
            Ok(aggregate) => print_json(&aggregate),
            Err(e) => {
                let detail = registry.get(&id).and_then(|run| run.error).unwrap_or_default();
                eprintln!("Error: {} {}", e, detail);
                1
            }
        }
    })
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let code = match cli.command {
        Commands::Simulate {
            config,
            seed,
            farms,
            retailers,
            days,
        } => cmd_simulate(config, seed, farms, retailers, days),
        Commands::MonteCarlo {
            config,
            iterations,
            seed,
            workers,
        } => cmd_monte_carlo(config, iterations, seed, workers),
    };
    std::process::exit(code);
}
