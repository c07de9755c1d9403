//! mlfq-sim — multilevel feedback queue scheduler simulation.
//!
//! Spawns synthetic workers as tokio tasks, schedules them over simulated
//! time and writes the scheduling trace to a file.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: 5 concurrent workers, 3 second cap, trace in ./msglog.out
//! mlfq-sim
//!
//! # 10 concurrent workers, 2 seconds, custom trace file
//! mlfq-sim -s 10 -t 2 -l run.log
//!
//! # Reproducible run from a config file
//! mlfq-sim --config sim.toml --seed 42
//! ```
//!
//! Exit status: 0 when the run completes or hits a time cap, 130 when
//! interrupted, 1 on error.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mlfq_dispatch::{DispatchHub, RandomPolicy, TaskSpawner};
use mlfq_scheduler::{FileTrace, RunOutcome, Scheduler, SchedulerConfig};

/// Multilevel feedback queue scheduler simulation.
///
/// Every flag also has an `MLFQ_<FIELD>` environment variable (for example
/// `MLFQ_MAX_CONCURRENT`), read by the config loader so that `MLFQ_PROFILE`
/// prefixing and lenient parsing apply. A flag wins over its variable.
#[derive(Parser, Debug)]
#[command(name = "mlfq-sim", version, about)]
struct Cli {
    /// TOML config file. Values from the environment and flags override it.
    #[arg(short = 'c', long, env = "MLFQ_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum workers alive at once (1-18).
    #[arg(short = 's', long = "max-concurrent", allow_negative_numbers = true)]
    max_concurrent: Option<i64>,

    /// Trace file destination.
    #[arg(short = 'l', long = "log")]
    trace_path: Option<PathBuf>,

    /// Wall-clock cap on the run, in seconds.
    #[arg(short = 't', long = "max-runtime", allow_negative_numbers = true)]
    max_runtime_secs: Option<i64>,

    /// Maximum workers admitted over the whole run.
    #[arg(long)]
    max_total: Option<usize>,

    /// Quantum for the top queue, in simulated nanoseconds.
    #[arg(long)]
    base_quantum_ns: Option<u64>,

    /// Simulated nanoseconds between queue snapshots.
    #[arg(long)]
    trace_interval_ns: Option<u64>,

    /// Stop once simulated time reaches this many nanoseconds.
    #[arg(long)]
    max_sim_time_ns: Option<u64>,

    /// Wall-clock wait for a worker reply, in milliseconds.
    #[arg(long)]
    dispatch_timeout_ms: Option<u64>,

    /// RNG seed for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,

    /// Do not write a trace file.
    #[arg(long)]
    no_trace: bool,
}

impl Cli {
    fn apply(&self, config: &mut SchedulerConfig) {
        if let Some(n) = self.max_concurrent {
            // Negative values become 0 and are reset by `sanitize`.
            config.max_concurrent = usize::try_from(n).unwrap_or(0);
        }
        if let Some(secs) = self.max_runtime_secs {
            config.max_runtime_secs = u64::try_from(secs).unwrap_or(0);
        }
        if let Some(path) = &self.trace_path {
            config.trace_path = path.clone();
        }
        if let Some(n) = self.max_total {
            config.max_total = n;
        }
        if let Some(ns) = self.base_quantum_ns {
            config.base_quantum_ns = ns;
        }
        if let Some(ns) = self.trace_interval_ns {
            config.trace_interval_ns = ns;
        }
        if let Some(ns) = self.max_sim_time_ns {
            config.max_sim_time_ns = Some(ns);
        }
        if let Some(ms) = self.dispatch_timeout_ms {
            config.dispatch_timeout_ms = ms;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if self.no_trace {
            config.trace_enabled = false;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Before the subscriber, so `RUST_LOG` may come from `.env`.
    mlfq_core::config::load_dotenv();

    // Diagnostics go to stderr; the trace file is the simulation output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            eprintln!("mlfq-sim: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<RunOutcome> {
    let cli = Cli::parse();

    let mut config =
        SchedulerConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply(&mut config);
    config.sanitize();
    tracing::info!(?config, "starting mlfq-sim");

    let trace = if config.trace_enabled {
        let sink = FileTrace::create(&config.trace_path)
            .with_context(|| format!("cannot open trace file {}", config.trace_path.display()))?;
        Some(sink)
    } else {
        None
    };

    let hub = Arc::new(DispatchHub::new());
    let spawner = Arc::new(TaskSpawner::new(
        Arc::clone(&hub),
        Arc::new(RandomPolicy::default()),
        config.seed,
    ));
    let mut scheduler = Scheduler::new(config, hub, spawner);
    if let Some(sink) = trace {
        scheduler = scheduler.with_trace(Box::new(sink));
    }

    // Install signal handlers for graceful shutdown.
    let shutdown = scheduler.shutdown_handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received");
        shutdown.trigger();
    });

    let outcome = scheduler.run().await.context("simulation failed")?;
    tracing::info!(%outcome, "mlfq-sim exited");
    Ok(outcome)
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to register SIGTERM handler");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
