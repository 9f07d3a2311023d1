//! Calltree Runtime
//!
//! Demo driver: runs an instrumented multi-threaded workload and prints the
//! aggregated call tree.

use anyhow::{Context, Result};
use calltree_core::{profile_scope, Profiler, SortOrder};
use calltree_services::Settings;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "calltree", version, about = "Hierarchical section profiler demo")]
struct Cli {
    /// JSON settings file
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Override the report ordering from the settings file
    #[arg(long, value_enum)]
    order: Option<OrderArg>,

    /// Override the number of worker threads
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OrderArg {
    ExecutionOrder,
    TotalTime,
}

impl From<OrderArg> for SortOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::ExecutionOrder => SortOrder::ExecutionOrder,
            OrderArg::TotalTime => SortOrder::TotalTime,
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = match &cli.settings {
        Some(path) => Settings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(order) = cli.order {
        settings.report.order = order.into();
    }
    if let Some(threads) = cli.threads {
        settings.workload.threads = threads;
    }
    settings.validate()?;

    tracing::info!("Calltree v{}", calltree_core::VERSION);
    tracing::info!(
        threads = settings.workload.threads,
        iterations = settings.workload.iterations,
        "running workload"
    );

    let profiler = Profiler::new();
    run_workload(&profiler, &settings);

    profiler
        .display(settings.report.order)
        .context("printing profiler report")?;
    if settings.report.clear_after_display {
        profiler.clear();
    }

    Ok(())
}

fn run_workload(profiler: &Profiler, settings: &Settings) {
    let iterations = settings.workload.iterations;

    thread::scope(|s| {
        for worker in 0..settings.workload.threads {
            s.spawn(move || {
                for _ in 0..iterations {
                    frame(profiler, worker);
                }
            });
        }
    });

    profiler.time("main", || {
        for _ in 0..iterations {
            frame(profiler, 0);
        }
    });
}

fn frame(profiler: &Profiler, worker: usize) {
    profile_scope!(profiler, "frame");

    profiler.time("physics", || {
        profiler.time("broadphase", || work(1));
        profiler.time("narrowphase", || work(2 + worker as u64 % 3));
    });
    profiler.time("render", || work(3));
}

fn work(millis: u64) {
    thread::sleep(Duration::from_millis(millis));
}
