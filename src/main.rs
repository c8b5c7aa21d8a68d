// SensorCrab - GPL-3.0-or-later
// This file is part of SensorCrab.
//
// Copyright (C) 2026 Daniel Freiermuth
//
// SensorCrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// SensorCrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with SensorCrab.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::Parser;
use sensorcrab::config::{EngineConfig, ResumeState, ScorerKind};
use sensorcrab::engine::{Engine, RunSummary};
use sensorcrab::event::Event;
use sensorcrab::input::{self, FeedStats, JsonLinesReader, MalformedEventError};
use sensorcrab::input::{SensorSimulator, SimulatorConfig};
use sensorcrab::partition::KeyPartitioner;
use sensorcrab::sink::{ConsoleSink, OutputFormat, TracingTelemetry};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sensorcrab")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"))]
#[command(about = "Score keyed sensor streams for anomalies", long_about = None)]
struct Args {
    /// JSON config file (defaults to the per-user config if it exists)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// JSON-lines input, `-` for stdin
    #[arg(long, value_name = "FILE", conflicts_with = "simulate")]
    input: Option<PathBuf>,

    /// Score simulated warehouse sensors instead of reading input
    #[arg(long)]
    simulate: bool,

    /// Stop the simulation after this many simulated seconds
    #[arg(long, value_name = "N", requires = "simulate")]
    sim_rounds: Option<u64>,

    #[arg(long, value_name = "N", default_value_t = 42)]
    sim_seed: u64,

    /// Wall-clock delay between simulated seconds, 0 to run flat out
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    sim_pace_ms: u64,

    #[arg(long, value_enum)]
    scorer: Option<ScorerKind>,

    /// Rolling window of the z-score scorer
    #[arg(long, value_name = "N")]
    window_size: Option<usize>,

    /// Z-score above which a reading is anomalous
    #[arg(long, value_name = "F")]
    threshold: Option<f64>,

    #[arg(long, value_name = "F", allow_negative_numbers = true)]
    norm_min: Option<f64>,

    #[arg(long, value_name = "F", allow_negative_numbers = true)]
    norm_max: Option<f64>,

    /// Worker threads (default: available parallelism)
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    #[arg(long, value_name = "N")]
    num_trees: Option<usize>,

    #[arg(long, value_name = "N")]
    tree_height: Option<usize>,

    #[arg(long, value_name = "N")]
    forest_seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Snapshot to resume from; only an empty state (`null`, `{}`) is accepted
    #[arg(long, value_name = "JSON")]
    resume_state: Option<String>,

    /// Log filter, overridden by `RUST_LOG`
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    /// Layer the command line over the config file
    fn apply(&self, config: &mut EngineConfig) {
        if let Some(scorer) = self.scorer {
            config.scorer = scorer;
        }
        if let Some(window_size) = self.window_size {
            config.window_size = window_size;
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(min) = self.norm_min {
            config.normalization_min = min;
        }
        if let Some(max) = self.norm_max {
            config.normalization_max = max;
        }
        if let Some(workers) = self.workers {
            config.worker_count = Some(workers);
        }
        if let Some(num_trees) = self.num_trees {
            config.density_forest.num_trees = num_trees;
        }
        if let Some(tree_height) = self.tree_height {
            config.density_forest.tree_height = tree_height;
        }
        if let Some(seed) = self.forest_seed {
            config.density_forest.seed = seed;
        }
    }
}

fn init_tracing(default_filter: &str) {
    // Logs go to stderr, stdout carries the scored events
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .init();
}

/// Set `shutdown` on the first Ctrl-C or SIGTERM, exit on the second
fn watch_signals(shutdown: Arc<AtomicBool>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build signal runtime")?;

    #[cfg(unix)]
    let mut sigterm = {
        let _runtime = runtime.enter();
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .context("Failed to listen for SIGTERM")?
    };

    thread::Builder::new()
        .name("signal".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    #[cfg(unix)]
                    let terminate = sigterm.recv();
                    #[cfg(not(unix))]
                    let terminate = std::future::pending::<Option<()>>();

                    tokio::select! {
                        result = tokio::signal::ctrl_c() => {
                            if let Err(e) = result {
                                tracing::warn!("Cannot listen for Ctrl-C: {e}");
                                return;
                            }
                            tracing::info!("Ctrl-C received");
                        }
                        _ = terminate => tracing::info!("SIGTERM received"),
                    }

                    if shutdown.swap(true, Ordering::Relaxed) {
                        tracing::warn!("Second signal, exiting without draining");
                        std::process::exit(130);
                    }
                    tracing::info!("Finishing in-flight events, signal again to exit now");
                }
            });
        })
        .context("Failed to spawn signal thread")?;
    Ok(())
}

fn read_input(engine: &Engine, path: &Path, shutdown: &AtomicBool) -> Result<FeedStats> {
    let reader = JsonLinesReader::open(path)
        .with_context(|| format!("Failed to open input {}", path.display()))?;
    tracing::info!("Reading events from {}", path.display());

    // Read on a separate thread, an idle stdin must not block shutdown
    let router = engine.router();
    Ok(input::pump_detached(reader, &router, shutdown)?)
}

/// One simulated feed per worker, each producing only the sensors it owns
fn simulate(
    engine: &Engine,
    args: &Args,
    resume: &ResumeState,
    shutdown: &AtomicBool,
) -> Result<FeedStats> {
    let workers = engine.settings().worker_count;
    let partitioner = KeyPartitioner::new(workers);
    let config = SimulatorConfig {
        start: Utc::now().timestamp() as f64,
        seed: args.sim_seed,
        pace: (args.sim_pace_ms > 0).then(|| Duration::from_millis(args.sim_pace_ms)),
        rounds: args.sim_rounds,
        ..SimulatorConfig::default()
    };
    tracing::info!(feeds = workers.get(), "Simulating warehouse sensors");

    thread::scope(|scope| {
        let feeds = (0..workers.get())
            .map(|index| {
                let simulator =
                    SensorSimulator::resume(config.clone(), resume)?.owned_by(partitioner, index);
                let router = engine.router();
                let feed = thread::Builder::new()
                    .name(format!("feed-{index}"))
                    .spawn_scoped(scope, move || {
                        let events = simulator.map(Ok::<Event, MalformedEventError>);
                        input::pump_partition(events, index, &router, shutdown)
                    })
                    .context("Failed to spawn feed thread")?;
                Ok(feed)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut total = FeedStats::default();
        for feed in feeds {
            let stats = feed
                .join()
                .map_err(|_| anyhow!("Feed thread panicked"))??;
            total.accepted += stats.accepted;
            total.dropped += stats.dropped;
        }
        Ok(total)
    })
}

fn report(summary: &RunSummary, feed: FeedStats) {
    for worker in &summary.workers {
        tracing::info!(
            worker = worker.index,
            keys = worker.keys,
            events = worker.events,
            anomalies = worker.anomalies,
            "Worker summary"
        );
    }
    tracing::info!(
        accepted = feed.accepted,
        dropped = feed.dropped,
        emitted = summary.output.emitted,
        sink_retries = summary.output.retries,
        "Run complete"
    );
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    tracing::info!(
        "SensorCrab starting up (version {} ({}))",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    #[cfg(feature = "cpu-profiling")]
    {
        tracing::info!("CPU profiling enabled with Tracy - run Tracy profiler to connect");
    }

    let mut config =
        EngineConfig::load_or_default(args.config.as_deref()).context("Failed to load config")?;
    args.apply(&mut config);
    let settings = config.validate().context("Invalid configuration")?;

    let resume = args
        .resume_state
        .as_deref()
        .map(ResumeState::parse)
        .transpose()
        .context("Invalid --resume-state")?
        .unwrap_or_default();

    let shutdown = Arc::new(AtomicBool::new(false));
    watch_signals(Arc::clone(&shutdown))?;

    let engine = Engine::builder(settings, Box::new(ConsoleSink::stdout(args.format)))
        .telemetry(Box::new(TracingTelemetry::new()))
        .resume_state(resume.clone())
        .start()
        .context("Failed to start engine")?;

    let feed = if args.simulate {
        simulate(&engine, &args, &resume, &shutdown)
    } else {
        let path = args.input.clone().unwrap_or_else(|| PathBuf::from("-"));
        read_input(&engine, &path, &shutdown)
    };

    // Always drain the engine, a sink failure explains a failed feed best
    let summary = engine.finish().context("Run failed")?;
    let feed = feed?;
    report(&summary, feed);
    Ok(())
}
