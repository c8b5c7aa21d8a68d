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

//! Prints simulated warehouse sensor readings as JSON lines.
//!
//! ```text
//! sensorcrab-sim --rounds 60 --pace-ms 0 | sensorcrab --format text
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use sensorcrab::input::simulator::{to_payload, SensorSimulator, SimulatorConfig};
use std::io::{self, Write};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sensorcrab-sim")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"))]
#[command(about = "Simulate warehouse temperature sensors", long_about = None)]
struct Args {
    /// Stop after this many simulated seconds
    #[arg(long, value_name = "N")]
    rounds: Option<u64>,

    #[arg(long, value_name = "N", default_value_t = 42)]
    seed: u64,

    /// Wall-clock delay between simulated seconds, 0 to run flat out
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    pace_ms: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let simulator = SensorSimulator::new(SimulatorConfig {
        start: Utc::now().timestamp() as f64,
        seed: args.seed,
        pace: (args.pace_ms > 0).then(|| Duration::from_millis(args.pace_ms)),
        rounds: args.rounds,
        ..SimulatorConfig::default()
    });

    let mut out = io::stdout().lock();
    for event in simulator {
        if let Err(e) = writeln!(out, "{}", to_payload(&event)) {
            if e.kind() == io::ErrorKind::BrokenPipe {
                tracing::debug!("Reader went away, stopping");
                return Ok(());
            }
            return Err(e).context("Failed to write reading");
        }
    }
    out.flush().context("Failed to flush stdout")?;
    Ok(())
}
