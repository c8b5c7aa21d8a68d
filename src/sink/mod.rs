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

//! Consumers of scored events.
//!
//! The [`OutputSink`] is the primary consumer and is part of the correctness
//! contract: every scored event must reach it, in per-key order. A
//! [`TelemetrySink`] only observes; its failures are logged and ignored.

pub mod console;
pub mod telemetry;

pub use console::{ConsoleSink, OutputFormat};
pub use telemetry::TracingTelemetry;

use crate::event::ScoredEvent;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("output sink unavailable: {0}")]
    Unavailable(#[from] std::io::Error),
    #[error("cannot encode scored event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Primary consumer of scored events.
///
/// `emit` may block to apply backpressure. An `Err` is treated as transient
/// and retried; persistent failure ends the run.
pub trait OutputSink: Send {
    fn emit(&mut self, event: &ScoredEvent) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// What a visualization backend gets to see of one scored event
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryPoint {
    pub key: String,
    pub timestamp: f64,
    pub value: f64,
    pub is_anomalous: bool,
}

impl From<&ScoredEvent> for TelemetryPoint {
    fn from(event: &ScoredEvent) -> Self {
        Self {
            key: event.key.clone(),
            timestamp: event.timestamp,
            value: event.value,
            is_anomalous: event.is_anomalous,
        }
    }
}

/// Observability-only consumer
pub trait TelemetrySink: Send {
    fn record(&mut self, point: &TelemetryPoint) -> Result<(), SinkError>;
}
