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

use super::{SinkError, TelemetryPoint, TelemetrySink};

/// Telemetry through the `telemetry` tracing target.
///
/// Every point goes out at TRACE, anomalies additionally at INFO, so
/// `RUST_LOG=telemetry=info` shows just the anomalies.
#[derive(Debug, Default)]
pub struct TracingTelemetry {
    points: u64,
    anomalies: u64,
}

impl TracingTelemetry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            points: 0,
            anomalies: 0,
        }
    }

    #[must_use]
    pub const fn points(&self) -> u64 {
        self.points
    }

    #[must_use]
    pub const fn anomalies(&self) -> u64 {
        self.anomalies
    }
}

impl TelemetrySink for TracingTelemetry {
    fn record(&mut self, point: &TelemetryPoint) -> Result<(), SinkError> {
        self.points += 1;
        tracing::trace!(
            target: "telemetry",
            key = %point.key,
            timestamp = point.timestamp,
            value = point.value,
            "data"
        );

        if point.is_anomalous {
            self.anomalies += 1;
            tracing::info!(
                target: "telemetry",
                key = %point.key,
                timestamp = point.timestamp,
                value = point.value,
                "anomaly"
            );
        }
        Ok(())
    }
}
