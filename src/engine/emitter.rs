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

use crate::config::RetryPolicy;
use crate::event::ScoredEvent;
use crate::sink::{OutputSink, SinkError, TelemetryPoint, TelemetrySink};
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};

/// Delivery statistics of the output thread
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitterReport {
    pub emitted: u64,
    pub retries: u64,
    pub telemetry_failures: u64,
}

/// Single consumer of all worker output.
///
/// Workers push into one bounded queue, so events of a key arrive here in the
/// order their worker produced them.
pub(crate) struct Emitter {
    sink: Box<dyn OutputSink>,
    telemetry: Option<Box<dyn TelemetrySink>>,
    retry: RetryPolicy,
}

impl Emitter {
    #[must_use]
    pub(crate) const fn new(
        sink: Box<dyn OutputSink>,
        telemetry: Option<Box<dyn TelemetrySink>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            sink,
            telemetry,
            retry,
        }
    }

    pub(crate) fn spawn(
        self,
        input: Receiver<ScoredEvent>,
    ) -> std::io::Result<JoinHandle<Result<EmitterReport, SinkError>>> {
        thread::Builder::new()
            .name("emitter".to_string())
            .spawn(move || self.run(&input))
    }

    fn run(mut self, input: &Receiver<ScoredEvent>) -> Result<EmitterReport, SinkError> {
        let mut report = EmitterReport::default();

        while let Ok(event) = input.recv() {
            profiling::scope!("emit");

            // Returning drops the receiver, which stops the workers
            self.emit_with_retry(&event, &mut report)?;
            report.emitted += 1;

            if let Some(telemetry) = self.telemetry.as_mut() {
                if let Err(e) = telemetry.record(&TelemetryPoint::from(&event)) {
                    report.telemetry_failures += 1;
                    if report.telemetry_failures == 1 {
                        tracing::warn!("Telemetry sink failed, continuing: {e}");
                    } else {
                        tracing::trace!("Telemetry sink failed: {e}");
                    }
                }
            }
        }

        self.sink.flush()?;
        tracing::debug!(emitted = report.emitted, "Emitter thread shutting down");
        Ok(report)
    }

    fn emit_with_retry(
        &mut self,
        event: &ScoredEvent,
        report: &mut EmitterReport,
    ) -> Result<(), SinkError> {
        let mut attempt: u32 = 1;
        loop {
            match self.sink.emit(event) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.retry.max_attempts => {
                    tracing::warn!(
                        key = %event.key,
                        attempt,
                        "Output sink rejected event: {e}"
                    );
                    thread::sleep(self.retry.backoff * attempt);
                    attempt += 1;
                    report.retries += 1;
                }
                Err(e) => {
                    tracing::error!(
                        key = %event.key,
                        "Output sink failed after {attempt} attempts: {e}"
                    );
                    return Err(e);
                }
            }
        }
    }
}
