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

//! The keyed stateful operator.
//!
//! ```text
//!  feeds ──► Router ──► worker 0 ─┐
//!                  ├──► worker 1 ─┼──► emitter ──► OutputSink
//!                  └──► worker n ─┘            └─► TelemetrySink
//! ```
//!
//! Every key is owned by exactly one worker thread, chosen by the
//! [`KeyPartitioner`](crate::partition::KeyPartitioner). All queues are
//! bounded, so a slow sink throttles the feeds instead of growing memory.
//!
//! When all routers are dropped, the workers drain their queues and exit,
//! then the emitter flushes the sink and exits.

mod emitter;
mod router;
pub mod state;
mod worker;

pub use emitter::EmitterReport;
pub use router::Router;
pub use worker::WorkerReport;

use crate::config::{ConfigError, EngineSettings, ResumeState};
use crate::event::{Event, ScoredEvent};
use crate::partition::KeyPartitioner;
use crate::sink::{OutputSink, SinkError, TelemetrySink};
use emitter::Emitter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use thiserror::Error;
use worker::Worker;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    #[error("emitter thread panicked")]
    EmitterPanicked,

    #[error("engine is shut down")]
    Closed,

    #[error("cannot spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Outcome of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub workers: Vec<WorkerReport>,
    pub output: EmitterReport,
    /// Events a pre-partitioned feed sent to the wrong worker
    pub rerouted: u64,
}

impl RunSummary {
    #[must_use]
    pub fn events(&self) -> u64 {
        self.workers.iter().map(|w| w.events).sum()
    }

    #[must_use]
    pub fn anomalies(&self) -> u64 {
        self.workers.iter().map(|w| w.anomalies).sum()
    }

    #[must_use]
    pub fn keys(&self) -> usize {
        self.workers.iter().map(|w| w.keys).sum()
    }
}

pub struct EngineBuilder {
    settings: EngineSettings,
    sink: Box<dyn OutputSink>,
    telemetry: Option<Box<dyn TelemetrySink>>,
    resume: ResumeState,
}

impl EngineBuilder {
    /// Snapshot to resume from; only empty states are accepted
    #[must_use]
    pub fn resume_state(mut self, resume: ResumeState) -> Self {
        self.resume = resume;
        self
    }

    #[must_use]
    pub fn telemetry(mut self, telemetry: Box<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Spawn the worker and emitter threads
    pub fn start(self) -> Result<Engine, EngineError> {
        self.resume.ensure_empty()?;

        let settings = self.settings;
        let workers = settings.worker_count.get();
        let capacity = settings.queue_capacity.get();
        let partitioner = KeyPartitioner::new(settings.worker_count);

        let (output_tx, output_rx) = mpsc::sync_channel::<ScoredEvent>(capacity);
        let emitter = Emitter::new(self.sink, self.telemetry, settings.retry)
            .spawn(output_rx)
            .map_err(EngineError::Spawn)?;

        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let (tx, rx) = mpsc::sync_channel::<Event>(capacity);
            let worker = Worker::new(
                index,
                partitioner,
                settings.scorer,
                settings.normalizer,
                output_tx.clone(),
            );
            handles.push(worker.spawn(rx).map_err(EngineError::Spawn)?);
            senders.push(tx);
        }
        // Workers hold the only output senders now
        drop(output_tx);

        tracing::info!(
            workers,
            scorer = settings.scorer.name(),
            "Engine started"
        );

        let rerouted = Arc::new(AtomicU64::new(0));
        Ok(Engine {
            router: Router::new(partitioner, senders, Arc::clone(&rerouted)),
            workers: handles,
            emitter,
            rerouted,
            settings,
        })
    }
}

/// A running engine
pub struct Engine {
    router: Router,
    workers: Vec<JoinHandle<WorkerReport>>,
    emitter: JoinHandle<Result<EmitterReport, SinkError>>,
    rerouted: Arc<AtomicU64>,
    settings: EngineSettings,
}

impl Engine {
    #[must_use]
    pub fn builder(settings: EngineSettings, sink: Box<dyn OutputSink>) -> EngineBuilder {
        EngineBuilder {
            settings,
            sink,
            telemetry: None,
            resume: ResumeState::none(),
        }
    }

    /// A submission handle for another thread.
    ///
    /// Every clone must be dropped before [`Engine::finish`] can return.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn submit(&self, event: Event) -> Result<(), EngineError> {
        self.router.submit(event)
    }

    pub fn submit_from(&self, worker_index: usize, event: Event) -> Result<(), EngineError> {
        self.router.submit_from(worker_index, event)
    }

    #[must_use]
    pub const fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Close the input, wait until everything submitted is emitted, and
    /// report.
    ///
    /// A failed sink takes precedence over a panicked worker.
    pub fn finish(self) -> Result<RunSummary, EngineError> {
        let Self {
            router,
            workers,
            emitter,
            rerouted,
            ..
        } = self;
        drop(router);

        let mut reports = Vec::with_capacity(workers.len());
        let mut panicked = None;
        for (index, handle) in workers.into_iter().enumerate() {
            match handle.join() {
                Ok(report) => reports.push(report),
                Err(_) => {
                    tracing::error!(worker = index, "Worker thread panicked");
                    panicked.get_or_insert(index);
                }
            }
        }

        let output = emitter.join().map_err(|_| EngineError::EmitterPanicked)??;
        if let Some(index) = panicked {
            return Err(EngineError::WorkerPanicked(index));
        }

        let summary = RunSummary {
            workers: reports,
            output,
            rerouted: rerouted.load(Ordering::Relaxed),
        };
        tracing::info!(
            events = summary.events(),
            anomalies = summary.anomalies(),
            keys = summary.keys(),
            rerouted = summary.rerouted,
            "Engine finished"
        );
        Ok(summary)
    }
}
