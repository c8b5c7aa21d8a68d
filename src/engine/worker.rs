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

//! Worker threads owning per-key state.
//!
//! Each worker owns the states of the keys the partitioner assigns to it and
//! processes its queue strictly in arrival order, so events of one key are
//! scored one at a time and in order. Workers share nothing mutable.

use super::state::KeyState;
use crate::anomaly::normalize::MinMaxNormalizer;
use crate::anomaly::ScorerSpec;
use crate::event::{Event, ScoredEvent};
use crate::partition::KeyPartitioner;
use indexmap::IndexMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, SyncSender};
use std::thread::{self, JoinHandle};

/// What one worker did during the run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub index: usize,
    /// Distinct keys owned
    pub keys: usize,
    pub events: u64,
    pub anomalies: u64,
    /// Events for keys this worker does not own (refused)
    pub foreign: u64,
    /// Key states reset after their scorer panicked
    pub recovered_panics: u64,
}

pub(crate) struct Worker {
    index: usize,
    partitioner: KeyPartitioner,
    scorer: ScorerSpec,
    normalizer: MinMaxNormalizer,
    /// Keys in first-seen order
    states: IndexMap<String, KeyState>,
    output: SyncSender<ScoredEvent>,
    report: WorkerReport,
}

impl Worker {
    #[must_use]
    pub(crate) fn new(
        index: usize,
        partitioner: KeyPartitioner,
        scorer: ScorerSpec,
        normalizer: MinMaxNormalizer,
        output: SyncSender<ScoredEvent>,
    ) -> Self {
        Self {
            index,
            partitioner,
            scorer,
            normalizer,
            states: IndexMap::new(),
            output,
            report: WorkerReport {
                index,
                ..WorkerReport::default()
            },
        }
    }

    pub(crate) fn spawn(self, input: Receiver<Event>) -> std::io::Result<JoinHandle<WorkerReport>> {
        thread::Builder::new()
            .name(format!("worker-{}", self.index))
            .spawn(move || self.run(&input))
    }

    fn run(mut self, input: &Receiver<Event>) -> WorkerReport {
        tracing::debug!(worker = self.index, "Worker thread started");

        // Main loop - exits when all routers are dropped and the queue is empty
        while let Ok(event) = input.recv() {
            profiling::scope!("worker_event");

            let Some(scored) = self.process(&event) else {
                continue;
            };
            if self.output.send(scored).is_err() {
                tracing::warn!(worker = self.index, "Output queue closed, worker stopping");
                break;
            }
        }

        self.report.keys = self.states.len();
        tracing::debug!(
            worker = self.index,
            keys = self.report.keys,
            events = self.report.events,
            "Worker thread shutting down"
        );
        self.report
    }

    fn process(&mut self, event: &Event) -> Option<ScoredEvent> {
        if !self.partitioner.owns(self.index, &event.key) {
            // The router never sends foreign keys; refuse rather than create a second owner
            tracing::error!(
                worker = self.index,
                key = %event.key,
                "Refusing event for a key owned by another worker"
            );
            self.report.foreign += 1;
            return None;
        }

        let index = self.index;
        let scorer = &self.scorer;
        let normalizer = &self.normalizer;
        let state = self.states.entry(event.key.clone()).or_insert_with(|| {
            tracing::debug!(worker = index, key = %event.key, "First event for key");
            KeyState::new(scorer.build())
        });

        let scored = panic::catch_unwind(AssertUnwindSafe(|| state.apply(event, normalizer)))
            .unwrap_or_else(|_| {
                tracing::error!(
                    worker = index,
                    key = %event.key,
                    "Scorer panicked, resetting state of this key"
                );
                *state = KeyState::new(scorer.build());
                self.report.recovered_panics += 1;
                unscored(event)
            });

        self.report.events += 1;
        if scored.is_anomalous {
            self.report.anomalies += 1;
        }
        Some(scored)
    }
}

/// Placeholder result for an event whose scoring failed
fn unscored(event: &Event) -> ScoredEvent {
    ScoredEvent {
        key: event.key.clone(),
        value: event.value,
        mean: None,
        std_dev: None,
        score: 0.0,
        is_anomalous: false,
        timestamp: event.timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::scorer::{AnomalyScorer, Sample};
    use crate::anomaly::window::Baseline;
    use std::num::NonZeroUsize;
    use std::sync::mpsc;

    /// Default scorer that blows up on one particular reading
    struct PanicsOn {
        value: f64,
        inner: Box<dyn AnomalyScorer>,
    }

    impl AnomalyScorer for PanicsOn {
        #[allow(clippy::panic)]
        fn score(&mut self, sample: &Sample) -> f64 {
            if sample.raw == self.value {
                panic!("cannot score {}", sample.raw);
            }
            self.inner.score(sample)
        }

        fn update(&mut self, sample: &Sample) {
            self.inner.update(sample);
        }

        fn is_anomalous(&self, score: f64) -> bool {
            self.inner.is_anomalous(score)
        }

        fn baseline(&self) -> Baseline {
            self.inner.baseline()
        }
    }

    fn worker(index: usize, workers: usize) -> (Worker, Receiver<ScoredEvent>) {
        let (tx, rx) = mpsc::sync_channel(64);
        let partitioner = KeyPartitioner::new(NonZeroUsize::new(workers).expect("non-zero"));
        let normalizer = MinMaxNormalizer::new(0.0, 100.0).expect("valid");
        (
            Worker::new(index, partitioner, ScorerSpec::default(), normalizer, tx),
            rx,
        )
    }

    #[test]
    fn test_foreign_keys_are_refused() {
        let (mut w, _rx) = worker(0, 4);
        let partitioner = w.partitioner;
        let foreign = (0..100)
            .map(|i| format!("key{i}"))
            .find(|k| !partitioner.owns(0, k))
            .expect("some key belongs elsewhere");

        assert!(w.process(&Event::new(foreign, 1.0, 0.0)).is_none());
        assert_eq!(w.report.foreign, 1);
        assert!(w.states.is_empty());
    }

    #[test]
    fn test_keys_get_separate_state() {
        let (mut w, _rx) = worker(0, 1);
        for v in [10.0, 12.0, 11.0] {
            w.process(&Event::new("a", v, 0.0));
        }
        let b = w.process(&Event::new("b", 50.0, 0.0)).expect("owned");

        assert_eq!(b.mean, None);
        assert_eq!(w.states.len(), 2);
        assert_eq!(w.states["a"].observed(), 3);
        assert_eq!(w.states["b"].observed(), 1);
    }

    #[test]
    fn test_run_drains_queue_in_order() {
        let (w, out) = worker(0, 1);
        let (tx, rx) = mpsc::sync_channel(16);
        let handle = w.spawn(rx).expect("spawn");

        for i in 0..10 {
            tx.send(Event::new("k", f64::from(i), f64::from(i))).expect("send");
        }
        drop(tx);

        let report = handle.join().expect("worker finished");
        let timestamps: Vec<f64> = out.try_iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, (0..10).map(f64::from).collect::<Vec<_>>());
        assert_eq!(report.events, 10);
        assert_eq!(report.keys, 1);
    }

    #[test]
    fn test_scorer_panic_resets_only_that_key() {
        let (mut w, _rx) = worker(0, 1);
        w.states.insert(
            "bad".to_string(),
            KeyState::new(Box::new(PanicsOn {
                value: 99.0,
                inner: ScorerSpec::default().build(),
            })),
        );

        for v in [20.0, 22.0, 21.0] {
            w.process(&Event::new("good", v, 0.0)).expect("owned");
            w.process(&Event::new("bad", v, 0.0)).expect("owned");
        }
        let good_before = w.states["good"].baseline();
        assert_eq!(w.states["bad"].observed(), 3);

        let failed = w.process(&Event::new("bad", 99.0, 7.0)).expect("still emitted");
        assert_eq!(failed.key, "bad");
        assert_eq!(failed.value, 99.0);
        assert_eq!(failed.timestamp, 7.0);
        assert_eq!(failed.mean, None);
        assert_eq!(failed.std_dev, None);
        assert_eq!(failed.score, 0.0);
        assert!(!failed.is_anomalous);

        assert_eq!(w.report.recovered_panics, 1);
        assert_eq!(w.report.events, 7);
        assert_eq!(w.states["bad"].observed(), 0);
        assert_eq!(w.states["bad"].baseline().samples, 0);
        assert_eq!(w.states["good"].baseline(), good_before);
        assert_eq!(w.states["good"].observed(), 3);

        // The key starts over with a fresh scorer
        let next = w.process(&Event::new("bad", 99.0, 8.0)).expect("owned");
        assert_eq!(next.mean, None);
        assert_eq!(w.states["bad"].observed(), 1);
        assert_eq!(w.report.recovered_panics, 1);
    }
}
