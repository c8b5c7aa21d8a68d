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

//! End-to-end runs of the engine with in-memory sinks.

use sensorcrab::config::{
    ConfigError, EngineConfig, EngineSettings, ResumeState, RetryPolicy, ScorerKind,
};
use sensorcrab::engine::{Engine, EngineError, RunSummary};
use sensorcrab::event::{Event, ScoredEvent};
use sensorcrab::input::{self, FeedError, JsonLinesReader};
use sensorcrab::partition::KeyPartitioner;
use sensorcrab::sink::{OutputSink, SinkError, TelemetryPoint, TelemetrySink};
use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Keeps every emitted event for inspection after the run
#[derive(Clone, Default)]
struct CollectingSink {
    events: Arc<Mutex<Vec<ScoredEvent>>>,
}

impl CollectingSink {
    fn events(&self) -> Vec<ScoredEvent> {
        self.events.lock().expect("not poisoned").clone()
    }

    fn for_key(&self, key: &str) -> Vec<ScoredEvent> {
        self.events().into_iter().filter(|e| e.key == key).collect()
    }
}

impl OutputSink for CollectingSink {
    fn emit(&mut self, event: &ScoredEvent) -> Result<(), SinkError> {
        self.events.lock().expect("not poisoned").push(event.clone());
        Ok(())
    }
}

struct FailingSink;

impl OutputSink for FailingSink {
    fn emit(&mut self, _event: &ScoredEvent) -> Result<(), SinkError> {
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone").into())
    }
}

#[derive(Clone, Default)]
struct CountingTelemetry {
    anomalies: Arc<Mutex<Vec<String>>>,
}

impl TelemetrySink for CountingTelemetry {
    fn record(&mut self, point: &TelemetryPoint) -> Result<(), SinkError> {
        if point.is_anomalous {
            self.anomalies
                .lock()
                .expect("not poisoned")
                .push(point.key.clone());
        }
        Ok(())
    }
}

fn settings(workers: usize) -> EngineSettings {
    EngineSettings::with_workers(workers).expect("valid defaults")
}

fn run(settings: EngineSettings, events: Vec<Event>) -> (RunSummary, CollectingSink) {
    let sink = CollectingSink::default();
    let engine = Engine::builder(settings, Box::new(sink.clone()))
        .start()
        .expect("engine starts");
    for event in events {
        engine.submit(event).expect("engine accepts");
    }
    (engine.finish().expect("clean run"), sink)
}

#[test]
fn test_spike_after_stable_baseline_is_flagged() {
    let readings = [21.0, 22.0, 21.0, 23.0, 22.0, 21.0, 22.0, 23.0, 21.0, 22.0, 85.0];
    let events = readings
        .iter()
        .enumerate()
        .map(|(i, &v)| Event::new("k", v, i as f64))
        .collect();

    let (summary, sink) = run(settings(2), events);
    let scored = sink.for_key("k");

    assert_eq!(scored.len(), 11);
    assert_eq!(scored[0].score, 0.0);
    assert!(!scored[0].is_anomalous);

    let spike = &scored[10];
    assert_eq!(spike.value, 85.0);
    assert!(spike.is_anomalous);
    assert!(spike.score > 2.0);
    let mean = spike.mean.expect("history exists");
    assert!((mean - 21.8).abs() < 1e-9);

    assert_eq!(summary.events(), 11);
    assert_eq!(summary.keys(), 1);
    assert!(summary.anomalies() >= 1);
    assert_eq!(summary.output.emitted, 11);
}

#[test]
fn test_per_key_order_is_preserved_across_workers() {
    let keys: Vec<String> = (0..20).map(|i| format!("sensor-{i}")).collect();
    let mut events = Vec::new();
    for round in 0..50 {
        for key in &keys {
            events.push(Event::new(key.as_str(), 20.0 + f64::from(round % 3), f64::from(round)));
        }
    }

    let (summary, sink) = run(settings(4), events);

    assert_eq!(summary.events(), 1000);
    assert_eq!(summary.keys(), 20);
    for key in &keys {
        let timestamps: Vec<f64> = sink.for_key(key).iter().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, (0..50).map(f64::from).collect::<Vec<_>>(), "{key}");
    }
}

#[test]
fn test_keys_stay_on_their_owner() {
    let (summary, _sink) = run(
        settings(3),
        (0..300)
            .map(|i| Event::new(format!("k{}", i % 30), 1.0, f64::from(i)))
            .collect(),
    );

    let partitioner = KeyPartitioner::new(settings(3).worker_count);
    for worker in &summary.workers {
        let owned = (0..30)
            .filter(|i| partitioner.owns(worker.index, &format!("k{i}")))
            .count();
        assert_eq!(worker.keys, owned);
        assert_eq!(worker.events, owned as u64 * 10);
        assert_eq!(worker.foreign, 0);
    }
}

#[test]
fn test_misrouted_events_reach_the_owning_state() {
    let settings = settings(4);
    let partitioner = KeyPartitioner::new(settings.worker_count);
    let key = (0..100)
        .map(|i| format!("key{i}"))
        .find(|k| partitioner.owner(k) != 0)
        .expect("some key lives off worker 0");

    let sink = CollectingSink::default();
    let engine = Engine::builder(settings, Box::new(sink.clone()))
        .start()
        .expect("engine starts");
    for (i, value) in [10.0, 20.0, 30.0].into_iter().enumerate() {
        engine
            .submit_from(0, Event::new(key.as_str(), value, i as f64))
            .expect("engine accepts");
    }
    let summary = engine.finish().expect("clean run");

    assert_eq!(summary.rerouted, 3);
    let scored = sink.for_key(&key);
    assert_eq!(scored.len(), 3);
    assert_eq!(scored[2].mean, Some(15.0));
    assert_eq!(summary.workers[partitioner.owner(&key)].keys, 1);
    assert_eq!(summary.workers[0].keys, 0);
}

#[test]
fn test_dead_sink_fails_the_run() {
    let mut settings = settings(2);
    settings.retry = RetryPolicy {
        max_attempts: 2,
        backoff: Duration::from_millis(1),
    };
    let engine = Engine::builder(settings, Box::new(FailingSink))
        .start()
        .expect("engine starts");

    for i in 0..10 {
        // Submissions start failing once the engine has shut down
        if engine.submit(Event::new("k", 1.0, f64::from(i))).is_err() {
            break;
        }
    }

    assert!(matches!(engine.finish(), Err(EngineError::Sink(_))));
}

#[test]
fn test_non_empty_resume_state_is_rejected() {
    let resume = ResumeState::parse(r#"{"offsets": {"sensors": 42}}"#).expect("json");
    let result = Engine::builder(settings(1), Box::new(CollectingSink::default()))
        .resume_state(resume)
        .start();

    assert!(matches!(
        result,
        Err(EngineError::Config(ConfigError::UnsupportedResumeState(_)))
    ));
}

#[test]
fn test_empty_resume_states_are_accepted() {
    for text in ["null", "{}", "[]", "\"\""] {
        let resume = ResumeState::parse(text).expect("json");
        let engine = Engine::builder(settings(1), Box::new(CollectingSink::default()))
            .resume_state(resume)
            .start()
            .expect("empty state starts");
        engine.finish().expect("clean run");
    }
}

#[test]
fn test_json_lines_file_with_bad_lines() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, r#"{{"sensor_id": "1234", "temp": 22.5, "ts": "2023-06-01 12:00:00"}}"#)
        .expect("write");
    writeln!(file, "garbage").expect("write");
    writeln!(file, r#"{{"sensor_id": "1234", "temp": "warm", "ts": "2023-06-01 12:00:01"}}"#)
        .expect("write");
    writeln!(file).expect("write");
    writeln!(file, r#"{{"key": "1234", "value": 23.5, "timestamp": 1685620802}}"#)
        .expect("write");
    file.flush().expect("flush");

    let sink = CollectingSink::default();
    let engine = Engine::builder(settings(2), Box::new(sink.clone()))
        .start()
        .expect("engine starts");
    let reader = JsonLinesReader::open(file.path()).expect("open");
    let stats =
        input::pump_detached(reader, &engine.router(), &AtomicBool::new(false)).expect("feed");
    engine.finish().expect("clean run");

    assert_eq!(stats.accepted, 2);
    assert_eq!(stats.dropped, 2);
    let scored = sink.for_key("1234");
    assert_eq!(scored.len(), 2);
    assert_eq!(scored[0].timestamp, 1_685_620_800.0);
    assert_eq!(scored[1].mean, Some(22.5));
}

#[test]
fn test_broken_input_stream_fails_feed() {
    let sink = CollectingSink::default();
    let engine = Engine::builder(settings(2), Box::new(sink.clone()))
        .start()
        .expect("engine starts");
    let source = vec![
        Ok(Event::new("1234", 22.0, 0.0)),
        Err(FeedError::Io {
            line: 2,
            source: std::io::Error::other("input went away"),
        }),
        Ok(Event::new("1234", 23.0, 1.0)),
    ];
    let result = input::pump(source, &engine.router(), &AtomicBool::new(false));
    engine.finish().expect("clean run");

    assert!(matches!(result, Err(FeedError::Io { line: 2, .. })));
    assert_eq!(sink.for_key("1234").len(), 1);
}

#[test]
fn test_density_forest_engine() {
    let settings = EngineConfig {
        scorer: ScorerKind::DensityForest,
        worker_count: Some(2),
        ..EngineConfig::default()
    }
    .validate()
    .expect("valid");

    let mut events: Vec<Event> = (0..60)
        .map(|i| Event::new("3456", 21.0 + f64::from(i % 4), f64::from(i)))
        .collect();
    events.push(Event::new("3456", 85.0, 60.0));

    let telemetry = CountingTelemetry::default();
    let sink = CollectingSink::default();
    let engine = Engine::builder(settings, Box::new(sink.clone()))
        .telemetry(Box::new(telemetry.clone()))
        .start()
        .expect("engine starts");
    for event in events {
        engine.submit(event).expect("engine accepts");
    }
    let summary = engine.finish().expect("clean run");

    let scored = sink.for_key("3456");
    assert_eq!(scored.len(), 61);
    assert!(scored[..30].iter().all(|e| e.score == 0.0 && !e.is_anomalous));
    assert!(scored.iter().all(|e| (0.0..=1.0).contains(&e.score)));
    assert!(scored[60].score > scored[59].score);

    let flagged = telemetry.anomalies.lock().expect("not poisoned").len();
    assert_eq!(flagged as u64, summary.anomalies());
}
