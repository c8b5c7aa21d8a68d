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

//! Input feeds.
//!
//! A feed is any iterator of `Result<Event, E>` where `E` converts into a
//! [`FeedError`]. Malformed items are logged and dropped here, so the engine
//! only ever sees well-formed events. A failing input stream ends the feed
//! with an error.

pub mod json_lines;
pub mod simulator;

pub use json_lines::JsonLinesReader;
pub use simulator::{SensorSimulator, SimulatorConfig};

use crate::engine::{EngineError, Router};
use crate::event::Event;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Items buffered between a detached reader and the engine
const READ_AHEAD: usize = 1024;

/// How often a feed waiting on a detached reader looks at the shutdown flag
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Input that cannot be turned into an [`Event`]
#[derive(Debug, Error)]
pub enum MalformedEventError {
    #[error("line {line}: invalid JSON: {source}")]
    Json {
        line: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: expected a JSON object")]
    NotAnObject { line: u64 },

    #[error("line {line}: missing or invalid field `{field}`")]
    MissingField { line: u64, field: &'static str },

    #[error("line {line}: cannot parse timestamp {value}")]
    BadTimestamp { line: u64, value: String },

    #[error("line {line}: value of key {key} is not a finite number")]
    NonFiniteValue { line: u64, key: String },

    #[error("line {line}: not valid UTF-8")]
    Unreadable { line: u64 },
}

#[derive(Debug, Error)]
pub enum FeedError {
    /// Dropped by the feed, never returned from it
    #[error(transparent)]
    Malformed(#[from] MalformedEventError),

    #[error("line {line}: input stream failed: {source}")]
    Io {
        line: u64,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Counts of one feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub accepted: u64,
    pub dropped: u64,
}

/// Feed `source` into the engine until it ends or `shutdown` is set.
///
/// `shutdown` is only seen between items, so a source that blocks keeps
/// the feed open. Use [`pump_detached`] for those.
pub fn pump<I, E>(source: I, router: &Router, shutdown: &AtomicBool) -> Result<FeedStats, FeedError>
where
    I: IntoIterator<Item = Result<Event, E>>,
    E: Into<FeedError>,
{
    pump_with(source, shutdown, |event| router.submit(event))
}

/// Like [`pump`], for a feed that was pre-partitioned for `worker_index`
pub fn pump_partition<I, E>(
    source: I,
    worker_index: usize,
    router: &Router,
    shutdown: &AtomicBool,
) -> Result<FeedStats, FeedError>
where
    I: IntoIterator<Item = Result<Event, E>>,
    E: Into<FeedError>,
{
    pump_with(source, shutdown, |event| router.submit_from(worker_index, event))
}

/// Like [`pump`], but `source` is read on its own thread so that setting
/// `shutdown` ends the feed even while the source blocks, e.g. on an idle
/// stdin or FIFO.
///
/// The reader thread is left behind when the feed stops early. It holds no
/// engine handle and exits on its next item.
pub fn pump_detached<I, E>(
    source: I,
    router: &Router,
    shutdown: &AtomicBool,
) -> Result<FeedStats, FeedError>
where
    I: IntoIterator<Item = Result<Event, E>> + Send + 'static,
    E: Into<FeedError> + Send + 'static,
{
    let items = read_ahead(source)?;
    pump_with(Interruptible { items, shutdown }, shutdown, |event| {
        router.submit(event)
    })
}

fn read_ahead<I, T>(source: I) -> Result<Receiver<T>, FeedError>
where
    I: IntoIterator<Item = T> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(READ_AHEAD);
    thread::Builder::new()
        .name("reader".to_string())
        .spawn(move || {
            for item in source {
                if tx.send(item).is_err() {
                    break;
                }
            }
        })
        .map_err(EngineError::Spawn)?;
    Ok(rx)
}

/// Receiving end of a detached reader that gives up once `shutdown` is set
struct Interruptible<'a, T> {
    items: Receiver<T>,
    shutdown: &'a AtomicBool,
}

impl<T> Iterator for Interruptible<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                tracing::info!("Shutdown requested, abandoning input reader");
                return None;
            }
            match self.items.recv_timeout(SHUTDOWN_POLL) {
                Ok(item) => return Some(item),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

fn pump_with<I, E, F>(source: I, shutdown: &AtomicBool, mut submit: F) -> Result<FeedStats, FeedError>
where
    I: IntoIterator<Item = Result<Event, E>>,
    E: Into<FeedError>,
    F: FnMut(Event) -> Result<(), EngineError>,
{
    let mut stats = FeedStats::default();

    for item in source {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("Shutdown requested, closing feed");
            break;
        }

        match item.map_err(Into::<FeedError>::into) {
            Ok(event) => {
                submit(event)?;
                stats.accepted += 1;
            }
            Err(FeedError::Malformed(e)) => {
                tracing::warn!("Dropping malformed event: {e}");
                stats.dropped += 1;
            }
            Err(e @ (FeedError::Io { .. } | FeedError::Engine(_))) => {
                tracing::error!("Closing feed: {e}");
                return Err(e);
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_malformed_items_are_dropped() {
        let source = vec![
            Ok(Event::new("a", 1.0, 0.0)),
            Err(MalformedEventError::NotAnObject { line: 2 }),
            Ok(Event::new("a", 2.0, 1.0)),
        ];
        let mut seen = Vec::new();
        let stats = pump_with(source, &AtomicBool::new(false), |event| {
            seen.push(event.value);
            Ok(())
        })
        .expect("no engine errors");

        assert_eq!(stats, FeedStats { accepted: 2, dropped: 1 });
        assert_eq!(seen, vec![1.0, 2.0]);
    }

    #[test]
    fn test_shutdown_stops_feed() {
        let source = (0..).map(|i| Ok::<Event, MalformedEventError>(Event::new("a", f64::from(i), 0.0)));
        let shutdown = AtomicBool::new(false);
        let stats = pump_with(source, &shutdown, |event| {
            if event.value >= 4.0 {
                shutdown.store(true, Ordering::Relaxed);
            }
            Ok(())
        })
        .expect("no engine errors");

        assert_eq!(stats.accepted, 5);
    }

    #[test]
    fn test_engine_errors_abort_feed() {
        let source: Vec<Result<Event, MalformedEventError>> = vec![Ok(Event::new("a", 1.0, 0.0)), Ok(Event::new("a", 2.0, 0.0))];
        let result = pump_with(source, &AtomicBool::new(false), |_| Err(EngineError::Closed));

        assert!(matches!(result, Err(FeedError::Engine(EngineError::Closed))));
    }

    #[test]
    fn test_stream_failure_fails_feed() {
        let source = vec![
            Ok(Event::new("a", 1.0, 0.0)),
            Err(FeedError::Io {
                line: 2,
                source: io::Error::other("device gone"),
            }),
            Ok(Event::new("a", 2.0, 1.0)),
        ];
        let mut seen = Vec::new();
        let result = pump_with(source, &AtomicBool::new(false), |event| {
            seen.push(event.value);
            Ok(())
        });

        assert!(matches!(result, Err(FeedError::Io { line: 2, .. })));
        assert_eq!(seen, vec![1.0]);
    }

    #[test]
    fn test_shutdown_interrupts_blocked_source() {
        // The sender stays alive, so the source blocks after its first item
        let (tx, rx) = mpsc::channel();
        tx.send(Ok::<Event, MalformedEventError>(Event::new("a", 1.0, 0.0)))
            .expect("send");
        let items = read_ahead(rx).expect("reader thread");

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            flag.store(true, Ordering::Relaxed);
        });

        let mut seen = Vec::new();
        let stats = pump_with(
            Interruptible {
                items,
                shutdown: &shutdown,
            },
            &shutdown,
            |event| {
                seen.push(event.value);
                Ok(())
            },
        )
        .expect("no engine errors");
        stopper.join().expect("stopper");

        assert_eq!(stats, FeedStats { accepted: 1, dropped: 0 });
        assert_eq!(seen, vec![1.0]);
        drop(tx);
    }

    #[test]
    fn test_detached_reader_ends_with_source() {
        let source: Vec<Result<Event, MalformedEventError>> =
            (0..3).map(|i| Ok(Event::new("a", f64::from(i), 0.0))).collect();
        let shutdown = AtomicBool::new(false);
        let items = read_ahead(source).expect("reader thread");
        let stats = pump_with(Interruptible { items, shutdown: &shutdown }, &shutdown, |_| Ok(()))
            .expect("no engine errors");

        assert_eq!(stats.accepted, 3);
    }
}
