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

//! Distribution layer between feeds and workers.

use super::EngineError;
use crate::event::Event;
use crate::partition::KeyPartitioner;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;

/// Handle to submit events to the workers.
///
/// Clone this to submit from multiple feed threads. Workers exit once every
/// router (including the engine's own) has been dropped and their queues
/// are drained.
#[derive(Clone)]
pub struct Router {
    partitioner: KeyPartitioner,
    senders: Vec<SyncSender<Event>>,
    rerouted: Arc<AtomicU64>,
}

impl Router {
    #[must_use]
    pub(crate) const fn new(
        partitioner: KeyPartitioner,
        senders: Vec<SyncSender<Event>>,
        rerouted: Arc<AtomicU64>,
    ) -> Self {
        Self {
            partitioner,
            senders,
            rerouted,
        }
    }

    /// Queue `event` on the worker owning its key.
    ///
    /// Blocks while that worker's queue is full.
    pub fn submit(&self, event: Event) -> Result<(), EngineError> {
        let owner = self.partitioner.owner(&event.key);
        self.send(owner, event)
    }

    /// Queue `event` from a feed that was pre-partitioned for `worker_index`.
    ///
    /// If the feed disagrees with the partitioner the event goes to the real
    /// owner instead; it is never applied to another worker's state.
    pub fn submit_from(&self, worker_index: usize, event: Event) -> Result<(), EngineError> {
        let owner = self.partitioner.owner(&event.key);
        if owner != worker_index {
            self.rerouted.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                key = %event.key,
                from = worker_index,
                to = owner,
                "Re-routing event to owning worker"
            );
        }
        self.send(owner, event)
    }

    fn send(&self, worker: usize, event: Event) -> Result<(), EngineError> {
        self.senders[worker]
            .send(event)
            .map_err(|_| EngineError::Closed)
    }
}
