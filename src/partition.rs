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

//! Key to worker assignment.
//!
//! Every component that needs to know which worker owns a key (the engine's
//! router, pre-partitioned feeds such as the simulator) goes through
//! [`assign`], so ownership never has to be negotiated at runtime.

use std::num::NonZeroUsize;
use twox_hash::XxHash64;

/// Fixed hash seed. Changing it reshuffles every key between workers.
const PARTITION_SEED: u64 = 0;

/// Index of the worker that owns `key` in a pool of `worker_count` workers.
///
/// Pure function of its arguments: stable within a run, across runs and
/// across platforms.
#[must_use]
pub fn assign(key: &str, worker_count: NonZeroUsize) -> usize {
    let hash = XxHash64::oneshot(PARTITION_SEED, key.as_bytes());
    (hash % worker_count.get() as u64) as usize
}

/// Partitioner bound to a fixed worker count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPartitioner {
    worker_count: NonZeroUsize,
}

impl KeyPartitioner {
    #[must_use]
    pub const fn new(worker_count: NonZeroUsize) -> Self {
        Self { worker_count }
    }

    /// Worker index owning `key`
    #[must_use]
    pub fn owner(&self, key: &str) -> usize {
        assign(key, self.worker_count)
    }

    #[must_use]
    pub fn owns(&self, worker_index: usize, key: &str) -> bool {
        self.owner(key) == worker_index
    }
}
