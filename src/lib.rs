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

//! `SensorCrab` scores keyed sensor streams for anomalies.
//!
//! Events are partitioned by key across a fixed set of worker threads. Each
//! worker keeps a rolling baseline per key, scores every reading against the
//! history that preceded it and forwards the result to an output sink.

pub mod anomaly;
pub mod config;
pub mod engine;
pub mod event;
pub mod input;
pub mod partition;
pub mod sink;
