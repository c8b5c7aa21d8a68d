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

use serde::{Deserialize, Serialize};

/// A single sensor reading as it enters the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub key: String,
    pub value: f64,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

impl Event {
    #[must_use]
    pub fn new(key: impl Into<String>, value: f64, timestamp: f64) -> Self {
        Self {
            key: key.into(),
            value,
            timestamp,
        }
    }
}

/// Outcome of judging one `Event` against the history of its key.
///
/// `mean` and `std_dev` are the statistics the value was judged against,
/// i.e. before the value itself was learned. They are `None` while the key
/// has no history yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredEvent {
    pub key: String,
    pub value: f64,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub score: f64,
    pub is_anomalous: bool,
    pub timestamp: f64,
}
