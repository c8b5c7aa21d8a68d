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

use crate::anomaly::window::Baseline;

/// One reading as a scorer sees it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Value in sensor units
    pub raw: f64,
    /// Value after min-max scaling
    pub normalized: f64,
}

/// Result of observing one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub score: f64,
    pub is_anomalous: bool,
    /// Statistics the sample was judged against (before it was learned)
    pub baseline: Baseline,
}

/// Trait for online anomaly scoring components
pub trait AnomalyScorer: Send {
    /// Score a sample before updating internal state
    fn score(&mut self, sample: &Sample) -> f64;

    /// Update internal state after scoring
    fn update(&mut self, sample: &Sample);

    /// Whether `score` crosses this scorer's cutoff
    fn is_anomalous(&self, score: f64) -> bool;

    /// Statistics the next sample will be judged against
    fn baseline(&self) -> Baseline;

    /// Judge `sample` against the history preceding it, then learn from it.
    ///
    /// Learning happens unconditionally, anomalous or not.
    fn observe(&mut self, sample: &Sample) -> Verdict {
        let baseline = self.baseline();
        let score = self.score(sample);
        let is_anomalous = self.is_anomalous(score);
        self.update(sample);
        Verdict {
            score,
            is_anomalous,
            baseline,
        }
    }
}
