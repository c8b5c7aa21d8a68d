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

use crate::anomaly::normalize::MinMaxNormalizer;
use crate::anomaly::scorer::{AnomalyScorer, Sample};
use crate::anomaly::window::Baseline;
use crate::event::{Event, ScoredEvent};

/// Everything the engine remembers about one key
pub struct KeyState {
    scorer: Box<dyn AnomalyScorer>,
    observed: u64,
}

impl KeyState {
    #[must_use]
    pub const fn new(scorer: Box<dyn AnomalyScorer>) -> Self {
        Self {
            scorer,
            observed: 0,
        }
    }

    /// Score `event` against this key's history, then learn it
    pub fn apply(&mut self, event: &Event, normalizer: &MinMaxNormalizer) -> ScoredEvent {
        let sample = Sample {
            raw: event.value,
            normalized: normalizer.normalize(event.value),
        };
        let verdict = self.scorer.observe(&sample);
        self.observed += 1;

        ScoredEvent {
            key: event.key.clone(),
            value: event.value,
            mean: verdict.baseline.mean,
            std_dev: verdict.baseline.std_dev,
            score: verdict.score,
            is_anomalous: verdict.is_anomalous,
            timestamp: event.timestamp,
        }
    }

    /// Statistics the next event will be judged against
    #[must_use]
    pub fn baseline(&self) -> Baseline {
        self.scorer.baseline()
    }

    #[must_use]
    pub const fn observed(&self) -> u64 {
        self.observed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::ScorerSpec;

    #[test]
    fn test_apply_reports_prior_statistics() {
        let normalizer = MinMaxNormalizer::new(21.0, 85.0).expect("valid");
        let mut state = KeyState::new(ScorerSpec::default().build());

        let first = state.apply(&Event::new("k", 21.0, 1.0), &normalizer);
        assert_eq!(first.mean, None);
        assert_eq!(first.score, 0.0);
        assert!(!first.is_anomalous);

        state.apply(&Event::new("k", 23.0, 2.0), &normalizer);
        let third = state.apply(&Event::new("k", 22.0, 3.0), &normalizer);
        assert_eq!(third.mean, Some(22.0));
        assert_eq!(third.std_dev, Some(1.0));
        assert_eq!(third.timestamp, 3.0);
        assert_eq!(state.observed(), 3);
        assert_eq!(state.baseline().samples, 3);
    }
}
