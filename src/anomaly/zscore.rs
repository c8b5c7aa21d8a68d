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

use crate::anomaly::scorer::{AnomalyScorer, Sample};
use crate::anomaly::window::{Baseline, RollingWindow};
use std::num::NonZeroUsize;

/// Z-score of a value against the last `window_size` raw values of its key.
///
/// Works on raw values: the z-score does not change under min-max scaling,
/// and raw values keep the reported mean and spread in sensor units.
pub struct RollingZScoreScorer {
    window: RollingWindow,
    threshold: f64,
}

impl RollingZScoreScorer {
    pub const DEFAULT_THRESHOLD: f64 = 2.0;
    pub const DEFAULT_WINDOW_SIZE: usize = 10;

    #[must_use]
    pub fn new(window_size: NonZeroUsize, threshold: f64) -> Self {
        Self {
            window: RollingWindow::new(window_size),
            threshold,
        }
    }

    #[must_use]
    pub const fn window(&self) -> &RollingWindow {
        &self.window
    }
}

/// Spread small enough to count as zero variance.
///
/// Repeated identical values can leave rounding residue in the mean, so an
/// exact `== 0.0` check would let a few ulps of noise produce huge scores.
fn is_degenerate_spread(mean: f64, std_dev: f64) -> bool {
    std_dev <= f64::EPSILON * mean.abs().max(1.0)
}

impl AnomalyScorer for RollingZScoreScorer {
    fn score(&mut self, sample: &Sample) -> f64 {
        if self.window.len() < 2 {
            return 0.0; // No baseline yet
        }
        let (Some(mean), Some(std_dev)) = (self.window.mean(), self.window.std_dev()) else {
            return 0.0;
        };
        if is_degenerate_spread(mean, std_dev) {
            return 0.0;
        }

        (sample.raw - mean).abs() / std_dev
    }

    fn update(&mut self, sample: &Sample) {
        self.window.push(sample.raw);
    }

    fn is_anomalous(&self, score: f64) -> bool {
        score > self.threshold
    }

    fn baseline(&self) -> Baseline {
        self.window.baseline()
    }
}

impl Default for RollingZScoreScorer {
    fn default() -> Self {
        Self::new(
            NonZeroUsize::new(Self::DEFAULT_WINDOW_SIZE).unwrap_or(NonZeroUsize::MIN),
            Self::DEFAULT_THRESHOLD,
        )
    }
}
