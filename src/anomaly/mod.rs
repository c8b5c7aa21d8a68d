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

pub mod forest;
pub mod normalize;
pub mod scorer;
pub mod window;
pub mod zscore;

use forest::{DensityForestScorer, ForestParams};
use scorer::AnomalyScorer;
use std::num::NonZeroUsize;
use zscore::RollingZScoreScorer;

/// Which scorer every key gets, with its parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScorerSpec {
    ZScore {
        window_size: NonZeroUsize,
        threshold: f64,
    },
    DensityForest(ForestParams),
}

impl ScorerSpec {
    /// Create a fresh scorer for a key seen for the first time
    #[must_use]
    pub fn build(&self) -> Box<dyn AnomalyScorer> {
        match self {
            Self::ZScore {
                window_size,
                threshold,
            } => Box::new(RollingZScoreScorer::new(*window_size, *threshold)),
            Self::DensityForest(params) => Box::new(DensityForestScorer::new(params)),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ZScore { .. } => "zscore",
            Self::DensityForest(_) => "densityForest",
        }
    }
}

impl Default for ScorerSpec {
    fn default() -> Self {
        Self::ZScore {
            window_size: NonZeroUsize::new(RollingZScoreScorer::DEFAULT_WINDOW_SIZE)
                .unwrap_or(NonZeroUsize::MIN),
            threshold: RollingZScoreScorer::DEFAULT_THRESHOLD,
        }
    }
}
