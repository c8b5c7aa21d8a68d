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

use thiserror::Error;

/// Bounds that make min-max scaling meaningless
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum NormalizationRangeError {
    #[error("normalization range is empty (min == max == {0})")]
    Empty(f64),
    #[error("normalization range is inverted (min {min} > max {max})")]
    Inverted { min: f64, max: f64 },
    #[error("normalization bounds must be finite (min {min}, max {max})")]
    NonFinite { min: f64, max: f64 },
}

/// Scale `value` so that `min` maps to 0.0 and `max` maps to 1.0.
///
/// Values outside the range are not clamped.
#[must_use]
pub const fn normalize(value: f64, min: f64, max: f64) -> f64 {
    (value - min) / (max - min)
}

/// Min-max scaler with bounds checked once, at construction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxNormalizer {
    min: f64,
    max: f64,
}

impl MinMaxNormalizer {
    pub const fn new(min: f64, max: f64) -> Result<Self, NormalizationRangeError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(NormalizationRangeError::NonFinite { min, max });
        }
        if min == max {
            return Err(NormalizationRangeError::Empty(min));
        }
        if min > max {
            return Err(NormalizationRangeError::Inverted { min, max });
        }
        Ok(Self { min, max })
    }

    #[must_use]
    pub const fn normalize(&self, value: f64) -> f64 {
        normalize(value, self.min, self.max)
    }

    #[must_use]
    pub const fn min(&self) -> f64 {
        self.min
    }

    #[must_use]
    pub const fn max(&self) -> f64 {
        self.max
    }
}
