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

//! Bounded history of the most recent raw values of one key.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// Statistics a value is judged against
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Baseline {
    pub samples: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
}

/// Fixed-capacity buffer of recent values, newest first.
///
/// `mean` and `std_dev` are recomputed on every push from exactly the values
/// in the buffer, so a push and its derived statistics always change together.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: VecDeque<f64>,
    capacity: NonZeroUsize,
    mean: Option<f64>,
    std_dev: Option<f64>,
}

impl RollingWindow {
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity.get() + 1),
            capacity,
            mean: None,
            std_dev: None,
        }
    }

    /// Insert `value` as the newest entry, evicting the oldest when full
    pub fn push(&mut self, value: f64) {
        self.values.push_front(value);
        if self.values.len() > self.capacity.get() {
            self.values.pop_back();
        }
        self.recompute();
    }

    fn recompute(&mut self) {
        if self.values.is_empty() {
            self.mean = None;
            self.std_dev = None;
            return;
        }

        let count = self.values.len() as f64;
        let mean = self.values.iter().sum::<f64>() / count;
        // Population variance: divide by count, not count - 1
        let variance = self
            .values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / count;

        self.mean = Some(mean);
        self.std_dev = Some(variance.sqrt());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub const fn mean(&self) -> Option<f64> {
        self.mean
    }

    #[must_use]
    pub const fn std_dev(&self) -> Option<f64> {
        self.std_dev
    }

    /// Values from newest to oldest
    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    #[must_use]
    pub fn baseline(&self) -> Baseline {
        Baseline {
            samples: self.values.len(),
            mean: self.mean,
            std_dev: self.std_dev,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(capacity: usize) -> RollingWindow {
        RollingWindow::new(NonZeroUsize::new(capacity).expect("non-zero"))
    }

    #[test]
    fn test_eviction_keeps_newest() {
        let mut w = window(10);
        for v in 1..=12 {
            w.push(f64::from(v));
        }

        let kept: Vec<f64> = w.iter().collect();
        let expected: Vec<f64> = (3..=12).rev().map(f64::from).collect();
        assert_eq!(kept, expected);
        assert_eq!(w.len(), 10);
    }

    #[test]
    fn test_population_statistics() {
        let mut w = window(10);
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            w.push(v);
        }

        assert_eq!(w.mean(), Some(5.0));
        assert_eq!(w.std_dev(), Some(2.0));
    }

    #[test]
    fn test_statistics_track_evictions() {
        let mut w = window(2);
        w.push(100.0);
        w.push(1.0);
        w.push(3.0);

        // 100.0 has been evicted and must not influence the mean
        assert_eq!(w.mean(), Some(2.0));
        assert_eq!(w.std_dev(), Some(1.0));
    }

    #[test]
    fn test_empty_window_has_no_statistics() {
        let w = window(10);
        assert!(w.is_empty());
        assert_eq!(w.baseline(), Baseline::default());
    }

    #[test]
    fn test_single_value_has_zero_spread() {
        let mut w = window(10);
        w.push(42.0);
        assert_eq!(w.mean(), Some(42.0));
        assert_eq!(w.std_dev(), Some(0.0));
    }
}
