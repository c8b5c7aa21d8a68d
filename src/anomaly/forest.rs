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

//! Density-based scoring with an ensemble of Half-Space Trees.
//!
//! Each tree recursively halves a randomly perturbed copy of the unit
//! feature space. Nodes count how many samples of the current window fell
//! into them (`latest`) and keep the counts of the previous complete window
//! (`reference`). A sample that lands in sparsely populated regions of the
//! reference window scores close to 1.
//!
//! Features are expected to be min-max scaled into `[0, 1]`.

use crate::anomaly::scorer::{AnomalyScorer, Sample};
use crate::anomaly::window::{Baseline, RollingWindow};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::num::NonZeroUsize;

/// Ensemble parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub num_trees: NonZeroUsize,
    /// Depth of every tree; a tree has `2^(height+1) - 1` nodes
    pub tree_height: usize,
    /// Number of samples per mass window
    pub window_size: NonZeroUsize,
    pub seed: u64,
    /// Scores above this are anomalous
    pub score_cutoff: f64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            num_trees: NonZeroUsize::new(5).unwrap_or(NonZeroUsize::MIN),
            tree_height: 3,
            window_size: NonZeroUsize::new(30).unwrap_or(NonZeroUsize::MIN),
            seed: 42,
            score_cutoff: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Mass {
    reference: u32,
    latest: u32,
}

/// One tree stored as a complete binary tree in breadth-first order:
/// the children of node `i` are `2i + 1` and `2i + 2`.
#[derive(Debug, Clone)]
struct HalfSpaceTree {
    split_feature: Vec<usize>,
    split_value: Vec<f64>,
    mass: Vec<Mass>,
    height: usize,
}

impl HalfSpaceTree {
    fn build(rng: &mut StdRng, num_features: usize, height: usize) -> Self {
        let internal = (1usize << height) - 1;
        let total = (1usize << (height + 1)) - 1;

        // Randomly perturbed workspace so that trees disagree on where to cut
        let mut lower = Vec::with_capacity(num_features);
        let mut upper = Vec::with_capacity(num_features);
        for _ in 0..num_features {
            let s: f64 = rng.gen();
            let spread = 2.0 * s.max(1.0 - s);
            lower.push(s - spread);
            upper.push(s + spread);
        }

        let mut tree = Self {
            split_feature: vec![0; internal],
            split_value: vec![0.0; internal],
            mass: vec![Mass::default(); total],
            height,
        };
        tree.grow(rng, 0, 0, &mut lower, &mut upper);
        tree
    }

    fn grow(
        &mut self,
        rng: &mut StdRng,
        node: usize,
        depth: usize,
        lower: &mut [f64],
        upper: &mut [f64],
    ) {
        if depth == self.height {
            return;
        }

        let feature = rng.gen_range(0..lower.len());
        let split = (lower[feature] + upper[feature]) / 2.0;
        self.split_feature[node] = feature;
        self.split_value[node] = split;

        let saved_upper = upper[feature];
        upper[feature] = split;
        self.grow(rng, 2 * node + 1, depth + 1, lower, upper);
        upper[feature] = saved_upper;

        let saved_lower = lower[feature];
        lower[feature] = split;
        self.grow(rng, 2 * node + 2, depth + 1, lower, upper);
        lower[feature] = saved_lower;
    }

    /// Node indices from the root down to the leaf containing `features`
    fn path(&self, features: &[f64]) -> Vec<usize> {
        let mut path = Vec::with_capacity(self.height + 1);
        let mut node = 0;
        path.push(node);
        for _ in 0..self.height {
            let value = features
                .get(self.split_feature[node])
                .copied()
                .unwrap_or(0.0);
            node = if value < self.split_value[node] {
                2 * node + 1
            } else {
                2 * node + 2
            };
            path.push(node);
        }
        path
    }
}

/// Half-Space Trees ensemble
#[derive(Debug, Clone)]
pub struct HalfSpaceForest {
    trees: Vec<HalfSpaceTree>,
    window_size: usize,
    seen_in_window: usize,
    reference_ready: bool,
    size_limit: f64,
    max_score: f64,
}

impl HalfSpaceForest {
    #[must_use]
    pub fn new(params: &ForestParams, num_features: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(params.seed);
        let num_features = num_features.max(1);
        let trees = (0..params.num_trees.get())
            .map(|_| HalfSpaceTree::build(&mut rng, num_features, params.tree_height))
            .collect();

        let window_size = params.window_size.get();
        let nodes_on_full_path = ((1u64 << (params.tree_height + 1)) - 1) as f64;

        Self {
            trees,
            window_size,
            seen_in_window: 0,
            reference_ready: false,
            size_limit: 0.1 * window_size as f64,
            max_score: params.num_trees.get() as f64 * window_size as f64 * nodes_on_full_path,
        }
    }

    /// Anomaly score in `[0, 1]`, higher is more anomalous.
    ///
    /// Always 0 until the first reference window has been collected.
    #[must_use]
    pub fn score(&self, features: &[f64]) -> f64 {
        if !self.reference_ready {
            return 0.0;
        }

        let mut mass_score = 0.0;
        for tree in &self.trees {
            for (depth, node) in tree.path(features).into_iter().enumerate() {
                let reference = f64::from(tree.mass[node].reference);
                mass_score += reference * (1u64 << depth) as f64;
                if reference < self.size_limit {
                    break;
                }
            }
        }

        (1.0 - mass_score / self.max_score).clamp(0.0, 1.0)
    }

    /// Count `features` into the latest window, rolling windows when full
    pub fn learn(&mut self, features: &[f64]) {
        for tree in &mut self.trees {
            for node in tree.path(features) {
                tree.mass[node].latest += 1;
            }
        }

        self.seen_in_window += 1;
        if self.seen_in_window == self.window_size {
            for tree in &mut self.trees {
                for mass in &mut tree.mass {
                    mass.reference = mass.latest;
                    mass.latest = 0;
                }
            }
            self.seen_in_window = 0;
            self.reference_ready = true;
        }
    }

    #[must_use]
    pub const fn is_warm(&self) -> bool {
        self.reference_ready
    }
}

/// Scorer backed by a [`HalfSpaceForest`] over the normalized value.
///
/// A rolling window of raw values of the same length is kept next to the
/// forest so scored events report a mean and spread like the z-score variant.
pub struct DensityForestScorer {
    forest: HalfSpaceForest,
    window: RollingWindow,
    score_cutoff: f64,
}

impl DensityForestScorer {
    #[must_use]
    pub fn new(params: &ForestParams) -> Self {
        Self {
            forest: HalfSpaceForest::new(params, 1),
            window: RollingWindow::new(params.window_size),
            score_cutoff: params.score_cutoff,
        }
    }
}

impl AnomalyScorer for DensityForestScorer {
    fn score(&mut self, sample: &Sample) -> f64 {
        self.forest.score(&[sample.normalized])
    }

    fn update(&mut self, sample: &Sample) {
        self.forest.learn(&[sample.normalized]);
        self.window.push(sample.raw);
    }

    fn is_anomalous(&self, score: f64) -> bool {
        score > self.score_cutoff
    }

    fn baseline(&self) -> Baseline {
        self.window.baseline()
    }
}
