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

//! Engine configuration.
//!
//! [`EngineConfig`] mirrors the JSON config file and the CLI flags. It is
//! validated exactly once at startup into [`EngineSettings`], which carries
//! only values the engine can run with.

pub mod resume;

pub use resume::ResumeState;

use crate::anomaly::forest::ForestParams;
use crate::anomaly::normalize::{MinMaxNormalizer, NormalizationRangeError};
use crate::anomaly::ScorerSpec;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Deepest tree the density forest accepts.
///
/// A tree takes about 32 bytes per leaf and every key has its own forest,
/// so height 12 costs 128 KiB per tree per key.
pub const MAX_TREE_HEIGHT: usize = 12;

/// All the ways a configuration can be unusable
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    NormalizationRange(#[from] NormalizationRangeError),

    #[error("resuming from a snapshot is not supported (got resume state {0})")]
    UnsupportedResumeState(String),

    #[error("resume state is not valid JSON: {0}")]
    ResumeStateSyntax(#[source] serde_json::Error),

    #[error("window size must be at least 1")]
    InvalidWindowSize,

    #[error("threshold must be a finite non-negative number (got {0})")]
    InvalidThreshold(f64),

    #[error("worker count must be at least 1")]
    InvalidWorkerCount,

    #[error("queue capacity must be at least 1")]
    InvalidQueueCapacity,

    #[error("invalid density forest settings: {0}")]
    InvalidForest(String),

    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Scorer variant selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum ScorerKind {
    #[default]
    Zscore,
    #[value(alias = "densityForest")]
    DensityForest,
}

/// Mirror of the `densityForest` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForestConfig {
    pub num_trees: usize,
    pub tree_height: usize,
    pub window_size: usize,
    pub seed: u64,
    pub score_cutoff: f64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        let defaults = ForestParams::default();
        Self {
            num_trees: defaults.num_trees.get(),
            tree_height: defaults.tree_height,
            window_size: defaults.window_size.get(),
            seed: defaults.seed,
            score_cutoff: defaults.score_cutoff,
        }
    }
}

/// How hard to try before declaring the output sink dead
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_ms: 50,
        }
    }
}

/// Engine configuration as written in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Rolling window length of the z-score scorer
    pub window_size: usize,
    /// Z-score cutoff
    pub threshold: f64,
    pub normalization_min: f64,
    pub normalization_max: f64,
    /// `None` means one worker per available CPU
    pub worker_count: Option<usize>,
    pub scorer: ScorerKind,
    pub density_forest: ForestConfig,
    /// Bound of every worker's input queue and of the sink queue
    pub queue_capacity: usize,
    pub sink_retry: RetryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            threshold: 2.0,
            // Warehouse temperature domain of the simulated sensors
            normalization_min: 21.0,
            normalization_max: 85.0,
            worker_count: None,
            scorer: ScorerKind::Zscore,
            density_forest: ForestConfig::default(),
            queue_capacity: 1024,
            sink_retry: RetryConfig::default(),
        }
    }
}

/// Sink retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

/// Validated configuration the engine runs with
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub scorer: ScorerSpec,
    pub normalizer: MinMaxNormalizer,
    pub worker_count: NonZeroUsize,
    pub queue_capacity: NonZeroUsize,
    pub retry: RetryPolicy,
}

impl EngineSettings {
    /// Settings from the default configuration with a fixed worker count
    pub fn with_workers(worker_count: usize) -> Result<Self, ConfigError> {
        EngineConfig {
            worker_count: Some(worker_count),
            ..EngineConfig::default()
        }
        .validate()
    }
}

impl EngineConfig {
    /// Get the path to the per-user config file
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sensorcrab").join("config.json"))
    }

    /// Load a config file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config =
            serde_json::from_str::<Self>(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load `explicit` if given, else the per-user config if it exists, else defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Check every option and resolve defaults that depend on the host
    pub fn validate(&self) -> Result<EngineSettings, ConfigError> {
        let normalizer = MinMaxNormalizer::new(self.normalization_min, self.normalization_max)?;

        let scorer = match self.scorer {
            ScorerKind::Zscore => {
                let window_size =
                    NonZeroUsize::new(self.window_size).ok_or(ConfigError::InvalidWindowSize)?;
                if !self.threshold.is_finite() || self.threshold < 0.0 {
                    return Err(ConfigError::InvalidThreshold(self.threshold));
                }
                ScorerSpec::ZScore {
                    window_size,
                    threshold: self.threshold,
                }
            }
            ScorerKind::DensityForest => ScorerSpec::DensityForest(self.density_forest.validate()?),
        };

        let worker_count = match self.worker_count {
            Some(n) => NonZeroUsize::new(n).ok_or(ConfigError::InvalidWorkerCount)?,
            None => std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
        };

        let queue_capacity =
            NonZeroUsize::new(self.queue_capacity).ok_or(ConfigError::InvalidQueueCapacity)?;

        Ok(EngineSettings {
            scorer,
            normalizer,
            worker_count,
            queue_capacity,
            retry: RetryPolicy {
                max_attempts: self.sink_retry.max_attempts.max(1),
                backoff: Duration::from_millis(self.sink_retry.backoff_ms),
            },
        })
    }
}

impl ForestConfig {
    fn validate(&self) -> Result<ForestParams, ConfigError> {
        let num_trees = NonZeroUsize::new(self.num_trees)
            .ok_or_else(|| ConfigError::InvalidForest("numTrees must be at least 1".into()))?;
        let window_size = NonZeroUsize::new(self.window_size)
            .filter(|w| u32::try_from(w.get()).is_ok())
            .ok_or_else(|| {
                ConfigError::InvalidForest("windowSize must be between 1 and u32::MAX".into())
            })?;
        if self.tree_height > MAX_TREE_HEIGHT {
            return Err(ConfigError::InvalidForest(format!(
                "treeHeight must be at most {MAX_TREE_HEIGHT} (got {})",
                self.tree_height
            )));
        }
        if !(0.0..=1.0).contains(&self.score_cutoff) {
            return Err(ConfigError::InvalidForest(format!(
                "scoreCutoff must lie in [0, 1] (got {})",
                self.score_cutoff
            )));
        }

        Ok(ForestParams {
            num_trees,
            tree_height: self.tree_height,
            window_size,
            seed: self.seed,
            score_cutoff: self.score_cutoff,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        let settings = EngineConfig::default().validate().expect("defaults are valid");
        assert_eq!(settings.scorer, ScorerSpec::default());
        assert_eq!(settings.normalizer.min(), 21.0);
        assert_eq!(settings.normalizer.max(), 85.0);
        assert_eq!(settings.queue_capacity.get(), 1024);
    }

    #[test]
    fn test_empty_normalization_range_is_fatal() {
        let config = EngineConfig {
            normalization_min: 30.0,
            normalization_max: 30.0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NormalizationRange(NormalizationRangeError::Empty(_)))
        ));
    }

    #[test]
    fn test_bad_values_rejected() {
        let zero_window = EngineConfig {
            window_size: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(zero_window.validate(), Err(ConfigError::InvalidWindowSize)));

        let negative = EngineConfig {
            threshold: -1.0,
            ..EngineConfig::default()
        };
        assert!(matches!(negative.validate(), Err(ConfigError::InvalidThreshold(_))));

        let no_workers = EngineConfig {
            worker_count: Some(0),
            ..EngineConfig::default()
        };
        assert!(matches!(no_workers.validate(), Err(ConfigError::InvalidWorkerCount)));

        let tall_forest = EngineConfig {
            scorer: ScorerKind::DensityForest,
            density_forest: ForestConfig {
                tree_height: 64,
                ..ForestConfig::default()
            },
            ..EngineConfig::default()
        };
        assert!(matches!(tall_forest.validate(), Err(ConfigError::InvalidForest(_))));
    }

    #[test]
    fn test_tree_height_limit() {
        let forest = |tree_height| EngineConfig {
            scorer: ScorerKind::DensityForest,
            density_forest: ForestConfig {
                tree_height,
                ..ForestConfig::default()
            },
            ..EngineConfig::default()
        };

        assert!(forest(MAX_TREE_HEIGHT).validate().is_ok());
        assert!(matches!(
            forest(MAX_TREE_HEIGHT + 1).validate(),
            Err(ConfigError::InvalidForest(_))
        ));
        assert!(matches!(forest(13).validate(), Err(ConfigError::InvalidForest(_))));
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"threshold": 3.5, "scorer": "densityForest", "densityForest": {{"numTrees": 8}}}}"#
        )
        .expect("write config");

        let config = EngineConfig::load(file.path()).expect("parses");
        assert_eq!(config.threshold, 3.5);
        assert_eq!(config.window_size, 10);
        assert_eq!(config.scorer, ScorerKind::DensityForest);
        assert_eq!(config.density_forest.num_trees, 8);
        assert_eq!(config.density_forest.tree_height, 3);

        let settings = config.validate().expect("valid");
        assert_eq!(settings.scorer.name(), "densityForest");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let result = EngineConfig::load_or_default(Some(&dir.path().join("nope.json")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
