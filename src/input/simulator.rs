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

//! Simulated warehouse temperature sensors.
//!
//! Every simulated second each sensor reports one reading in the normal
//! range. One sensor is faulty and occasionally reports a reading from the
//! anomaly range instead.

use super::json_lines::PAYLOAD_TIME_FORMAT;
use crate::config::{ConfigError, ResumeState};
use crate::event::Event;
use crate::partition::KeyPartitioner;
use chrono::DateTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::thread;
use std::time::Duration;

pub const SENSOR_IDS: [&str; 5] = ["1234", "2345", "3456", "4567", "5678"];
pub const FAULTY_SENSOR: &str = "3456";

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    pub sensors: Vec<String>,
    pub faulty: Option<String>,
    pub normal_range: (f64, f64),
    pub anomaly_range: (f64, f64),
    /// Chance that a reading of the faulty sensor is anomalous
    pub anomaly_probability: f64,
    /// Simulated clock at the first round, seconds since the epoch
    pub start: f64,
    pub seed: u64,
    /// Wall-clock delay between rounds, jittered by ±50%
    pub pace: Option<Duration>,
    /// Stop after this many rounds
    pub rounds: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sensors: SENSOR_IDS.iter().map(ToString::to_string).collect(),
            faulty: Some(FAULTY_SENSOR.to_string()),
            normal_range: (21.0, 28.0),
            anomaly_range: (65.0, 85.0),
            anomaly_probability: 0.03,
            start: 1_685_620_800.0,
            seed: 42,
            pace: None,
            rounds: None,
        }
    }
}

pub struct SensorSimulator {
    config: SimulatorConfig,
    rng: StdRng,
    sensors: Vec<String>,
    cursor: usize,
    round: u64,
    clock: f64,
}

impl SensorSimulator {
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            sensors: config.sensors.clone(),
            cursor: 0,
            round: 0,
            clock: config.start,
            config,
        }
    }

    /// Start a simulator from a resume state, which must be empty
    pub fn resume(config: SimulatorConfig, resume: &ResumeState) -> Result<Self, ConfigError> {
        resume.ensure_empty()?;
        Ok(Self::new(config))
    }

    /// Restrict the simulator to the sensors `worker_index` owns.
    ///
    /// Each partition gets its own random stream, derived from the seed.
    #[must_use]
    pub fn owned_by(mut self, partitioner: KeyPartitioner, worker_index: usize) -> Self {
        self.sensors
            .retain(|sensor| partitioner.owns(worker_index, sensor));
        self.rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(worker_index as u64));
        self
    }

    #[must_use]
    pub fn sensors(&self) -> &[String] {
        &self.sensors
    }

    fn finished(&self) -> bool {
        self.config.rounds.is_some_and(|rounds| self.round >= rounds)
    }

    fn wait(&mut self) {
        if let Some(pace) = self.config.pace {
            let jitter = self.rng.gen_range(0.5..1.5);
            thread::sleep(pace.mul_f64(jitter));
        }
    }

    fn reading(&mut self, sensor: &str) -> f64 {
        let probability = self.config.anomaly_probability.clamp(0.0, 1.0);
        let anomalous = self.rng.gen_bool(probability);
        let (a, b) = if anomalous && self.config.faulty.as_deref() == Some(sensor) {
            self.config.anomaly_range
        } else {
            self.config.normal_range
        };
        self.rng.gen_range(a.min(b)..=a.max(b))
    }
}

impl Iterator for SensorSimulator {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        if self.sensors.is_empty() {
            return None;
        }
        if self.cursor == self.sensors.len() {
            self.cursor = 0;
            self.round += 1;
            self.clock += 1.0;
            if !self.finished() {
                self.wait();
            }
        }
        if self.finished() {
            return None;
        }

        let sensor = self.sensors[self.cursor].clone();
        self.cursor += 1;
        let value = self.reading(&sensor);
        Some(Event::new(sensor, value, self.clock))
    }
}

/// The reading as a sensor would publish it
#[must_use]
pub fn to_payload(event: &Event) -> Value {
    let ts = DateTime::from_timestamp(event.timestamp.floor() as i64, 0).map_or_else(
        || Value::from(event.timestamp),
        |dt| Value::from(dt.format(PAYLOAD_TIME_FORMAT).to_string()),
    );
    json!({
        "sensor_id": event.key,
        "temp": event.value,
        "ts": ts,
    })
}
