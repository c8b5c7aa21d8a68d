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

use super::{OutputSink, SinkError};
use crate::event::ScoredEvent;
use chrono::DateTime;
use std::io::{self, Write};

/// How scored events are written out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable summary line
    Text,
}

/// Writes scored events line by line to any writer (stdout by default)
pub struct ConsoleSink<W: Write + Send> {
    writer: W,
    format: OutputFormat,
}

impl ConsoleSink<io::Stdout> {
    #[must_use]
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(io::stdout(), format)
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    #[must_use]
    pub const fn new(writer: W, format: OutputFormat) -> Self {
        Self { writer, format }
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// `2023-06-01 12:00:00` for whole seconds since the epoch, UTC
#[must_use]
pub fn format_timestamp(timestamp: f64) -> String {
    DateTime::from_timestamp(timestamp.floor() as i64, 0).map_or_else(
        || format!("{timestamp}"),
        |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

/// The classic one-line rendering of a scored event
#[must_use]
pub fn format_text(event: &ScoredEvent) -> String {
    format!(
        "{}: time = {}, value = {:.3}, score = {:.2}, is anomalous: {}",
        event.key,
        format_timestamp(event.timestamp),
        event.value,
        event.score,
        event.is_anomalous
    )
}

impl<W: Write + Send> OutputSink for ConsoleSink<W> {
    fn emit(&mut self, event: &ScoredEvent) -> Result<(), SinkError> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.writer, event)?;
                self.writer.write_all(b"\n")?;
            }
            OutputFormat::Text => {
                writeln!(self.writer, "{}", format_text(event))?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}
