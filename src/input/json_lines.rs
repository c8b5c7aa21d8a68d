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

//! JSON-lines feed.
//!
//! Accepts both the canonical shape
//! `{"key": "1234", "value": 23.4, "timestamp": 1685620800}` and the sensor
//! payload shape `{"sensor_id": "1234", "temp": 23.4, "ts": "2023-06-01 12:00:00"}`.

use super::{FeedError, MalformedEventError};
use crate::event::Event;
use chrono::{DateTime, NaiveDateTime};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

const KEY_FIELDS: [&str; 2] = ["key", "sensor_id"];
const VALUE_FIELDS: [&str; 2] = ["value", "temp"];
const TIMESTAMP_FIELDS: [&str; 2] = ["timestamp", "ts"];

/// Date format of the sensor payload, always UTC
pub const PAYLOAD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse one line into an event. `line` is only used for diagnostics.
pub fn parse_line(text: &str, line: u64) -> Result<Event, MalformedEventError> {
    let parsed: Value =
        serde_json::from_str(text).map_err(|source| MalformedEventError::Json { line, source })?;
    let Value::Object(object) = parsed else {
        return Err(MalformedEventError::NotAnObject { line });
    };

    let key = match field(&object, &KEY_FIELDS) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(MalformedEventError::MissingField { line, field: "key" }),
    };

    let value = field(&object, &VALUE_FIELDS)
        .and_then(Value::as_f64)
        .ok_or(MalformedEventError::MissingField {
            line,
            field: "value",
        })?;
    if !value.is_finite() {
        return Err(MalformedEventError::NonFiniteValue { line, key });
    }

    let timestamp = match field(&object, &TIMESTAMP_FIELDS) {
        Some(Value::Number(n)) => n.as_f64().filter(|t| t.is_finite()),
        Some(Value::String(s)) => parse_timestamp(s),
        Some(other) => {
            return Err(MalformedEventError::BadTimestamp {
                line,
                value: other.to_string(),
            })
        }
        None => {
            return Err(MalformedEventError::MissingField {
                line,
                field: "timestamp",
            })
        }
    };
    let Some(timestamp) = timestamp else {
        return Err(MalformedEventError::BadTimestamp {
            line,
            value: field(&object, &TIMESTAMP_FIELDS)
                .map(Value::to_string)
                .unwrap_or_default(),
        });
    };

    Ok(Event::new(key, value, timestamp))
}

fn field<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| object.get(*name))
}

/// Seconds since the epoch from a numeric string, a payload date or RFC 3339
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Ok(seconds) = text.parse::<f64>() {
        return seconds.is_finite().then_some(seconds);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, PAYLOAD_TIME_FORMAT) {
        return Some(naive.and_utc().timestamp() as f64);
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.timestamp_millis() as f64 / 1000.0)
}

/// Iterator over the events of a JSON-lines stream.
///
/// Blank lines are skipped. Invalid UTF-8 spoils only its own line, any
/// other read error is yielded once and ends the stream.
pub struct JsonLinesReader<R: BufRead> {
    reader: R,
    /// Lines fully read so far
    line: u64,
    buf: String,
    failed: bool,
}

impl JsonLinesReader<Box<dyn BufRead + Send>> {
    /// Open a file, or stdin for `-`
    pub fn open(path: &Path) -> io::Result<Self> {
        let reader: Box<dyn BufRead + Send> = if path.as_os_str() == "-" {
            Box::new(BufReader::new(io::stdin()))
        } else {
            Box::new(BufReader::new(File::open(path)?))
        };
        Ok(Self::new(reader))
    }
}

impl<R: BufRead> JsonLinesReader<R> {
    #[must_use]
    pub const fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
            failed: false,
        }
    }
}

impl<R: BufRead> Iterator for JsonLinesReader<R> {
    type Item = Result<Event, FeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line += 1;
                    let text = self.buf.trim();
                    if text.is_empty() {
                        continue;
                    }
                    return Some(parse_line(text, self.line).map_err(FeedError::from));
                }
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    // read_line consumed the bad line; carry on with the next
                    self.line += 1;
                    return Some(Err(MalformedEventError::Unreadable { line: self.line }.into()));
                }
                Err(source) => {
                    self.failed = true;
                    return Some(Err(FeedError::Io {
                        line: self.line + 1,
                        source,
                    }));
                }
            }
        }
    }
}
