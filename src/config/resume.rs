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

use super::ConfigError;
use serde_json::Value;

/// Snapshot a run would continue from.
///
/// Per-key state is never checkpointed, so the only accepted resume states
/// are the empty ones: absent, `null`, `{}`, `[]` or `""`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResumeState(Option<Value>);

impl ResumeState {
    /// Start from scratch
    #[must_use]
    pub const fn none() -> Self {
        Self(None)
    }

    #[must_use]
    pub const fn from_value(value: Value) -> Self {
        Self(Some(value))
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text)
            .map(Self::from_value)
            .map_err(ConfigError::ResumeStateSyntax)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            None | Some(Value::Null) => true,
            Some(Value::Object(map)) => map.is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(Value::String(s)) => s.is_empty(),
            Some(Value::Bool(_) | Value::Number(_)) => false,
        }
    }

    /// Fail fast on anything but an empty resume state
    pub fn ensure_empty(&self) -> Result<(), ConfigError> {
        if self.is_empty() {
            return Ok(());
        }

        let mut shown = self.0.as_ref().map(Value::to_string).unwrap_or_default();
        if shown.len() > 64 {
            let cut = (0..=64).rev().find(|&i| shown.is_char_boundary(i)).unwrap_or(0);
            shown.truncate(cut);
            shown.push('…');
        }
        Err(ConfigError::UnsupportedResumeState(shown))
    }
}
