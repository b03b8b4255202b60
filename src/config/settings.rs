// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::engine::{Settings as EngineSettings, DEFAULT_DECAY, DEFAULT_VOLUME};

/// Initial engine settings.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Settings {
    /// Master volume between 0.0 and 1.0.
    volume: Option<f32>,

    /// How long released notes take to fade out, e.g. "300ms".
    decay: Option<String>,
}

impl Settings {
    /// Converts into engine settings, applying defaults.
    pub fn to_settings(&self) -> Result<EngineSettings, ConfigError> {
        let decay = match &self.decay {
            Some(decay) => parse_duration(decay)?,
            None => DEFAULT_DECAY,
        };
        Ok(EngineSettings::new(
            self.volume.unwrap_or(DEFAULT_VOLUME),
            decay,
        ))
    }
}

/// Parses a duration string such as "250ms" or "1s".
pub fn parse_duration(value: &str) -> Result<std::time::Duration, ConfigError> {
    DurationString::from_string(value.trim().to_string())
        .map(Into::into)
        .map_err(|e| ConfigError::InvalidDuration {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default().to_settings().unwrap();
        assert_eq!(settings.volume(), DEFAULT_VOLUME);
        assert_eq!(settings.decay(), DEFAULT_DECAY);
    }
}
