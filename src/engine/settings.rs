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
use std::time::Duration;

use tracing::warn;

/// Master volume when nothing else is configured.
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Release time when nothing else is configured.
pub const DEFAULT_DECAY: Duration = Duration::from_millis(300);

/// Engine-wide playback settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Settings {
    volume: f32,
    decay: Duration,
}

impl Settings {
    /// Creates settings, clamping the volume to 0.0..=1.0.
    pub fn new(volume: f32, decay: Duration) -> Settings {
        let mut settings = Settings::default();
        settings.apply(SettingsUpdate {
            volume: Some(volume),
            decay: Some(decay),
        });
        settings
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn decay(&self) -> Duration {
        self.decay
    }

    /// Merges a partial update. Fields left unset keep their current value.
    pub(crate) fn apply(&mut self, update: SettingsUpdate) {
        if let Some(volume) = update.volume {
            if volume.is_finite() {
                self.volume = volume.clamp(0.0, 1.0);
            } else {
                warn!(volume, "Ignoring invalid volume");
            }
        }
        if let Some(decay) = update.decay {
            self.decay = decay;
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            volume: DEFAULT_VOLUME,
            decay: DEFAULT_DECAY,
        }
    }
}

/// A partial settings change.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SettingsUpdate {
    pub volume: Option<f32>,
    pub decay: Option<Duration>,
}

impl SettingsUpdate {
    pub fn volume(volume: f32) -> SettingsUpdate {
        SettingsUpdate {
            volume: Some(volume),
            decay: None,
        }
    }

    pub fn decay(decay: Duration) -> SettingsUpdate {
        SettingsUpdate {
            volume: None,
            decay: Some(decay),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.volume(), 1.0);
        assert_eq!(settings.decay(), Duration::from_millis(300));
    }

    #[test]
    fn test_partial_update() {
        let mut settings = Settings::default();
        settings.apply(SettingsUpdate::volume(0.25));
        assert_eq!(settings.volume(), 0.25);
        assert_eq!(settings.decay(), DEFAULT_DECAY);

        settings.apply(SettingsUpdate::decay(Duration::from_secs(2)));
        assert_eq!(settings.volume(), 0.25);
        assert_eq!(settings.decay(), Duration::from_secs(2));
    }

    #[test]
    fn test_volume_clamped() {
        assert_eq!(Settings::new(1.5, DEFAULT_DECAY).volume(), 1.0);
        assert_eq!(Settings::new(-0.5, DEFAULT_DECAY).volume(), 0.0);

        let mut settings = Settings::new(0.4, DEFAULT_DECAY);
        settings.apply(SettingsUpdate::volume(f32::NAN));
        assert_eq!(settings.volume(), 0.4);
    }
}
