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
use std::path::Path;

use config::{Config, File};
use serde::Deserialize;

mod audio;
mod controller;
mod error;
mod samples;
mod settings;

pub use audio::Audio;
pub use controller::{Controller, MidiController};
pub use error::ConfigError;
pub use samples::Samples;
pub use settings::{parse_duration, Settings};

/// The top level piano configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Piano {
    /// The output device configuration.
    #[serde(default)]
    audio: Audio,

    /// Where samples are loaded from.
    #[serde(default)]
    samples: Samples,

    /// Initial engine settings.
    #[serde(default)]
    settings: Settings,

    /// The controller that plays the piano.
    #[serde(default)]
    controller: Controller,
}

impl Piano {
    /// Loads the configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Piano, ConfigError> {
        let piano = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Piano>()?;
        piano.validate()?;
        Ok(piano)
    }

    /// Checks values serde can't express constraints for.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Controller::Midi(midi) = &self.controller {
            midi.channel()?;
        }
        Ok(())
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use config::FileFormat;

    use super::*;
    use crate::samples::SampleLocation;

    fn parse(yaml: &str) -> Piano {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_full_config() {
        let piano = parse(
            r#"
            audio:
              device: mock-piano
              sample_rate: 48000
              channels: 2
              buffer_size: 256
            samples:
              location: /srv/salamander
            settings:
              volume: 0.8
              decay: 1s
            controller:
              kind: midi
              device: Keystation
              channel: 1
            "#,
        );

        assert_eq!(piano.audio().device(), "mock-piano");
        assert_eq!(piano.audio().sample_rate(), Some(48000));
        assert_eq!(piano.audio().channels(), Some(2));
        assert_eq!(piano.audio().buffer_size(), Some(256));
        assert_eq!(
            piano.samples().location(),
            SampleLocation::Local("/srv/salamander".into())
        );

        let settings = piano.settings().to_settings().unwrap();
        assert_eq!(settings.volume(), 0.8);
        assert_eq!(settings.decay(), Duration::from_secs(1));

        match piano.controller() {
            Controller::Midi(midi) => {
                assert_eq!(midi.device(), "Keystation");
                assert_eq!(midi.channel().unwrap(), Some(0));
            }
            other => panic!("unexpected controller {:?}", other),
        }
    }

    #[test]
    fn test_minimal_config() {
        let piano = parse(
            r#"
            audio:
              device: default
            "#,
        );

        assert_eq!(piano.audio().device(), "default");
        assert_eq!(piano.audio().sample_rate(), None);
        assert_eq!(piano.samples().location(), SampleLocation::default());
        assert!(matches!(piano.controller(), Controller::Keyboard));
    }

    #[test]
    fn test_bad_decay() {
        let piano = parse(
            r#"
            settings:
              decay: forever
            "#,
        );
        assert!(piano.settings().to_settings().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("piano.yaml");
        std::fs::write(&path, "audio:\n  device: mock-piano\ncontroller:\n  kind: keyboard\n")
            .unwrap();
        let piano = Piano::load(&path).unwrap();
        assert_eq!(piano.audio().device(), "mock-piano");
    }

    #[test]
    fn test_invalid_midi_channel() {
        for channel in [0u8, 17] {
            let piano = parse(&format!(
                "controller:\n  kind: midi\n  device: Keystation\n  channel: {}\n",
                channel
            ));
            match piano.controller() {
                Controller::Midi(midi) => assert!(matches!(
                    midi.channel(),
                    Err(ConfigError::InvalidChannel(c)) if c == channel
                )),
                other => panic!("unexpected controller {:?}", other),
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("piano.yaml");
        std::fs::write(
            &path,
            "controller:\n  kind: midi\n  device: Keystation\n  channel: 0\n",
        )
        .unwrap();
        assert!(matches!(
            Piano::load(&path),
            Err(ConfigError::InvalidChannel(0))
        ));
    }

    #[test]
    fn test_midi_channel_unset_listens_everywhere() {
        let piano = parse("controller:\n  kind: midi\n  device: Keystation\n");
        match piano.controller() {
            Controller::Midi(midi) => assert_eq!(midi.channel().unwrap(), None),
            other => panic!("unexpected controller {:?}", other),
        }
    }
}
