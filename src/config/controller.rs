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
use serde::Deserialize;

use super::error::ConfigError;

/// Allows users to specify various controllers.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Controller {
    #[default]
    Keyboard,
    Midi(MidiController),
}

/// Plays the piano from a MIDI input.
#[derive(Deserialize, Clone, Debug)]
pub struct MidiController {
    /// The MIDI input device, matched by substring.
    device: String,

    /// Only listen to this channel (1-16). Listens to all channels when unset.
    channel: Option<u8>,
}

impl MidiController {
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the zero-based channel filter, if any. Channels outside 1-16 are
    /// rejected rather than widening the filter to every channel.
    pub fn channel(&self) -> Result<Option<u8>, ConfigError> {
        match self.channel {
            None => Ok(None),
            Some(channel) if (1..=16).contains(&channel) => Ok(Some(channel - 1)),
            Some(channel) => Err(ConfigError::InvalidChannel(channel)),
        }
    }
}
