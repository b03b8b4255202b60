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
use std::collections::HashMap;
use std::time::Duration;

use tracing::warn;

use crate::audio::{AudioParam, SourceHandle};

/// Gain a released voice fades toward. Exponential ramps can't reach zero.
pub const RELEASE_FLOOR: f32 = 0.001;

/// Extra time a released source keeps running after its fade completes.
pub const STOP_MARGIN: Duration = Duration::from_millis(100);

/// What produces a voice's sound.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VoiceKind {
    /// A captured sample, pitch-shifted from the pitch it was recorded at.
    Sampled { pitch: u8, playback_rate: f64 },
    /// The triangle-wave fallback used when no sample is available.
    Synthesized { frequency: f64 },
}

/// One sounding note: a source plus its own gain envelope.
#[derive(Debug)]
pub struct Voice {
    key_index: u8,
    kind: VoiceKind,
    gain: AudioParam,
    handle: SourceHandle,
    started_at: f64,
}

impl Voice {
    pub fn new(
        key_index: u8,
        kind: VoiceKind,
        gain: AudioParam,
        handle: SourceHandle,
        started_at: f64,
    ) -> Voice {
        Voice {
            key_index,
            kind,
            gain,
            handle,
            started_at,
        }
    }

    pub fn key_index(&self) -> u8 {
        self.key_index
    }

    pub fn kind(&self) -> VoiceKind {
        self.kind
    }

    /// The voice's envelope.
    pub fn gain(&self) -> &AudioParam {
        &self.gain
    }

    pub fn handle(&self) -> &SourceHandle {
        &self.handle
    }

    pub fn started_at(&self) -> f64 {
        self.started_at
    }

    /// Fades the voice out from wherever its envelope currently is and schedules
    /// its source to stop. Returns the stop time.
    pub fn release(&self, now: f64, decay: Duration) -> f64 {
        let current = self.gain.value_at(now);
        self.gain.cancel_scheduled_values(now);
        self.gain.set_value_at_time(current, now);

        let fade_end = now + decay.as_secs_f64();
        if let Err(e) = self
            .gain
            .exponential_ramp_to_value_at_time(RELEASE_FLOOR, fade_end)
        {
            warn!(key = self.key_index, err = %e, "Unable to schedule release");
        }

        let stop_at = fade_end + STOP_MARGIN.as_secs_f64();
        self.handle.stop(stop_at);
        stop_at
    }
}

/// Active voices by key index. A key has at most one voice.
#[derive(Debug, Default)]
pub struct VoiceTable {
    voices: HashMap<u8, Voice>,
}

impl VoiceTable {
    /// Registers a voice, returning any voice it replaced.
    pub fn insert(&mut self, voice: Voice) -> Option<Voice> {
        self.voices.insert(voice.key_index, voice)
    }

    pub fn remove(&mut self, key_index: u8) -> Option<Voice> {
        self.voices.remove(&key_index)
    }

    pub fn get(&self, key_index: u8) -> Option<&Voice> {
        self.voices.get(&key_index)
    }

    /// Removes every voice.
    pub fn drain(&mut self) -> Vec<Voice> {
        self.voices.drain().map(|(_, voice)| voice).collect()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}
