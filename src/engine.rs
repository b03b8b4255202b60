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
//! The voice engine: turns key presses into sounding voices.
//!
//! Each press resolves the nearest captured sample and pitch-shifts it into
//! place, falling back to a synthesized tone while no samples are loaded. The
//! engine is owned by a single task; the renderer only sees the mixer.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::audio::{AudioContext, AudioError, AudioParam, Device, Source, Waveform};
use crate::keys::Note;
use crate::samples::{LoadedReceiver, SampleCache, SampleLoader, SampleLocation};

mod settings;
mod voice;

pub use settings::{Settings, SettingsUpdate, DEFAULT_DECAY, DEFAULT_VOLUME};
pub use voice::{Voice, VoiceKind, VoiceTable, RELEASE_FLOOR, STOP_MARGIN};

/// Time for a sampled voice to reach full gain.
pub const ATTACK: Duration = Duration::from_millis(5);

/// Time constant of the master gain's glide toward a new volume.
pub const VOLUME_TIME_CONSTANT: f64 = 0.1;

/// Peak gain of the fallback tone, reached after SYNTH_ATTACK.
const SYNTH_PEAK: f32 = 0.5;
const SYNTH_ATTACK: Duration = Duration::from_millis(50);
/// Level the fallback tone settles to, reached SYNTH_SETTLE after the press.
const SYNTH_SUSTAIN: f32 = 0.3;
const SYNTH_SETTLE: Duration = Duration::from_millis(500);

/// A sample-backed piano.
pub struct PianoEngine {
    device: Arc<dyn Device>,
    runtime: Handle,
    context: Option<AudioContext>,
    settings: Settings,
    voices: VoiceTable,
    cache: SampleCache,
    loader: SampleLoader,
    loaded_rx: LoadedReceiver,
}

impl PianoEngine {
    /// Creates an engine. Nothing is opened or loaded until [PianoEngine::init].
    pub fn new(
        device: Arc<dyn Device>,
        location: SampleLocation,
        settings: Settings,
        runtime: Handle,
    ) -> PianoEngine {
        let (loader, loaded_rx) = SampleLoader::new(location);
        PianoEngine {
            device,
            runtime,
            context: None,
            settings,
            voices: VoiceTable::default(),
            cache: SampleCache::new(),
            loader,
            loaded_rx,
        }
    }

    /// Opens the output and starts loading samples the first time it's called.
    /// Later calls only resume a suspended output, so this is safe to call on
    /// every user interaction. On error the engine stays uninitialized and a
    /// later call tries again.
    pub fn init(&mut self) -> Result<(), AudioError> {
        if let Some(context) = &self.context {
            return context.resume();
        }

        let context = AudioContext::open(self.device.as_ref(), self.settings.volume())?;
        self.context = Some(context);
        self.loader.start(&self.runtime);
        Ok(())
    }

    /// Starts a voice for the note, replacing any voice already on its key.
    pub fn play_note(&mut self, note: &Note) {
        if self.context.is_none() {
            if let Err(e) = self.init() {
                error!(note = note.name(), err = %e, "Unable to open audio output, dropping note");
                return;
            }
        }
        self.collect_loaded();

        let key_index = note.key_index();
        self.stop_note(key_index);

        let Some(context) = &self.context else {
            return;
        };
        let now = context.current_time();
        let gain = AudioParam::new(0.0);
        gain.set_value_at_time(0.0, now);

        let (source, kind) = match self.cache.nearest(note.midi()) {
            Some(resolved) => {
                gain.linear_ramp_to_value_at_time(1.0, now + ATTACK.as_secs_f64());
                let playback_rate = resolved.playback_rate();
                (
                    Source::buffer(resolved.buffer, playback_rate),
                    VoiceKind::Sampled {
                        pitch: resolved.pitch,
                        playback_rate,
                    },
                )
            }
            None => {
                gain.linear_ramp_to_value_at_time(SYNTH_PEAK, now + SYNTH_ATTACK.as_secs_f64());
                if let Err(e) = gain
                    .exponential_ramp_to_value_at_time(SYNTH_SUSTAIN, now + SYNTH_SETTLE.as_secs_f64())
                {
                    warn!(err = %e, "Unable to schedule synth envelope");
                }
                (
                    Source::oscillator(Waveform::Triangle, note.frequency()),
                    VoiceKind::Synthesized {
                        frequency: note.frequency(),
                    },
                )
            }
        };

        let handle = context.start(source, gain.clone(), now);
        debug!(
            note = note.name(),
            key = key_index,
            kind = format!("{:?}", kind),
            "Note started."
        );
        self.voices
            .insert(Voice::new(key_index, kind, gain, handle, now));
    }

    /// Releases the voice on a key. Does nothing if the key isn't sounding.
    pub fn stop_note(&mut self, key_index: u8) {
        let Some(context) = &self.context else {
            return;
        };
        let Some(voice) = self.voices.remove(key_index) else {
            return;
        };
        let stop_at = voice.release(context.current_time(), self.settings.decay());
        debug!(key = key_index, stop_at, "Note released.");
    }

    /// Releases every sounding voice.
    pub fn stop_all(&mut self) {
        let Some(context) = &self.context else {
            return;
        };
        let now = context.current_time();
        let decay = self.settings.decay();
        let voices = self.voices.drain();
        if !voices.is_empty() {
            info!(voices = voices.len(), "Releasing all notes.");
        }
        for voice in voices {
            voice.release(now, decay);
        }
    }

    /// Applies a partial settings change. Volume glides the master gain toward
    /// the new value; decay only affects notes released afterwards.
    pub fn update_settings(&mut self, update: SettingsUpdate) {
        self.settings.apply(update);
        if update.volume.is_some() {
            if let Some(context) = &self.context {
                let now = context.current_time();
                let master = context.master_gain();
                // Glide from wherever the previous glide got to.
                master.hold_at(now);
                master.set_target_at_time(self.settings.volume(), now, VOLUME_TIME_CONSTANT);
            }
        }
        info!(
            volume = self.settings.volume(),
            decay_ms = self.settings.decay().as_millis(),
            "Settings updated."
        );
    }

    /// Moves samples that have finished loading into the cache. Returns how many
    /// were added.
    pub fn collect_loaded(&mut self) -> usize {
        let mut added = 0;
        while let Ok((pitch, buffer)) = self.loaded_rx.try_recv() {
            if self.cache.insert(pitch, buffer) {
                added += 1;
            }
        }
        if added > 0 {
            debug!(
                added,
                cached = self.cache.len(),
                memory_kb = self.cache.memory_usage() / 1024,
                "Samples cached."
            );
        }
        added
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn is_initialized(&self) -> bool {
        self.context.is_some()
    }

    /// The open output, if initialized.
    pub fn context(&self) -> Option<&AudioContext> {
        self.context.as_ref()
    }

    pub fn active_voice_count(&self) -> usize {
        self.voices.len()
    }

    /// The voice sounding on a key, if any.
    pub fn voice(&self, key_index: u8) -> Option<&Voice> {
        self.voices.get(key_index)
    }

    /// The pitches currently cached, ascending.
    pub fn cached_pitches(&self) -> Vec<u8> {
        self.cache.pitches()
    }

    /// Flips to true once sample loading has completed.
    pub fn loading_finished(&self) -> watch::Receiver<bool> {
        self.loader.finished()
    }
}

impl Drop for PianoEngine {
    fn drop(&mut self) {
        self.stop_all();
    }
}
