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
use std::fmt;
use std::sync::Arc;

use tracing::{error, info};

use super::mixer::{ActiveSource, AudioMixer, SourceSender};
use super::param::AudioParam;
use super::source::{Source, SourceHandle};
use super::{AudioError, ContextState, Device, Stream};

/// An open audio output: the mixer, its master gain and the device stream
/// pulling frames from it.
pub struct AudioContext {
    mixer: Arc<AudioMixer>,
    source_tx: SourceSender,
    stream: Box<dyn Stream>,
    device_name: String,
}

impl AudioContext {
    /// Opens an output on the device with the master gain set to `volume`.
    pub fn open(device: &dyn Device, volume: f32) -> Result<Self, AudioError> {
        let (mixer, source_tx) =
            AudioMixer::new(device.channels(), device.sample_rate(), AudioParam::new(volume));
        let mixer = Arc::new(mixer);
        let stream = device.open(mixer.clone())?;

        info!(
            device = device.to_string(),
            sample_rate = mixer.sample_rate(),
            channels = mixer.num_channels(),
            volume,
            "Audio context opened."
        );

        Ok(Self {
            mixer,
            source_tx,
            stream,
            device_name: device.to_string(),
        })
    }

    /// Current output-clock time in seconds. All scheduling is relative to this.
    pub fn current_time(&self) -> f64 {
        self.mixer.current_time()
    }

    pub fn state(&self) -> ContextState {
        self.stream.state()
    }

    /// Resumes a suspended output. Resuming a running output does nothing.
    pub fn resume(&self) -> Result<(), AudioError> {
        if self.stream.state() == ContextState::Suspended {
            self.stream.resume()?;
            info!(device = self.device_name, "Audio context resumed.");
        }
        Ok(())
    }

    pub fn suspend(&self) -> Result<(), AudioError> {
        self.stream.suspend()
    }

    /// The gain every source is routed through on its way to the output.
    pub fn master_gain(&self) -> &AudioParam {
        self.mixer.master_gain()
    }

    pub fn sample_rate(&self) -> u32 {
        self.mixer.sample_rate()
    }

    /// Routes `source` through `gain` into the master gain, starting at `at`.
    pub fn start(&self, source: Source, gain: AudioParam, at: f64) -> SourceHandle {
        let handle = SourceHandle::new();
        let active_source = ActiveSource {
            source,
            gain,
            start_at: at,
            handle: handle.clone(),
        };
        if let Err(e) = self.source_tx.send(active_source) {
            error!(error = %e, "Failed to send source to mixer");
            handle.mark_finished();
        }
        handle
    }

    /// Returns the number of sources still held by the renderer.
    pub fn active_source_count(&self) -> usize {
        self.mixer.active_source_count()
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        self.mixer.clear();
    }
}

impl fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioContext")
            .field("device", &self.device_name)
            .field("state", &self.state())
            .field("current_time", &self.current_time())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock;
    use crate::audio::source::Waveform;

    #[test]
    fn test_open_and_render() {
        let device = mock::Device::get("mock-device");
        let context = AudioContext::open(&device, 0.5).unwrap();
        assert_eq!(context.current_time(), 0.0);
        assert_eq!(context.state(), ContextState::Running);
        assert_eq!(context.master_gain().value_at(0.0), 0.5);

        let handle = context.start(
            Source::oscillator(Waveform::Triangle, 220.0),
            AudioParam::new(1.0),
            0.0,
        );
        device.render_seconds(0.5);
        assert_eq!(context.current_time(), 0.5);
        assert_eq!(context.active_source_count(), 1);

        handle.stop(context.current_time());
        device.render_seconds(0.1);
        assert!(handle.is_finished());
        assert_eq!(context.active_source_count(), 0);
    }

    #[test]
    fn test_resume_suspended() {
        let device = mock::Device::get("mock-device");
        let context = AudioContext::open(&device, 1.0).unwrap();

        device.simulate_suspend();
        assert_eq!(context.state(), ContextState::Suspended);
        // A suspended output doesn't advance the clock.
        device.render_seconds(1.0);
        assert_eq!(context.current_time(), 0.0);

        context.resume().unwrap();
        assert_eq!(context.state(), ContextState::Running);
        device.render_seconds(1.0);
        assert_eq!(context.current_time(), 1.0);
    }
}
