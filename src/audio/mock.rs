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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tracing::info;

use super::{mixer::AudioMixer, AudioError, ContextState};

const MOCK_SAMPLE_RATE: u32 = 44100;
const MOCK_CHANNELS: u16 = 2;

/// A mock device. Doesn't actually play anything; its clock only moves when
/// frames are rendered explicitly.
#[derive(Clone)]
pub struct Device {
    name: String,
    /// The mixer of the most recently opened stream.
    mixer: Arc<Mutex<Option<Arc<AudioMixer>>>>,
    suspended: Arc<AtomicBool>,
    opens: Arc<AtomicUsize>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            mixer: Arc::new(Mutex::new(None)),
            suspended: Arc::new(AtomicBool::new(false)),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Pulls the given number of frames through the open stream, as a sound card
    /// would. Does nothing while suspended.
    pub fn render_frames(&self, frames: usize) -> Vec<f32> {
        if self.suspended.load(Ordering::Relaxed) {
            return Vec::new();
        }
        match self.mixer.lock().as_ref() {
            Some(mixer) => mixer.process_frames(frames),
            None => Vec::new(),
        }
    }

    /// Renders the given number of seconds.
    pub fn render_seconds(&self, seconds: f64) -> Vec<f32> {
        self.render_frames((seconds * MOCK_SAMPLE_RATE as f64).round() as usize)
    }

    /// Suspends output the way a platform does when the application loses focus.
    pub fn simulate_suspend(&self) {
        self.suspended.store(true, Ordering::Relaxed);
    }

    /// Returns how many times a stream has been opened on this device.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::Relaxed)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Channels={}) (Mock)", self.name, MOCK_CHANNELS)
    }
}

impl super::Device for Device {
    fn sample_rate(&self) -> u32 {
        MOCK_SAMPLE_RATE
    }

    fn channels(&self) -> u16 {
        MOCK_CHANNELS
    }

    fn open(&self, mixer: Arc<AudioMixer>) -> Result<Box<dyn super::Stream>, AudioError> {
        info!(device = self.name, "Opening mock stream.");
        self.opens.fetch_add(1, Ordering::Relaxed);
        *self.mixer.lock() = Some(mixer);
        self.suspended.store(false, Ordering::Relaxed);
        Ok(Box::new(Stream {
            suspended: self.suspended.clone(),
        }))
    }
}

/// The stream half of the mock device.
struct Stream {
    suspended: Arc<AtomicBool>,
}

impl super::Stream for Stream {
    fn state(&self) -> ContextState {
        if self.suspended.load(Ordering::Relaxed) {
            ContextState::Suspended
        } else {
            ContextState::Running
        }
    }

    fn resume(&self) -> Result<(), AudioError> {
        self.suspended.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn suspend(&self) -> Result<(), AudioError> {
        self.suspended.store(true, Ordering::Relaxed);
        Ok(())
    }
}
