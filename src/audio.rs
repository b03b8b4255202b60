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
use std::{fmt, sync::Arc};

use crate::config;

pub mod buffer;
pub mod context;
pub mod cpal;
pub mod decode;
pub mod mixer;
pub mod mock;
pub mod param;
pub mod source;
mod thread_priority;

pub use buffer::AudioBuffer;
pub use context::AudioContext;
pub use mixer::AudioMixer;
pub use param::AudioParam;
pub use source::{Source, SourceHandle, Waveform};

/// Whether an output is currently pulling audio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextState {
    Running,
    Suspended,
}

/// Errors raised while opening or driving audio output.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no device found with name {0}")]
    DeviceNotFound(String),

    #[error("no default output device available")]
    NoDefaultDevice,

    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("exponential ramps need a positive target, got {0}")]
    InvalidRampTarget(f32),

    #[error("output stream thread failed: {0}")]
    StreamThread(String),

    #[error("unable to list devices: {0}")]
    Devices(#[from] ::cpal::DevicesError),

    #[error("unable to read device configuration: {0}")]
    DefaultConfig(#[from] ::cpal::DefaultStreamConfigError),

    #[error("unable to build output stream: {0}")]
    BuildStream(#[from] ::cpal::BuildStreamError),

    #[error("unable to start output stream: {0}")]
    PlayStream(#[from] ::cpal::PlayStreamError),

    #[error("unable to pause output stream: {0}")]
    PauseStream(#[from] ::cpal::PauseStreamError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An output device that can open streams pulling from a mixer.
pub trait Device: fmt::Display + Send + Sync {
    /// The output sample rate streams on this device run at.
    fn sample_rate(&self) -> u32;

    /// The number of output channels.
    fn channels(&self) -> u16;

    /// Opens a stream that renders the given mixer.
    fn open(&self, mixer: Arc<AudioMixer>) -> Result<Box<dyn Stream>, AudioError>;
}

/// An open output stream.
pub trait Stream: Send {
    fn state(&self) -> ContextState;

    fn resume(&self) -> Result<(), AudioError>;

    fn suspend(&self) -> Result<(), AudioError>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, AudioError> {
    cpal::Device::list()
}

/// Gets a device from the given configuration. Device names beginning with
/// "mock" produce a mock device.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, AudioError> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device)));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}
