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
use std::{fmt, sync::Arc, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;
use parking_lot::Mutex;
use tracing::{error, info, span, Level};

use super::thread_priority::{
    callback_thread_priority, configure_audio_thread_priority, rt_audio_enabled,
};
use super::{mixer::AudioMixer, AudioError, ContextState};
use crate::config;

/// Requests sent to the thread that owns the CPAL stream.
enum Control {
    Play,
    Pause,
}

/// A small wrapper around a cpal::Device. Used for storing the stream
/// configuration we'll open it with.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The stream configuration used when opening.
    stream_config: cpal::StreamConfig,
    /// The sample format the device expects.
    sample_format: cpal::SampleFormat,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn super::Device>>, AudioError> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn super::Device> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices that can produce output.
    fn list_cpal_devices() -> Result<Vec<Device>, AudioError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = match cpal::host_from_id(host_id) {
                Ok(host) => host,
                Err(e) => {
                    error!(err = e.to_string(), host = host_id.name(), "Host unavailable");
                    continue;
                }
            };
            let host_devices = match host.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                if let Some(device) = Device::from_cpal(host_id, device) {
                    devices.push(device);
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Wraps a cpal device using its default output configuration. Returns None
    /// for devices that can't describe one.
    fn from_cpal(host_id: cpal::HostId, device: cpal::Device) -> Option<Device> {
        let default_config = device.default_output_config().ok()?;
        let max_channels = device
            .supported_output_configs()
            .ok()?
            .map(|config| config.channels())
            .max()
            .unwrap_or(0);
        if max_channels == 0 {
            return None;
        }

        Some(Device {
            name: device.name().ok()?,
            max_channels,
            host_id,
            sample_format: default_config.sample_format(),
            stream_config: default_config.config(),
            device,
        })
    }

    /// Gets the configured device. The name "default" selects the host's default output.
    pub fn get(config: &config::Audio) -> Result<Device, AudioError> {
        let name = config.device();
        let mut device = if name == "default" {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or(AudioError::NoDefaultDevice)?;
            Device::from_cpal(host.id(), device).ok_or(AudioError::NoDefaultDevice)?
        } else {
            Device::list_cpal_devices()?
                .into_iter()
                .find(|device| device.name.trim() == name)
                .ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))?
        };

        if let Some(sample_rate) = config.sample_rate() {
            device.stream_config.sample_rate = cpal::SampleRate(sample_rate);
        }
        if let Some(channels) = config.channels() {
            device.stream_config.channels = channels.min(device.max_channels);
        }
        if let Some(buffer_size) = config.buffer_size() {
            device.stream_config.buffer_size = cpal::BufferSize::Fixed(buffer_size);
        }

        info!(
            device = device.name,
            sample_rate = device.stream_config.sample_rate.0,
            channels = device.stream_config.channels,
            format = format!("{:?}", device.sample_format),
            "Using audio device."
        );
        Ok(device)
    }
}

impl super::Device for Device {
    fn sample_rate(&self) -> u32 {
        self.stream_config.sample_rate.0
    }

    fn channels(&self) -> u16 {
        self.stream_config.channels
    }

    fn open(&self, mixer: Arc<AudioMixer>) -> Result<Box<dyn super::Stream>, AudioError> {
        let (control_tx, control_rx) = crossbeam_channel::unbounded::<Control>();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), AudioError>>(1);
        let device = self.device.clone();
        let stream_config = self.stream_config.clone();
        let sample_format = self.sample_format;
        let name = self.name.clone();
        let state = Arc::new(Mutex::new(ContextState::Running));
        let stream_state = state.clone();

        // cpal streams aren't Send on every platform, so the stream lives on its own thread.
        let output_thread = thread::spawn(move || {
            let span = span!(Level::INFO, "output stream (cpal)");
            let _enter = span.enter();

            let stream = match build_stream(
                &device,
                &stream_config,
                sample_format,
                mixer,
                stream_state.clone(),
            ) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(e.into()));
                return;
            }
            let _ = ready_tx.send(Ok(()));
            info!(device = name, "CPAL output stream started successfully");

            // Keep the stream alive until the control channel closes.
            for control in control_rx.iter() {
                let result = match control {
                    Control::Play => stream.play().map_err(AudioError::from),
                    Control::Pause => stream.pause().map_err(AudioError::from),
                };
                if let Err(e) = result {
                    error!(err = %e, "Failed to change output stream state");
                    *stream_state.lock() = ContextState::Suspended;
                }
            }
            info!(device = name, "CPAL output stream closed");
        });

        ready_rx
            .recv()
            .map_err(|e| AudioError::StreamThread(e.to_string()))??;

        Ok(Box::new(Stream {
            control_tx: Some(control_tx),
            state,
            output_thread: Some(output_thread),
        }))
    }
}

/// Builds the output stream for the device's sample format.
fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mixer: Arc<AudioMixer>,
    state: Arc<Mutex<ContextState>>,
) -> Result<cpal::Stream, AudioError> {
    match sample_format {
        cpal::SampleFormat::F32 => {
            let channels = config.channels.max(1) as usize;
            let priority = callback_thread_priority();
            let rt_audio = rt_audio_enabled();
            let mut priority_set = false;
            Ok(device.build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    configure_audio_thread_priority(priority, rt_audio, &mut priority_set);
                    mixer.process_into_output(data, data.len() / channels);
                },
                error_callback(state),
                None,
            )?)
        }
        cpal::SampleFormat::I16 => build_converted_stream::<i16>(device, config, mixer, state),
        cpal::SampleFormat::I32 => build_converted_stream::<i32>(device, config, mixer, state),
        other => Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
    }
}

/// Integer output: mix into a reused f32 scratch buffer and convert.
fn build_converted_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Arc<AudioMixer>,
    state: Arc<Mutex<ContextState>>,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels.max(1) as usize;
    let priority = callback_thread_priority();
    let rt_audio = rt_audio_enabled();
    let mut priority_set = false;
    let mut scratch: Vec<f32> = Vec::new();
    Ok(device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            configure_audio_thread_priority(priority, rt_audio, &mut priority_set);
            scratch.resize(data.len(), 0.0);
            mixer.process_into_output(&mut scratch, data.len() / channels);
            for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                *dst = T::from_sample(src);
            }
        },
        error_callback(state),
        None,
    )?)
}

/// Logs stream errors and marks the stream suspended when the backend stops
/// pulling audio, so the next resume restarts it.
fn error_callback(
    state: Arc<Mutex<ContextState>>,
) -> impl FnMut(cpal::StreamError) + Send + 'static {
    move |err| {
        error!("CPAL output stream error: {}", err);
        if let Some(new_state) = state_after_error(&err) {
            *state.lock() = new_state;
        }
    }
}

fn state_after_error(err: &cpal::StreamError) -> Option<ContextState> {
    match err {
        cpal::StreamError::DeviceNotAvailable => Some(ContextState::Suspended),
        _ => None,
    }
}

/// Handle to the stream thread.
struct Stream {
    control_tx: Option<crossbeam_channel::Sender<Control>>,
    state: Arc<Mutex<ContextState>>,
    output_thread: Option<thread::JoinHandle<()>>,
}

impl Stream {
    fn send(&self, control: Control) -> Result<(), AudioError> {
        match &self.control_tx {
            Some(tx) => tx
                .send(control)
                .map_err(|e| AudioError::StreamThread(e.to_string())),
            None => Err(AudioError::StreamThread("stream closed".to_string())),
        }
    }
}

impl super::Stream for Stream {
    fn state(&self) -> ContextState {
        *self.state.lock()
    }

    fn resume(&self) -> Result<(), AudioError> {
        self.send(Control::Play)?;
        *self.state.lock() = ContextState::Running;
        Ok(())
    }

    fn suspend(&self) -> Result<(), AudioError> {
        self.send(Control::Pause)?;
        *self.state.lock() = ContextState::Suspended;
        Ok(())
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        // Closing the channel ends the stream thread.
        self.control_tx.take();
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lost_device_suspends_stream() {
        let state = Arc::new(Mutex::new(ContextState::Running));
        let mut callback = error_callback(state.clone());

        callback(cpal::StreamError::BackendSpecific {
            err: cpal::BackendSpecificError {
                description: "underrun".to_string(),
            },
        });
        assert_eq!(*state.lock(), ContextState::Running);

        callback(cpal::StreamError::DeviceNotAvailable);
        assert_eq!(*state.lock(), ContextState::Suspended);
    }
}
