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
// Core audio mixing logic that can be used by both CPAL and test implementations
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::param::AudioParam;
use super::source::{Source, SourceHandle};

/// Channel for handing new sources to the renderer without lock contention.
pub type SourceSender = crossbeam_channel::Sender<ActiveSource>;
pub type SourceReceiver = crossbeam_channel::Receiver<ActiveSource>;

/// Represents an active audio source in the mixer
pub struct ActiveSource {
    /// The sound-producing source.
    pub source: Source,
    /// The per-voice gain envelope.
    pub gain: AudioParam,
    /// Output-clock time at which the source starts.
    pub start_at: f64,
    /// Shared with the control side for stop scheduling.
    pub handle: SourceHandle,
}

/// Core audio mixing logic that's independent of any audio backend
pub struct AudioMixer {
    /// Active audio sources currently playing
    active_sources: Mutex<Vec<ActiveSource>>,
    /// Receives new sources from the control side.
    source_rx: SourceReceiver,
    /// Gain applied to the sum of all sources.
    master_gain: AudioParam,
    /// Frames rendered so far; this is the output clock.
    frames_rendered: AtomicU64,
    /// Number of output channels
    num_channels: u16,
    /// Sample rate
    sample_rate: u32,
}

impl AudioMixer {
    /// Creates a new audio mixer and the sender used to feed it sources.
    pub fn new(num_channels: u16, sample_rate: u32, master_gain: AudioParam) -> (Self, SourceSender) {
        let (source_tx, source_rx) = crossbeam_channel::unbounded();
        (
            Self {
                active_sources: Mutex::new(Vec::new()),
                source_rx,
                master_gain,
                frames_rendered: AtomicU64::new(0),
                num_channels: num_channels.max(1),
                sample_rate: sample_rate.max(1),
            },
            source_tx,
        )
    }

    /// Current output-clock time in seconds.
    pub fn current_time(&self) -> f64 {
        self.frames_rendered.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    /// Mixes `num_frames` interleaved frames into `output`, overwriting it.
    pub fn process_into_output(&self, output: &mut [f32], num_frames: usize) {
        let channels = self.num_channels as usize;
        let num_frames = num_frames.min(output.len() / channels);
        output.fill(0.0);

        let mut sources = self.active_sources.lock();
        while let Ok(new_source) = self.source_rx.try_recv() {
            sources.push(new_source);
        }

        let first_frame = self.frames_rendered.load(Ordering::Acquire);
        let sample_rate = self.sample_rate as f64;
        let master = self.master_gain.lock();

        sources.retain_mut(|active_source| {
            let stop_at = active_source.handle.stop_time().unwrap_or(f64::INFINITY);
            let gain = active_source.gain.lock();

            for (index, frame) in output.chunks_mut(channels).take(num_frames).enumerate() {
                let time = (first_frame + index as u64) as f64 / sample_rate;
                if time < active_source.start_at {
                    continue;
                }
                if time >= stop_at {
                    active_source.handle.mark_finished();
                    return false;
                }
                let level = gain.value_at(time) * master.value_at(time);
                if !active_source.source.mix_frame(frame, level, self.sample_rate) {
                    active_source.handle.mark_finished();
                    return false;
                }
            }
            true
        });

        self.frames_rendered
            .fetch_add(num_frames as u64, Ordering::AcqRel);
    }

    /// Processes multiple frames of audio mixing into a new buffer.
    pub fn process_frames(&self, num_frames: usize) -> Vec<f32> {
        let mut frames = vec![0.0f32; num_frames * self.num_channels as usize];
        self.process_into_output(&mut frames, num_frames);
        frames
    }

    /// Returns the number of sources the renderer is still holding.
    pub fn active_source_count(&self) -> usize {
        let mut sources = self.active_sources.lock();
        while let Ok(new_source) = self.source_rx.try_recv() {
            sources.push(new_source);
        }
        sources.len()
    }

    /// Drops every source, marking each as finished.
    pub fn clear(&self) {
        let mut sources = self.active_sources.lock();
        while let Ok(new_source) = self.source_rx.try_recv() {
            sources.push(new_source);
        }
        for source in sources.drain(..) {
            source.handle.mark_finished();
        }
    }

    /// Returns the master gain parameter.
    pub fn master_gain(&self) -> &AudioParam {
        &self.master_gain
    }

    /// Gets the number of output channels
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::AudioBuffer;
    use crate::audio::source::Waveform;

    fn active(source: Source, gain: f32, start_at: f64) -> (ActiveSource, SourceHandle) {
        let handle = SourceHandle::new();
        (
            ActiveSource {
                source,
                gain: AudioParam::new(gain),
                start_at,
                handle: handle.clone(),
            },
            handle,
        )
    }

    #[test]
    fn test_basic_mixing() {
        let (mixer, tx) = AudioMixer::new(2, 4, AudioParam::new(1.0));
        let buffer = AudioBuffer::from_interleaved(vec![0.5, 0.8], 1, 4);
        let (source, handle) = active(Source::buffer(buffer, 1.0), 1.0, 0.0);
        tx.send(source).unwrap();

        let frames = mixer.process_frames(3);
        assert_eq!(frames, vec![0.5, 0.5, 0.8, 0.8, 0.0, 0.0]);
        assert!(handle.is_finished());
        assert_eq!(mixer.active_source_count(), 0);
        assert_eq!(mixer.current_time(), 0.75);
    }

    #[test]
    fn test_multiple_source_mixing_with_master() {
        let (mixer, tx) = AudioMixer::new(1, 4, AudioParam::new(0.5));
        let first = AudioBuffer::from_interleaved(vec![0.5, 0.5], 1, 4);
        let second = AudioBuffer::from_interleaved(vec![0.25, 0.25], 1, 4);
        tx.send(active(Source::buffer(first, 1.0), 1.0, 0.0).0).unwrap();
        tx.send(active(Source::buffer(second, 1.0), 1.0, 0.0).0).unwrap();

        let frames = mixer.process_frames(1);
        assert_eq!(frames, vec![0.375]);
    }

    #[test]
    fn test_scheduled_start_and_stop() {
        let (mixer, tx) = AudioMixer::new(1, 4, AudioParam::new(1.0));
        let (source, handle) = active(Source::oscillator(Waveform::Square, 1.0), 1.0, 0.5);
        handle.stop(1.0);
        tx.send(source).unwrap();

        let frames = mixer.process_frames(6);
        // Silent before 0.5s, square wave until 1.0s, then dropped.
        assert_eq!(frames, vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
        assert!(handle.is_finished());
    }

    #[test]
    fn test_voice_gain_envelope_applied() {
        let (mixer, tx) = AudioMixer::new(1, 4, AudioParam::new(1.0));
        let buffer = AudioBuffer::from_interleaved(vec![1.0; 8], 1, 4);
        let (source, _handle) = active(Source::buffer(buffer, 1.0), 0.0, 0.0);
        source.gain.set_value_at_time(0.0, 0.0);
        source.gain.linear_ramp_to_value_at_time(1.0, 1.0);
        tx.send(source).unwrap();

        let frames = mixer.process_frames(5);
        assert_eq!(frames, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_clear() {
        let (mixer, tx) = AudioMixer::new(2, 44100, AudioParam::new(1.0));
        let (source, handle) = active(Source::oscillator(Waveform::Sine, 440.0), 1.0, 0.0);
        tx.send(source).unwrap();
        assert_eq!(mixer.active_source_count(), 1);
        mixer.clear();
        assert_eq!(mixer.active_source_count(), 0);
        assert!(handle.is_finished());
    }
}
