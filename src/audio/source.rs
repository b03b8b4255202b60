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

//! Sound-producing sources and the handle used to stop them.

use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::buffer::AudioBuffer;

/// Global atomic counter for generating unique source IDs.
static SOURCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Returns the next unique source ID.
pub fn next_source_id() -> u64 {
    SOURCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Periodic waveforms for the oscillator source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

impl Waveform {
    /// Evaluates the waveform at a phase in [0, 1).
    fn sample(&self, phase: f64) -> f32 {
        let value = match self {
            Waveform::Sine => (2.0 * PI * phase).sin(),
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
        };
        value as f32
    }
}

/// A source that renders into output frames.
#[derive(Debug)]
pub enum Source {
    /// Plays a decoded buffer at a playback rate.
    Buffer {
        buffer: AudioBuffer,
        playback_rate: f64,
        /// Read position in buffer frames.
        position: f64,
    },
    /// Generates a periodic waveform.
    Oscillator {
        waveform: Waveform,
        frequency: f64,
        /// Phase in [0, 1).
        phase: f64,
    },
}

impl Source {
    /// Creates a buffer player. A rate of 1.0 plays at the recorded pitch.
    pub fn buffer(buffer: AudioBuffer, playback_rate: f64) -> Self {
        Source::Buffer {
            buffer,
            playback_rate,
            position: 0.0,
        }
    }

    /// Creates an oscillator at the given frequency in Hz.
    pub fn oscillator(waveform: Waveform, frequency: f64) -> Self {
        Source::Oscillator {
            waveform,
            frequency,
            phase: 0.0,
        }
    }

    /// Adds one frame of this source, scaled by `gain`, into `frame`.
    /// Returns false once the source has nothing left to play.
    pub fn mix_frame(&mut self, frame: &mut [f32], gain: f32, output_rate: u32) -> bool {
        match self {
            Source::Buffer {
                buffer,
                playback_rate,
                position,
            } => {
                if *position >= buffer.frames() as f64 {
                    return false;
                }
                let channels = buffer.channel_count();
                for (index, out) in frame.iter_mut().enumerate() {
                    // Mono fans out to every output, otherwise channels map one to one.
                    let channel = if channels == 1 { 0 } else { index as u16 };
                    if channel < channels {
                        *out += buffer.read_interpolated(*position, channel) * gain;
                    }
                }
                *position +=
                    *playback_rate * buffer.sample_rate() as f64 / output_rate.max(1) as f64;
                true
            }
            Source::Oscillator {
                waveform,
                frequency,
                phase,
            } => {
                let value = waveform.sample(*phase) * gain;
                for out in frame.iter_mut() {
                    *out += value;
                }
                *phase = (*phase + *frequency / output_rate.max(1) as f64).fract();
                true
            }
        }
    }
}

/// Marks "no stop scheduled".
const NO_STOP: u64 = u64::MAX;

/// The control-side handle to a started source. Both buffer players and
/// oscillators stop through the same contract.
#[derive(Clone, Debug)]
pub struct SourceHandle {
    id: u64,
    /// Scheduled stop time as f64 bits, or NO_STOP.
    stop_at: Arc<AtomicU64>,
    /// Set by the mixer once the source has been dropped.
    finished: Arc<AtomicBool>,
}

impl SourceHandle {
    pub(crate) fn new() -> Self {
        Self {
            id: next_source_id(),
            stop_at: Arc::new(AtomicU64::new(NO_STOP)),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the source ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Schedules the source to stop at the given output-clock time.
    pub fn stop(&self, at: f64) {
        self.stop_at.store(at.to_bits(), Ordering::Release);
    }

    /// Returns the scheduled stop time, if any.
    pub fn stop_time(&self) -> Option<f64> {
        match self.stop_at.load(Ordering::Acquire) {
            NO_STOP => None,
            bits => Some(f64::from_bits(bits)),
        }
    }

    /// Returns true once the mixer has dropped the source.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub(crate) fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_shape() {
        assert_eq!(Waveform::Triangle.sample(0.0), -1.0);
        assert_eq!(Waveform::Triangle.sample(0.25), 0.0);
        assert_eq!(Waveform::Triangle.sample(0.5), 1.0);
        assert_eq!(Waveform::Triangle.sample(0.75), 0.0);
    }

    #[test]
    fn test_buffer_playback_rate() {
        let buffer = AudioBuffer::from_interleaved(vec![0.0, 0.25, 0.5, 0.75, 1.0], 1, 100);
        let mut source = Source::buffer(buffer, 2.0);
        let mut frame = [0.0f32; 2];

        assert!(source.mix_frame(&mut frame, 1.0, 100));
        assert_eq!(frame, [0.0, 0.0]);

        frame = [0.0; 2];
        assert!(source.mix_frame(&mut frame, 1.0, 100));
        assert_eq!(frame, [0.5, 0.5]);

        frame = [0.0; 2];
        assert!(source.mix_frame(&mut frame, 0.5, 100));
        assert_eq!(frame, [0.5, 0.5]);

        // Read position is past the end now.
        assert!(!source.mix_frame(&mut frame, 1.0, 100));
    }

    #[test]
    fn test_buffer_sample_rate_compensation() {
        // A 200Hz buffer played on a 100Hz output advances two frames per output frame.
        let buffer = AudioBuffer::from_interleaved(vec![0.0, 0.1, 0.2, 0.3], 1, 200);
        let mut source = Source::buffer(buffer, 1.0);
        let mut frame = [0.0f32; 1];
        source.mix_frame(&mut frame, 1.0, 100);
        frame = [0.0; 1];
        source.mix_frame(&mut frame, 1.0, 100);
        assert!((frame[0] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_oscillator_never_finishes() {
        let mut source = Source::oscillator(Waveform::Triangle, 440.0);
        let mut frame = [0.0f32; 2];
        for _ in 0..1000 {
            assert!(source.mix_frame(&mut frame, 0.0, 44100));
        }
        assert_eq!(frame, [0.0, 0.0]);
    }

    #[test]
    fn test_handle_stop_time() {
        let handle = SourceHandle::new();
        assert_eq!(handle.stop_time(), None);
        handle.stop(1.25);
        assert_eq!(handle.stop_time(), Some(1.25));
        assert!(!handle.is_finished());
        handle.mark_finished();
        assert!(handle.is_finished());
    }
}
