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
use std::sync::Arc;
use std::time::Duration;

/// Decoded audio held in memory.
/// The sample data is stored in an Arc so voices can share it without copying.
#[derive(Clone, Debug)]
pub struct AudioBuffer {
    /// Interleaved f32 samples.
    data: Arc<Vec<f32>>,
    /// Number of channels in the buffer.
    channel_count: u16,
    /// Sample rate the audio was captured at.
    sample_rate: u32,
}

impl AudioBuffer {
    /// Creates a buffer from interleaved samples.
    pub fn from_interleaved(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> Self {
        Self {
            data: Arc::new(data),
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Returns the native sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of frames.
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    /// Reads one channel at a fractional frame position with linear interpolation.
    /// Positions past the end read as silence.
    pub fn read_interpolated(&self, position: f64, channel: u16) -> f32 {
        let frames = self.frames();
        if position < 0.0 || frames == 0 {
            return 0.0;
        }
        let channels = self.channel_count as usize;
        let channel = (channel as usize).min(channels - 1);
        let index = position as usize;
        if index >= frames {
            return 0.0;
        }

        let s0 = self.data[index * channels + channel];
        let s1 = if index + 1 < frames {
            self.data[(index + 1) * channels + channel]
        } else {
            s0
        };
        let frac = (position - index as f64) as f32;
        s0 + (s1 - s0) * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_and_duration() {
        let buffer = AudioBuffer::from_interleaved(vec![0.0; 44100 * 2], 2, 44100);
        assert_eq!(buffer.frames(), 44100);
        assert_eq!(buffer.duration(), Duration::from_secs(1));
        assert_eq!(buffer.memory_size(), 44100 * 2 * 4);
    }

    #[test]
    fn test_read_interpolated() {
        let buffer = AudioBuffer::from_interleaved(vec![0.0, 1.0, 1.0, -1.0], 2, 48000);

        assert_eq!(buffer.read_interpolated(0.0, 0), 0.0);
        assert_eq!(buffer.read_interpolated(0.0, 1), 1.0);
        assert_eq!(buffer.read_interpolated(0.5, 0), 0.5);
        assert_eq!(buffer.read_interpolated(0.5, 1), 0.0);
        // Last frame holds, past the end is silence.
        assert_eq!(buffer.read_interpolated(1.5, 0), 1.0);
        assert_eq!(buffer.read_interpolated(2.0, 0), 0.0);
        // Out of range channels read the last channel.
        assert_eq!(buffer.read_interpolated(1.0, 5), -1.0);
    }
}
