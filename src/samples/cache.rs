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
use std::collections::BTreeMap;

use crate::audio::AudioBuffer;

/// The playback rate that shifts a sample by `distance` semitones.
pub fn playback_rate(distance: f64) -> f64 {
    2f64.powf(distance / 12.0)
}

/// The cached sample closest to a requested pitch.
#[derive(Clone, Debug)]
pub struct Resolved {
    /// The pitch the sample was captured at.
    pub pitch: u8,
    pub buffer: AudioBuffer,
    /// Requested pitch minus captured pitch, in semitones.
    pub distance: i32,
}

impl Resolved {
    pub fn playback_rate(&self) -> f64 {
        playback_rate(self.distance as f64)
    }
}

/// Decoded samples by MIDI pitch. Entries are only ever added.
#[derive(Default)]
pub struct SampleCache {
    buffers: BTreeMap<u8, AudioBuffer>,
}

impl SampleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sample. The first buffer stored for a pitch wins.
    pub fn insert(&mut self, pitch: u8, buffer: AudioBuffer) -> bool {
        if self.buffers.contains_key(&pitch) {
            return false;
        }
        self.buffers.insert(pitch, buffer);
        true
    }

    pub fn get(&self, pitch: u8) -> Option<&AudioBuffer> {
        self.buffers.get(&pitch)
    }

    /// Finds the sample nearest to `pitch`. Pitches are scanned in ascending
    /// order and only a strictly closer pitch replaces the best so far, so ties
    /// resolve to the lower pitch.
    pub fn nearest(&self, pitch: u8) -> Option<Resolved> {
        if let Some(buffer) = self.buffers.get(&pitch) {
            return Some(Resolved {
                pitch,
                buffer: buffer.clone(),
                distance: 0,
            });
        }

        let mut best: Option<(u8, &AudioBuffer, i32)> = None;
        for (&cached, buffer) in &self.buffers {
            let distance = pitch as i32 - cached as i32;
            match best {
                Some((_, _, best_distance)) if distance.abs() >= best_distance.abs() => {}
                _ => best = Some((cached, buffer, distance)),
            }
        }

        best.map(|(pitch, buffer, distance)| Resolved {
            pitch,
            buffer: buffer.clone(),
            distance,
        })
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// The cached pitches in ascending order.
    pub fn pitches(&self) -> Vec<u8> {
        self.buffers.keys().copied().collect()
    }

    /// Returns the memory held by all cached samples, in bytes.
    pub fn memory_usage(&self) -> usize {
        self.buffers.values().map(AudioBuffer::memory_size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> AudioBuffer {
        AudioBuffer::from_interleaved(vec![0.0; 100], 1, 44100)
    }

    fn cache_with(pitches: &[u8]) -> SampleCache {
        let mut cache = SampleCache::new();
        for &pitch in pitches {
            cache.insert(pitch, buffer());
        }
        cache
    }

    #[test]
    fn test_playback_rate() {
        assert_eq!(playback_rate(0.0), 1.0);
        assert!((playback_rate(12.0) - 2.0).abs() < 1e-12);
        assert!((playback_rate(-12.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_exact_match() {
        let cache = cache_with(&[48, 60, 72]);
        let resolved = cache.nearest(60).unwrap();
        assert_eq!(resolved.pitch, 60);
        assert_eq!(resolved.distance, 0);
        assert_eq!(resolved.playback_rate(), 1.0);
    }

    #[test]
    fn test_nearest_above() {
        let cache = cache_with(&[60]);
        let resolved = cache.nearest(64).unwrap();
        assert_eq!(resolved.pitch, 60);
        assert_eq!(resolved.distance, 4);
        assert!((resolved.playback_rate() - 1.259921).abs() < 1e-5);
    }

    #[test]
    fn test_nearest_below() {
        let cache = cache_with(&[60, 72]);
        let resolved = cache.nearest(70).unwrap();
        assert_eq!(resolved.pitch, 72);
        assert_eq!(resolved.distance, -2);
        assert!(resolved.playback_rate() < 1.0);
    }

    #[test]
    fn test_ties_go_to_lower_pitch() {
        let cache = cache_with(&[72, 60]);
        let resolved = cache.nearest(66).unwrap();
        assert_eq!(resolved.pitch, 60);
        assert_eq!(resolved.distance, 6);
    }

    #[test]
    fn test_empty_cache() {
        let cache = SampleCache::new();
        assert!(cache.is_empty());
        assert!(cache.nearest(60).is_none());
    }

    #[test]
    fn test_insert_keeps_first() {
        let mut cache = SampleCache::new();
        assert!(cache.insert(60, buffer()));
        assert!(!cache.insert(60, AudioBuffer::from_interleaved(vec![0.0; 10], 1, 44100)));
        assert_eq!(cache.get(60).unwrap().frames(), 100);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.memory_usage(), 400);
    }

    #[test]
    fn test_pitches_ascending() {
        let cache = cache_with(&[72, 21, 60]);
        assert_eq!(cache.pitches(), vec![21, 60, 72]);
    }
}
