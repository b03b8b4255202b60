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
//! The 88 keys of a standard piano, A0 to C8.

use std::fmt;

use thiserror::Error;

/// Number of keys on the keyboard.
pub const KEY_COUNT: u8 = 88;

/// MIDI pitch of the lowest key, A0.
pub const LOWEST_MIDI: u8 = 21;

/// MIDI pitch of the highest key, C8.
pub const HIGHEST_MIDI: u8 = LOWEST_MIDI + KEY_COUNT - 1;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("unable to parse note {0}")]
    Invalid(String),

    #[error("{0} is not on the keyboard")]
    OutOfRange(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyColor {
    White,
    Black,
}

/// A single key on the keyboard.
#[derive(Clone, Debug, PartialEq)]
pub struct Note {
    key_index: u8,
    midi: u8,
    frequency: f64,
    name: String,
    octave: u8,
    color: KeyColor,
}

impl Note {
    /// Stable position of the key, 0 (A0) to 87 (C8). Voices are keyed by this.
    pub fn key_index(&self) -> u8 {
        self.key_index
    }

    pub fn midi(&self) -> u8 {
        self.midi
    }

    /// Fundamental frequency in Hz.
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Name with octave, e.g. C#4.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn octave(&self) -> u8 {
        self.octave
    }

    pub fn color(&self) -> KeyColor {
        self.color
    }

    /// Label printed on C keys.
    pub fn label(&self) -> Option<&str> {
        (self.name.starts_with('C') && !self.name.starts_with("C#")).then_some(self.name.as_str())
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (key {}, MIDI {})", self.name, self.key_index, self.midi)
    }
}

/// Frequency in Hz of a MIDI pitch, tuned to A4 = 440 Hz.
pub fn midi_to_frequency(midi: u8) -> f64 {
    440.0 * 2f64.powf((midi as f64 - 69.0) / 12.0)
}

/// Returns the key at the given index, if it's on the keyboard.
pub fn note_for_key(key_index: u8) -> Option<Note> {
    if key_index >= KEY_COUNT {
        return None;
    }
    let midi = key_index + LOWEST_MIDI;
    let pitch_class = NOTE_NAMES[(midi % 12) as usize];
    let octave = midi / 12 - 1;
    Some(Note {
        key_index,
        midi,
        frequency: midi_to_frequency(midi),
        name: format!("{}{}", pitch_class, octave),
        octave,
        color: if pitch_class.ends_with('#') {
            KeyColor::Black
        } else {
            KeyColor::White
        },
    })
}

/// Returns the key playing the given MIDI pitch.
pub fn note_for_midi(midi: u8) -> Option<Note> {
    midi.checked_sub(LOWEST_MIDI).and_then(note_for_key)
}

/// Returns every key from A0 to C8.
pub fn generate_keys() -> Vec<Note> {
    (0..KEY_COUNT).filter_map(note_for_key).collect()
}

/// Parses a note name such as C4, c#4 or Db4, or a numeric key index.
pub fn parse_note(value: &str) -> Result<Note, KeyError> {
    let value = value.trim();
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        return value
            .parse::<u8>()
            .ok()
            .and_then(note_for_key)
            .ok_or_else(|| KeyError::OutOfRange(value.to_string()));
    }

    let invalid = || KeyError::Invalid(value.to_string());
    let mut chars = value.chars();
    let letter = chars.next().ok_or_else(invalid)?;
    let semitone: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(invalid()),
    };

    let rest = chars.as_str();
    let (accidental, octave) = match rest.chars().next() {
        Some('#') => (1, &rest[1..]),
        Some('b') => (-1, &rest[1..]),
        _ => (0, rest),
    };
    let octave: i32 = octave.parse().map_err(|_| invalid())?;

    octave
        .checked_add(1)
        .and_then(|o| o.checked_mul(12))
        .and_then(|base| base.checked_add(semitone + accidental))
        .and_then(|midi| u8::try_from(midi).ok())
        .and_then(note_for_midi)
        .ok_or_else(|| KeyError::OutOfRange(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_keys() {
        let keys = generate_keys();
        assert_eq!(keys.len(), 88);

        let first = &keys[0];
        assert_eq!(first.name(), "A0");
        assert_eq!(first.midi(), 21);
        assert!((first.frequency() - 27.5).abs() < 1e-9);

        let last = &keys[87];
        assert_eq!(last.name(), "C8");
        assert_eq!(last.midi(), 108);
        assert_eq!(last.octave(), 8);
        assert_eq!(last.color(), KeyColor::White);

        for (index, key) in keys.iter().enumerate() {
            assert_eq!(key.key_index() as usize, index);
            assert_eq!(key.midi() as usize, index + 21);
        }
        assert_eq!(
            keys.iter().filter(|k| k.color() == KeyColor::Black).count(),
            36
        );
    }

    #[test]
    fn test_middle_c() {
        let note = note_for_key(39).unwrap();
        assert_eq!(note.name(), "C4");
        assert_eq!(note.midi(), 60);
        assert_eq!(note.label(), Some("C4"));
        assert!((note.frequency() - 261.6256).abs() < 1e-3);
    }

    #[test]
    fn test_a4_is_440() {
        let note = note_for_key(48).unwrap();
        assert_eq!(note.name(), "A4");
        assert_eq!(note.frequency(), 440.0);
        assert_eq!(note.label(), None);
    }

    #[test]
    fn test_out_of_range_key() {
        assert!(note_for_key(88).is_none());
        assert!(note_for_midi(20).is_none());
        assert!(note_for_midi(109).is_none());
    }

    #[test]
    fn test_parse_note() {
        assert_eq!(parse_note("C4").unwrap().key_index(), 39);
        assert_eq!(parse_note("c#4").unwrap().name(), "C#4");
        assert_eq!(parse_note("Db4").unwrap().name(), "C#4");
        assert_eq!(parse_note("A0").unwrap().key_index(), 0);
        assert_eq!(parse_note("C8").unwrap().key_index(), 87);
        assert_eq!(parse_note(" 48 ").unwrap().name(), "A4");
    }

    #[test]
    fn test_parse_note_errors() {
        assert_eq!(parse_note("H4"), Err(KeyError::Invalid("H4".to_string())));
        assert_eq!(parse_note("C"), Err(KeyError::Invalid("C".to_string())));
        assert_eq!(parse_note("G#0"), Err(KeyError::OutOfRange("G#0".to_string())));
        assert_eq!(parse_note("C9"), Err(KeyError::OutOfRange("C9".to_string())));
        assert_eq!(parse_note("88"), Err(KeyError::OutOfRange("88".to_string())));
        assert!(parse_note("").is_err());
        assert_eq!(
            parse_note("C2147483647"),
            Err(KeyError::OutOfRange("C2147483647".to_string()))
        );
        assert_eq!(
            parse_note("C300000000"),
            Err(KeyError::OutOfRange("C300000000".to_string()))
        );
        assert_eq!(
            parse_note("Cb-2147483648"),
            Err(KeyError::OutOfRange("Cb-2147483648".to_string()))
        );
    }
}
