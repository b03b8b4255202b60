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

/// A captured piano sample: the pitch it was recorded at and the file holding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Display name, e.g. D#1.
    pub name: &'static str,
    /// File name relative to the sample location. Sharps are spelled with an s.
    pub file: &'static str,
    /// MIDI pitch number.
    pub midi: u8,
}

impl CatalogEntry {
    const fn new(name: &'static str, file: &'static str, midi: u8) -> Self {
        Self { name, file, midi }
    }
}

/// The Salamander Grand Piano samples, every minor third from A0 to C8.
pub static SALAMANDER: [CatalogEntry; 30] = [
    CatalogEntry::new("A0", "A0.mp3", 21),
    CatalogEntry::new("C1", "C1.mp3", 24),
    CatalogEntry::new("D#1", "Ds1.mp3", 27),
    CatalogEntry::new("F#1", "Fs1.mp3", 30),
    CatalogEntry::new("A1", "A1.mp3", 33),
    CatalogEntry::new("C2", "C2.mp3", 36),
    CatalogEntry::new("D#2", "Ds2.mp3", 39),
    CatalogEntry::new("F#2", "Fs2.mp3", 42),
    CatalogEntry::new("A2", "A2.mp3", 45),
    CatalogEntry::new("C3", "C3.mp3", 48),
    CatalogEntry::new("D#3", "Ds3.mp3", 51),
    CatalogEntry::new("F#3", "Fs3.mp3", 54),
    CatalogEntry::new("A3", "A3.mp3", 57),
    CatalogEntry::new("C4", "C4.mp3", 60),
    CatalogEntry::new("D#4", "Ds4.mp3", 63),
    CatalogEntry::new("F#4", "Fs4.mp3", 66),
    CatalogEntry::new("A4", "A4.mp3", 69),
    CatalogEntry::new("C5", "C5.mp3", 72),
    CatalogEntry::new("D#5", "Ds5.mp3", 75),
    CatalogEntry::new("F#5", "Fs5.mp3", 78),
    CatalogEntry::new("A5", "A5.mp3", 81),
    CatalogEntry::new("C6", "C6.mp3", 84),
    CatalogEntry::new("D#6", "Ds6.mp3", 87),
    CatalogEntry::new("F#6", "Fs6.mp3", 90),
    CatalogEntry::new("A6", "A6.mp3", 93),
    CatalogEntry::new("C7", "C7.mp3", 96),
    CatalogEntry::new("D#7", "Ds7.mp3", 99),
    CatalogEntry::new("F#7", "Fs7.mp3", 102),
    CatalogEntry::new("A7", "A7.mp3", 105),
    CatalogEntry::new("C8", "C8.mp3", 108),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_ascending_and_in_range() {
        assert_eq!(SALAMANDER.first().unwrap().midi, 21);
        assert_eq!(SALAMANDER.last().unwrap().midi, 108);
        for pair in SALAMANDER.windows(2) {
            assert!(pair[0].midi < pair[1].midi);
        }
    }

    #[test]
    fn test_sharp_file_names() {
        let entry = SALAMANDER.iter().find(|e| e.name == "D#4").unwrap();
        assert_eq!(entry.file, "Ds4.mp3");
        assert_eq!(entry.midi, 63);

        let entry = SALAMANDER.iter().find(|e| e.name == "F#1").unwrap();
        assert_eq!(entry.file, "Fs1.mp3");
        assert_eq!(entry.midi, 30);
    }
}
