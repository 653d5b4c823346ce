use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    Major,
    Minor,
}

impl std::fmt::Display for KeyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMode::Major => write!(f, "major"),
            KeyMode::Minor => write!(f, "minor"),
        }
    }
}

const NOTE_NAMES_SHARP: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const NOTE_NAMES_FLAT: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Pitch classes conventionally spelled with flats.
pub const FLAT_ROOTS: [u8; 6] = [1, 3, 5, 6, 8, 10]; // Db, Eb, F, Gb, Ab, Bb

/// Spell a pitch class, using flats for the conventional flat roots.
pub fn pitch_class_name(pitch_class: u8) -> &'static str {
    let pc = pitch_class % 12;
    if FLAT_ROOTS.contains(&pc) {
        NOTE_NAMES_FLAT[pc as usize]
    } else {
        NOTE_NAMES_SHARP[pc as usize]
    }
}

/// An estimated key. Recomputed per generation, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    /// Pitch class 0–11 (C=0, C#=1, ...)
    pub tonic: u8,
    pub mode: KeyMode,
}

impl Key {
    pub fn new(tonic: u8, mode: KeyMode) -> Self {
        Self {
            tonic: tonic % 12,
            mode,
        }
    }

    /// Tonic spelled for display: "C", "Db", "F#", ...
    pub fn tonic_name(&self) -> &'static str {
        pitch_class_name(self.tonic)
    }

    /// "C major", "Eb minor", ...
    pub fn name(&self) -> String {
        format!("{} {}", self.tonic_name(), self.mode)
    }
}

impl Default for Key {
    fn default() -> Self {
        Self {
            tonic: 0,
            mode: KeyMode::Major,
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.tonic_name(), self.mode)
    }
}
