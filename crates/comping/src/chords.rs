use serde::{Deserialize, Serialize};

use crate::types::{pitch_class_name, Key};

/// Roman-numeral function of a diatonic triad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChordLabel {
    I,
    IV,
    V,
    #[serde(rename = "vi")]
    Vi,
}

impl ChordLabel {
    /// Fixed table order.
    pub const ALL: [ChordLabel; 4] = [ChordLabel::I, ChordLabel::IV, ChordLabel::V, ChordLabel::Vi];

    /// Semitone offsets from the tonic, root first.
    ///
    /// These are major-key offsets and are used unchanged for minor keys.
    pub const fn offsets(self) -> [u8; 3] {
        match self {
            ChordLabel::I => [0, 4, 7],
            ChordLabel::IV => [5, 9, 0],
            ChordLabel::V => [7, 11, 2],
            ChordLabel::Vi => [9, 0, 4],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChordLabel::I => "I",
            ChordLabel::IV => "IV",
            ChordLabel::V => "V",
            ChordLabel::Vi => "vi",
        }
    }
}

impl std::fmt::Display for ChordLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A diatonic triad realized in a concrete key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chord {
    pub label: ChordLabel,
    /// Root, third, fifth as pitch classes 0–11.
    pub pitch_classes: [u8; 3],
}

impl Chord {
    pub fn new(label: ChordLabel, key: Key) -> Self {
        let offsets = label.offsets();
        Self {
            label,
            pitch_classes: offsets.map(|offset| (key.tonic + offset) % 12),
        }
    }

    pub fn contains(&self, pitch_class: u8) -> bool {
        self.pitch_classes.contains(&(pitch_class % 12))
    }

    pub fn root(&self) -> u8 {
        self.pitch_classes[0]
    }

    /// Chord symbol built from the spelled root, e.g. "F" for IV in C.
    ///
    /// The quality suffix follows the offsets, so vi reads as minor.
    pub fn symbol(&self) -> String {
        let suffix = match self.label {
            ChordLabel::Vi => "m",
            _ => "",
        };
        format!("{}{}", pitch_class_name(self.root()), suffix)
    }
}

/// The four diatonic triads of one key, always in `[I, IV, V, vi]` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordTable {
    pub key: Key,
    chords: [Chord; 4],
}

impl ChordTable {
    pub fn chords(&self) -> &[Chord; 4] {
        &self.chords
    }

    /// The I chord, used as the unconditional fallback.
    pub fn tonic(&self) -> Chord {
        self.chords[0]
    }

    pub fn get(&self, label: ChordLabel) -> Chord {
        self.chords[label as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chord> {
        self.chords.iter()
    }
}

/// Derive the I, IV, V and vi triads for `key`.
pub fn build_chords(key: Key) -> ChordTable {
    ChordTable {
        key,
        chords: ChordLabel::ALL.map(|label| Chord::new(label, key)),
    }
}
