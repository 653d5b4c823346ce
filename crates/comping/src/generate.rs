use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chords::{build_chords, Chord};
use crate::config::GenerationConfig;
use crate::continuity::{min_hold_ticks, walk_chords};
use crate::key::estimate_key;
use crate::note::TimedNote;
use crate::types::{Key, KeyMode};

/// Result of one generation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accompaniment {
    pub key: Key,
    /// One chord per melody note, in melody order.
    pub chords: Vec<Chord>,
    /// Rendered notes, grouped by the melody note that produced them.
    pub notes: Vec<TimedNote>,
}

/// Display data for a finished generation. Formatting is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub tonic_name: String,
    pub mode: KeyMode,
    pub melody_notes: usize,
    pub accompaniment_notes: usize,
    pub chord_changes: usize,
    /// Chord symbols in order, consecutive repeats collapsed.
    pub progression: Vec<String>,
}

impl Accompaniment {
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Number of times the chosen chord differs from the one before it.
    pub fn chord_changes(&self) -> usize {
        self.chords.windows(2).filter(|w| w[0] != w[1]).count()
    }

    pub fn summary(&self) -> Summary {
        let mut progression: Vec<String> = Vec::new();
        let mut last: Option<&Chord> = None;
        for chord in &self.chords {
            if last != Some(chord) {
                progression.push(chord.symbol());
                last = Some(chord);
            }
        }

        Summary {
            tonic_name: self.key.tonic_name().to_string(),
            mode: self.key.mode,
            melody_notes: self.chords.len(),
            accompaniment_notes: self.notes.len(),
            chord_changes: self.chord_changes(),
            progression,
        }
    }
}

/// Generate an accompaniment for a monophonic melody.
///
/// `melody` is expected in canonical order (see [`crate::NoteSequence`]).
/// The pass is pure: identical inputs always produce identical output, and
/// an empty melody yields C major with no chords or notes.
pub fn generate_accompaniment(melody: &[TimedNote], config: &GenerationConfig) -> Accompaniment {
    let key = estimate_key(melody);
    let table = build_chords(key);
    let hold = min_hold_ticks(config.min_hold_beats(), config.ticks_per_beat());
    let chords = walk_chords(melody, &table, hold);

    let style = config.style();
    let notes: Vec<TimedNote> = melody
        .iter()
        .zip(&chords)
        .flat_map(|(note, chord)| style.render(note, chord, config))
        .collect();

    info!(
        key = %key,
        style = %style,
        melody_notes = melody.len(),
        accompaniment_notes = notes.len(),
        "generated accompaniment"
    );

    Accompaniment { key, chords, notes }
}
