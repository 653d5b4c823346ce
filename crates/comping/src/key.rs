use tracing::debug;

use crate::note::TimedNote;
use crate::types::{Key, KeyMode};

/// Major scale intervals from the tonic.
const MAJOR_SCALE: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];

/// Natural minor scale intervals from the tonic.
const MINOR_SCALE: [u8; 7] = [0, 2, 3, 5, 7, 8, 10];

/// Subtracted from every minor score so ties resolve toward major.
const MINOR_PENALTY: f64 = 0.2;

/// Estimate the key of a melody by scale membership.
///
/// Every note's pitch class is checked against each of the 24 major/minor
/// scales; the score is the number of notes inside the scale. This is a plain
/// histogram match, not a key-profile correlation. Iteration runs tonic
/// ascending, major before minor, and only a strictly greater score replaces
/// the current best, so the result is fully deterministic.
///
/// An empty melody yields C major.
pub fn estimate_key(notes: &[TimedNote]) -> Key {
    if notes.is_empty() {
        return Key::default();
    }

    let pitch_classes: Vec<u8> = notes.iter().map(TimedNote::pitch_class).collect();

    let mut best = Key::default();
    let mut best_score = f64::NEG_INFINITY;

    for tonic in 0..12u8 {
        for (mode, scale) in [(KeyMode::Major, &MAJOR_SCALE), (KeyMode::Minor, &MINOR_SCALE)] {
            let mask = scale_mask(tonic, scale);
            let in_scale = pitch_classes
                .iter()
                .filter(|&&pc| mask & (1 << pc) != 0)
                .count();

            let mut score = in_scale as f64;
            if mode == KeyMode::Minor {
                score -= MINOR_PENALTY;
            }

            if score > best_score {
                best_score = score;
                best = Key::new(tonic, mode);
            }
        }
    }

    debug!(key = %best, score = best_score, notes = notes.len(), "estimated key");
    best
}

/// Bitmask over the 12 pitch classes of a scale transposed to `tonic`.
fn scale_mask(tonic: u8, scale: &[u8]) -> u16 {
    scale
        .iter()
        .fold(0u16, |mask, &interval| mask | (1 << ((tonic + interval) % 12)))
}
