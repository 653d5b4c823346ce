use tracing::debug;

use crate::chords::{Chord, ChordTable};
use crate::note::TimedNote;

/// Pick the chord for one melody pitch class.
///
/// A previous chord that already contains the pitch class is kept. Otherwise
/// the first chord of the table (in `[I, IV, V, vi]` order) containing it
/// wins, falling back to I when none does.
pub fn select_chord(choices: &ChordTable, previous: Option<&Chord>, melody_pitch_class: u8) -> Chord {
    if let Some(prev) = previous {
        if prev.contains(melody_pitch_class) {
            return *prev;
        }
    }

    choices
        .iter()
        .find(|chord| chord.contains(melody_pitch_class))
        .copied()
        .unwrap_or_else(|| choices.tonic())
}

/// Assign one chord to every melody note.
///
/// The choice is only reconsidered once at least `min_hold_ticks` have
/// elapsed since the last reconsideration (or before any chord is chosen);
/// in between the current chord is held regardless of the melody. Each
/// note's duration is accumulated after its choice step.
pub fn walk_chords(melody: &[TimedNote], choices: &ChordTable, min_hold_ticks: u64) -> Vec<Chord> {
    let mut chosen = Vec::with_capacity(melody.len());
    let mut current: Option<Chord> = None;
    let mut hold_ticks: u64 = 0;

    for note in melody {
        let chord = match current {
            Some(chord) if hold_ticks < min_hold_ticks => chord,
            previous => {
                hold_ticks = 0;
                let next = select_chord(choices, previous.as_ref(), note.pitch_class());
                if previous != Some(next) {
                    debug!(tick = note.start_tick, chord = %next.label, symbol = %next.symbol(), "chord change");
                }
                next
            }
        };

        current = Some(chord);
        hold_ticks = hold_ticks.saturating_add(note.duration_ticks);
        chosen.push(chord);
    }

    chosen
}

/// Minimum hold expressed in ticks, rounded to the nearest tick.
pub fn min_hold_ticks(min_hold_beats: f64, ticks_per_beat: u16) -> u64 {
    (min_hold_beats * ticks_per_beat as f64).round().max(0.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chords::{build_chords, ChordLabel};
    use crate::types::{Key, KeyMode};
    use pretty_assertions::assert_eq;

    fn c_major() -> ChordTable {
        build_chords(Key::new(0, KeyMode::Major))
    }

    fn note(pitch: u8, start: u64, duration: u64) -> TimedNote {
        TimedNote::new(pitch, start, duration, 0.8)
    }

    #[test]
    fn keeps_previous_when_it_contains_melody() {
        let table = c_major();
        let vi = table.get(ChordLabel::Vi);
        // E (4) is in I as well, but vi was already sounding.
        assert_eq!(select_chord(&table, Some(&vi), 4), vi);
    }

    #[test]
    fn first_matching_chord_in_table_order() {
        let table = c_major();
        // C (0) lives in I, IV and vi; I comes first.
        assert_eq!(select_chord(&table, None, 0).label, ChordLabel::I);
        // A (9) lives in IV and vi; IV comes first.
        assert_eq!(select_chord(&table, None, 9).label, ChordLabel::IV);
        // B (11) only in V.
        let prev = table.get(ChordLabel::IV);
        assert_eq!(select_chord(&table, Some(&prev), 11).label, ChordLabel::V);
    }

    #[test]
    fn chromatic_pitch_falls_back_to_tonic() {
        let table = c_major();
        let v = table.get(ChordLabel::V);
        // F# (6) is in none of the four triads.
        assert_eq!(select_chord(&table, Some(&v), 6), table.tonic());
        assert_eq!(select_chord(&table, None, 6), table.tonic());
    }

    #[test]
    fn held_chord_ignores_melody_until_hold_expires() {
        let table = c_major();
        // C, B, D at 120 ticks each with a 480-tick hold: the first note picks
        // I and the other two are held through, even though B is not in I.
        let melody = vec![note(60, 0, 120), note(71, 120, 120), note(62, 240, 120)];
        let chords = walk_chords(&melody, &table, 480);

        let labels: Vec<ChordLabel> = chords.iter().map(|c| c.label).collect();
        assert_eq!(labels, vec![ChordLabel::I, ChordLabel::I, ChordLabel::I]);
    }

    #[test]
    fn reconsiders_once_hold_is_reached() {
        let table = c_major();
        let melody = vec![
            note(60, 0, 480),   // picks I, hold -> 480
            note(65, 480, 240), // reconsider: F -> IV, hold -> 240
            note(71, 720, 240), // held (240 < 480), hold -> 480
            note(71, 960, 480), // reconsider: B -> V
        ];
        let chords = walk_chords(&melody, &table, 480);

        let labels: Vec<ChordLabel> = chords.iter().map(|c| c.label).collect();
        assert_eq!(
            labels,
            vec![ChordLabel::I, ChordLabel::IV, ChordLabel::IV, ChordLabel::V]
        );
    }

    #[test]
    fn reconsidering_keeps_chord_that_still_fits() {
        let table = c_major();
        // Every note is long enough to trigger a re-evaluation. A after IV
        // stays on IV through continuity instead of jumping to vi.
        let melody = vec![note(65, 0, 480), note(69, 480, 480), note(72, 960, 480)];
        let chords = walk_chords(&melody, &table, 480);

        let labels: Vec<ChordLabel> = chords.iter().map(|c| c.label).collect();
        assert_eq!(labels, vec![ChordLabel::IV, ChordLabel::IV, ChordLabel::IV]);
    }

    #[test]
    fn one_chord_per_note_and_empty_melody() {
        let table = c_major();
        assert!(walk_chords(&[], &table, 480).is_empty());

        let melody: Vec<TimedNote> = (0..7).map(|i| note(60 + i, i as u64 * 60, 60)).collect();
        assert_eq!(walk_chords(&melody, &table, 120).len(), 7);
    }

    #[test]
    fn hold_ticks_rounding() {
        assert_eq!(min_hold_ticks(1.0, 480), 480);
        assert_eq!(min_hold_ticks(0.25, 96), 24);
        assert_eq!(min_hold_ticks(0.25, 10), 3);
    }
}
