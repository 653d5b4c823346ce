//! Conversion of already-parsed input into a canonical [`NoteSequence`].
//!
//! Two sources are supported: Standard MIDI Files (via `midly`) and
//! fixed-step sequencer grids.

use midly::{MidiMessage, Smf, Timing, TrackEventKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DEFAULT_TICKS_PER_BEAT;
use crate::note::{NoteSequence, TimedNote};
use crate::{Error, Result};

/// Velocity given to grid notes, which carry no dynamics of their own.
pub const GRID_VELOCITY: f64 = 100.0 / 127.0;

/// Parse MIDI bytes and extract the melody line.
pub fn melody_from_bytes(bytes: &[u8]) -> Result<NoteSequence> {
    let smf = Smf::parse(bytes).map_err(|e| Error::MidiParse(e.to_string()))?;
    Ok(melody_from_smf(&smf))
}

/// Tick resolution of a parsed file; timecode files fall back to 480.
pub fn ticks_per_beat(smf: &Smf) -> u16 {
    match smf.header.timing {
        Timing::Metrical(ticks) => ticks.as_int(),
        Timing::Timecode(_, _) => DEFAULT_TICKS_PER_BEAT,
    }
}

/// Extract a monophonic melody from every track of a parsed file.
///
/// Tracks are merged by absolute tick, events at the same tick keeping track
/// order. Only one note sounds at a time: a new note-on ends the current note
/// at that tick, and a note-off is honored only for the pitch currently
/// sounding. A note never released before the end is dropped.
pub fn melody_from_smf(smf: &Smf) -> NoteSequence {
    let mut events: Vec<(u64, MidiMessage)> = Vec::new();
    for track in &smf.tracks {
        let mut tick: u64 = 0;
        for event in track {
            tick += event.delta.as_int() as u64;
            if let TrackEventKind::Midi { message, .. } = event.kind {
                events.push((tick, message));
            }
        }
    }
    // Stable, so equal ticks keep track-then-event order.
    events.sort_by_key(|(tick, _)| *tick);

    let mut notes = Vec::new();
    let mut current: Option<(u8, u64, u8)> = None; // (pitch, onset, velocity)

    for (tick, message) in events {
        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                if let Some((pitch, onset, velocity)) = current.take() {
                    push_note(&mut notes, pitch, onset, tick, velocity);
                }
                current = Some((key.as_int(), tick, vel.as_int()));
            }
            MidiMessage::NoteOff { key, .. } | MidiMessage::NoteOn { key, .. } => {
                if let Some((pitch, onset, velocity)) = current {
                    if pitch == key.as_int() {
                        push_note(&mut notes, pitch, onset, tick, velocity);
                        current = None;
                    }
                }
            }
            _ => {}
        }
    }

    if let Some((pitch, onset, _)) = current {
        debug!(pitch, onset, "dropping note left open at end of file");
    }

    NoteSequence::new(notes, ticks_per_beat(smf))
}

fn push_note(notes: &mut Vec<TimedNote>, pitch: u8, onset: u64, offset: u64, velocity: u8) {
    notes.push(TimedNote::new(
        pitch,
        onset,
        offset.saturating_sub(onset),
        velocity as f64 / 127.0,
    ));
}

/// A fixed-step melody grid: `bars * steps_per_bar` cells, each empty or
/// holding one MIDI pitch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepGrid {
    pub bars: u32,
    pub steps_per_bar: u32,
    #[serde(default = "default_beats_per_bar")]
    pub beats_per_bar: u32,
    pub cells: Vec<Option<u8>>,
}

fn default_beats_per_bar() -> u32 {
    4
}

impl StepGrid {
    /// An empty grid of the given shape.
    pub fn new(bars: u32, steps_per_bar: u32) -> Result<Self> {
        let grid = Self {
            bars,
            steps_per_bar,
            beats_per_bar: default_beats_per_bar(),
            cells: vec![None; (bars as usize) * (steps_per_bar as usize)],
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Build a grid from textual cells (see [`parse_pitch`]).
    ///
    /// Unrecognized cell text is an error rather than a silent rest.
    pub fn from_steps<S: AsRef<str>>(
        bars: u32,
        steps_per_bar: u32,
        beats_per_bar: u32,
        steps: &[S],
    ) -> Result<Self> {
        let cells = steps
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let text = text.as_ref();
                if is_rest(text) {
                    Ok(None)
                } else {
                    parse_pitch(text)
                        .map(Some)
                        .ok_or_else(|| Error::InvalidGrid(format!("step {}: unrecognized pitch '{}'", i, text)))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let grid = Self {
            bars,
            steps_per_bar,
            beats_per_bar,
            cells,
        };
        grid.validate()?;
        Ok(grid)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bars == 0 {
            return Err(Error::InvalidGrid("bars must be at least 1".into()));
        }
        if self.steps_per_bar == 0 {
            return Err(Error::InvalidGrid("steps_per_bar must be at least 1".into()));
        }
        if self.beats_per_bar == 0 {
            return Err(Error::InvalidGrid("beats_per_bar must be at least 1".into()));
        }
        Ok(())
    }

    pub fn step_count(&self) -> usize {
        self.bars as usize * self.steps_per_bar as usize
    }

    /// Length of one step in ticks, never below one.
    pub fn step_ticks(&self, ticks_per_beat: u16) -> u64 {
        let bar_ticks = ticks_per_beat as u64 * self.beats_per_bar as u64;
        (bar_ticks / self.steps_per_bar.max(1) as u64).max(1)
    }

    /// Set one cell, ignoring indices outside the grid.
    pub fn set(&mut self, step: usize, pitch: Option<u8>) {
        if step >= self.step_count() {
            return;
        }
        if self.cells.len() < self.step_count() {
            self.cells.resize(self.step_count(), None);
        }
        self.cells[step] = pitch;
    }

    /// Read the grid into a melody, one step-length note per filled cell.
    ///
    /// Cells past the grid's shape are ignored and pitches above 127 are
    /// skipped.
    pub fn to_sequence(&self, ticks_per_beat: u16) -> NoteSequence {
        let ticks_per_beat = ticks_per_beat.max(1);
        let step = self.step_ticks(ticks_per_beat);

        if self.cells.len() > self.step_count() {
            warn!(
                cells = self.cells.len(),
                steps = self.step_count(),
                "grid has more cells than steps, ignoring the excess"
            );
        }

        let notes = self
            .cells
            .iter()
            .take(self.step_count())
            .enumerate()
            .filter_map(|(i, cell)| {
                let pitch = (*cell)?;
                if pitch > 127 {
                    warn!(step = i, pitch, "skipping grid cell outside MIDI range");
                    return None;
                }
                Some(TimedNote::new(pitch, i as u64 * step, step, GRID_VELOCITY))
            })
            .collect();

        NoteSequence::new(notes, ticks_per_beat)
    }
}

fn is_rest(text: &str) -> bool {
    matches!(text.trim(), "" | "-" | ".")
}

/// Parse a pitch written as a MIDI number ("60") or a note name ("C4",
/// "F#3", "Bb2"), with C4 = 60. Rest markers and garbage yield `None`.
pub fn parse_pitch(text: &str) -> Option<u8> {
    let text = text.trim();
    if is_rest(text) {
        return None;
    }

    if let Ok(n) = text.parse::<u8>() {
        return (n <= 127).then_some(n);
    }

    let mut chars = text.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let natural: i32 = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let (accidental, octave_text) = match rest.chars().next() {
        Some('#') | Some('♯') => (1, &rest[rest.chars().next()?.len_utf8()..]),
        Some('b') | Some('♭') => (-1, &rest[rest.chars().next()?.len_utf8()..]),
        _ => (0, rest),
    };

    let octave: i32 = octave_text.parse().ok()?;
    let midi = (octave + 1) * 12 + natural + accidental;
    (0..=127).contains(&midi).then_some(midi as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u15, u28, u4, u7};
    use midly::{Format, Header, MetaMessage, Track, TrackEvent};
    use pretty_assertions::assert_eq;

    fn on(delta: u32, key: u8, vel: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(vel),
                },
            },
        }
    }

    fn off(delta: u32, key: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOff {
                    key: u7::new(key),
                    vel: u7::new(0),
                },
            },
        }
    }

    fn end() -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        }
    }

    fn smf(tracks: Vec<Track<'static>>) -> Smf<'static> {
        let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(u15::new(96))));
        smf.tracks = tracks;
        smf
    }

    fn summary(seq: &NoteSequence) -> Vec<(u8, u64, u64)> {
        seq.notes
            .iter()
            .map(|n| (n.pitch, n.start_tick, n.duration_ticks))
            .collect()
    }

    #[test]
    fn simple_melody_extracted() {
        let file = smf(vec![vec![
            on(0, 60, 100),
            off(96, 60),
            on(0, 62, 80),
            on(96, 62, 0), // velocity-zero note-on releases
            end(),
        ]]);
        let seq = melody_from_smf(&file);

        assert_eq!(seq.ticks_per_beat, 96);
        assert_eq!(summary(&seq), vec![(60, 0, 96), (62, 96, 96)]);
        assert!((seq.notes[0].velocity - 100.0 / 127.0).abs() < 1e-12);
    }

    #[test]
    fn overlapping_note_on_closes_previous() {
        let file = smf(vec![vec![
            on(0, 60, 90),
            on(48, 64, 90), // cuts C short
            off(48, 60),    // stale release, ignored
            off(48, 64),
            end(),
        ]]);
        let seq = melody_from_smf(&file);
        assert_eq!(summary(&seq), vec![(60, 0, 48), (64, 48, 96)]);
    }

    #[test]
    fn tracks_are_merged_by_tick() {
        let file = smf(vec![
            vec![on(0, 60, 90), off(96, 60), end()],
            vec![on(192, 67, 90), off(96, 67), end()],
        ]);
        let seq = melody_from_smf(&file);
        assert_eq!(summary(&seq), vec![(60, 0, 96), (67, 192, 96)]);
    }

    #[test]
    fn unreleased_note_dropped() {
        let file = smf(vec![vec![on(0, 60, 90), off(96, 60), on(0, 65, 90), end()]]);
        let seq = melody_from_smf(&file);
        assert_eq!(summary(&seq), vec![(60, 0, 96)]);
    }

    #[test]
    fn empty_file_gives_empty_sequence() {
        let seq = melody_from_smf(&smf(vec![vec![end()]]));
        assert!(seq.is_empty());
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let err = melody_from_bytes(b"not a midi file").unwrap_err();
        assert!(matches!(err, Error::MidiParse(_)));
    }

    #[test]
    fn grid_cells_become_step_notes() {
        let grid = StepGrid::from_steps(1, 8, 4, &["C4", "-", "E4", "", "G4", ".", "72", "-"]).unwrap();
        let seq = grid.to_sequence(480);

        assert_eq!(grid.step_ticks(480), 240);
        assert_eq!(
            summary(&seq),
            vec![(60, 0, 240), (64, 480, 240), (67, 960, 240), (72, 1440, 240)]
        );
        assert!(seq.notes.iter().all(|n| n.velocity == GRID_VELOCITY));
    }

    #[test]
    fn grid_ignores_cells_past_shape_and_bad_pitches() {
        let mut grid = StepGrid::new(1, 4).unwrap();
        grid.cells = vec![Some(60), Some(200), None, Some(62), Some(64)];
        let seq = grid.to_sequence(480);
        assert_eq!(summary(&seq), vec![(60, 0, 480), (62, 1440, 480)]);
    }

    #[test]
    fn grid_set_and_shape_errors() {
        let mut grid = StepGrid::new(2, 4).unwrap();
        grid.set(5, Some(67));
        grid.set(99, Some(60));
        assert_eq!(summary(&grid.to_sequence(96)), vec![(67, 480, 96)]);

        assert!(matches!(StepGrid::new(0, 4), Err(Error::InvalidGrid(_))));
        assert!(matches!(
            StepGrid::from_steps(1, 2, 4, &["C4", "H2"]),
            Err(Error::InvalidGrid(_))
        ));
    }

    #[test]
    fn pitch_names() {
        assert_eq!(parse_pitch("C4"), Some(60));
        assert_eq!(parse_pitch("c4"), Some(60));
        assert_eq!(parse_pitch("F#3"), Some(54));
        assert_eq!(parse_pitch("Bb2"), Some(46));
        assert_eq!(parse_pitch("A-1"), Some(9));
        assert_eq!(parse_pitch("Cb-1"), None);
        assert_eq!(parse_pitch("G9"), Some(127));
        assert_eq!(parse_pitch("G#9"), None);
        assert_eq!(parse_pitch("127"), Some(127));
        assert_eq!(parse_pitch("128"), None);
        assert_eq!(parse_pitch("-"), None);
        assert_eq!(parse_pitch("X4"), None);
    }
}
