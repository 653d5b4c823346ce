//! Per-style expansion of a (melody note, chord) pairing into accompaniment notes.
//!
//! Every renderer keeps its output inside the melody note's span: each emitted
//! note starts at or after the melody onset and strictly before its end.

use serde::{Deserialize, Serialize};

use crate::chords::Chord;
use crate::config::GenerationConfig;
use crate::note::TimedNote;

/// Lowest pitch block and arpeggio voices are lifted to.
pub const CHORD_FLOOR: i32 = 36;

/// Lowest pitch the bass voice is lifted to, one octave under the chord floor.
pub const BASS_FLOOR: i32 = 24;

/// How far below the melody the accompaniment should sit, in semitones.
const MELODY_CLEARANCE: i32 = 6;

/// Rhythm of the bass voice within one melody note.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BassPattern {
    #[default]
    Quarter,
    Eighth,
    Syncopated,
}

impl BassPattern {
    /// Onsets within the melody note, in beats.
    pub fn offsets(self) -> &'static [f64] {
        match self {
            BassPattern::Quarter => &[0.0],
            BassPattern::Eighth => &[0.0, 0.5],
            BassPattern::Syncopated => &[0.0, 0.75],
        }
    }
}

impl std::str::FromStr for BassPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quarter" => Ok(BassPattern::Quarter),
            "eighth" => Ok(BassPattern::Eighth),
            "syncopated" => Ok(BassPattern::Syncopated),
            other => Err(format!(
                "unknown bass pattern '{}' (expected quarter, eighth or syncopated)",
                other
            )),
        }
    }
}

/// Traversal order of an arpeggiated chord.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArpDirection {
    #[default]
    Up,
    Down,
    UpDown,
}

impl ArpDirection {
    /// Order `pitch_classes` for one pass of the arpeggio.
    ///
    /// Consecutive repeats are collapsed first, so a chord whose degrees
    /// coincide never sounds the same pitch class twice in a row. Up-down
    /// climbs through the chord and descends through its middle without
    /// repeating either endpoint: `[p0, p1, p2]` becomes `[p0, p1, p2, p1]`.
    pub fn traversal(self, pitch_classes: &[u8]) -> Vec<u8> {
        let mut up: Vec<u8> = pitch_classes.to_vec();
        up.dedup();

        match self {
            ArpDirection::Up => up,
            ArpDirection::Down => {
                up.reverse();
                up
            }
            ArpDirection::UpDown => {
                let middle: Vec<u8> = if up.len() > 2 {
                    up[1..up.len() - 1].iter().rev().copied().collect()
                } else {
                    Vec::new()
                };
                up.extend(middle);
                up
            }
        }
    }
}

impl std::str::FromStr for ArpDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(ArpDirection::Up),
            "down" => Ok(ArpDirection::Down),
            "up-down" | "updown" | "up_down" => Ok(ArpDirection::UpDown),
            other => Err(format!(
                "unknown arp direction '{}' (expected up, down or up-down)",
                other
            )),
        }
    }
}

/// The closed set of accompaniment renderers, each carrying its own parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccompanimentStyle {
    /// Whole chord, sustained for the melody note.
    #[default]
    Block,
    /// Chord root on a rhythm pattern.
    Bass(BassPattern),
    /// Chord tones spread evenly across the melody note.
    Arp(ArpDirection),
}

impl AccompanimentStyle {
    /// Expand one melody note and its chord into accompaniment notes.
    pub fn render(&self, melody: &TimedNote, chord: &Chord, config: &GenerationConfig) -> Vec<TimedNote> {
        if melody.duration_ticks == 0 {
            return Vec::new();
        }

        match *self {
            AccompanimentStyle::Block => render_block(melody, chord, config),
            AccompanimentStyle::Bass(pattern) => render_bass(pattern, melody, chord, config),
            AccompanimentStyle::Arp(direction) => render_arp(direction, melody, chord, config),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AccompanimentStyle::Block => "block",
            AccompanimentStyle::Bass(_) => "bass",
            AccompanimentStyle::Arp(_) => "arp",
        }
    }
}

impl std::fmt::Display for AccompanimentStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccompanimentStyle::Block => write!(f, "block"),
            AccompanimentStyle::Bass(pattern) => write!(f, "bass ({:?})", pattern),
            AccompanimentStyle::Arp(direction) => write!(f, "arp ({:?})", direction),
        }
    }
}

/// Place a candidate pitch under the melody.
///
/// One bounded pass: drop an octave if the candidate is within a tritone of
/// (or above) the melody, then lift an octave if that fell under `floor`.
/// Edge cases can still land slightly outside the ideal register.
pub fn place_pitch(candidate: i32, melody_pitch: u8, floor: i32) -> u8 {
    let mut note = candidate;
    if note >= melody_pitch as i32 - MELODY_CLEARANCE {
        note -= 12;
    }
    if note < floor {
        note += 12;
    }
    note.clamp(0, 127) as u8
}

fn chord_pitch(pitch_class: u8, melody: &TimedNote, config: &GenerationConfig) -> u8 {
    let base = config.target_octave() as i32 * 12;
    place_pitch(base + pitch_class as i32, melody.pitch, CHORD_FLOOR)
}

fn render_block(melody: &TimedNote, chord: &Chord, config: &GenerationConfig) -> Vec<TimedNote> {
    let velocity = config.normalized_velocity();
    chord
        .pitch_classes
        .iter()
        .map(|&pc| {
            TimedNote::new(
                chord_pitch(pc, melody, config),
                melody.start_tick,
                melody.duration_ticks,
                velocity,
            )
        })
        .collect()
}

fn render_bass(
    pattern: BassPattern,
    melody: &TimedNote,
    chord: &Chord,
    config: &GenerationConfig,
) -> Vec<TimedNote> {
    let ticks_per_beat = config.ticks_per_beat() as u64;
    let base = config.target_octave() as i32 * 12;
    let pitch = place_pitch(base + chord.root() as i32 - 12, melody.pitch, BASS_FLOOR);
    let velocity = config.normalized_velocity();

    pattern
        .offsets()
        .iter()
        .map(|beats| (beats * ticks_per_beat as f64).round() as u64)
        .filter(|&offset| offset < melody.duration_ticks)
        .map(|offset| {
            let remaining = melody.duration_ticks - offset;
            TimedNote::new(
                pitch,
                melody.start_tick + offset,
                remaining.min(ticks_per_beat),
                velocity,
            )
        })
        .collect()
}

fn render_arp(
    direction: ArpDirection,
    melody: &TimedNote,
    chord: &Chord,
    config: &GenerationConfig,
) -> Vec<TimedNote> {
    let sequence = direction.traversal(&chord.pitch_classes);
    if sequence.is_empty() {
        return Vec::new();
    }

    let slices = sequence.len() as u64;
    let slice_ticks = (melody.duration_ticks / slices).max(1);
    let velocity = config.normalized_velocity();

    (0..slices)
        .map(|i| i * slice_ticks)
        .take_while(|&offset| offset < melody.duration_ticks)
        .enumerate()
        .map(|(i, offset)| {
            let pc = sequence[i % sequence.len()];
            TimedNote::new(
                chord_pitch(pc, melody, config),
                melody.start_tick + offset,
                slice_ticks,
                velocity,
            )
        })
        .collect()
}
