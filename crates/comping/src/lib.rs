//! Accompaniment generation for monophonic melodies.
//!
//! The pipeline runs leaf-first:
//!
//! 1. [`normalize`] turns parsed MIDI or a step grid into a [`NoteSequence`]
//! 2. [`key::estimate_key`] picks the best-fitting major/minor key
//! 3. [`chords::build_chords`] derives the I, IV, V and vi triads
//! 4. [`continuity::walk_chords`] assigns one chord per melody note
//! 5. [`style::AccompanimentStyle::render`] expands each pairing into notes
//!
//! [`generate::generate_accompaniment`] wires the steps together.
//! [`midi_writer`] embeds the result into a Standard MIDI File.
//!
//! # Example
//!
//! ```
//! use comping::{generate_accompaniment, GenerationSettings, NoteSequence, TimedNote};
//!
//! let melody = NoteSequence::new(
//!     vec![
//!         TimedNote::new(60, 0, 480, 0.8),
//!         TimedNote::new(64, 480, 480, 0.8),
//!         TimedNote::new(67, 960, 480, 0.8),
//!     ],
//!     480,
//! );
//! let config = GenerationSettings::default().into_config(melody.ticks_per_beat);
//! let result = generate_accompaniment(&melody.notes, &config);
//! assert_eq!(result.key.name(), "C major");
//! assert_eq!(result.notes.len(), 9);
//! ```

pub mod chords;
pub mod config;
pub mod continuity;
pub mod generate;
pub mod key;
pub mod midi_writer;
pub mod normalize;
pub mod note;
pub mod style;
pub mod types;

pub use chords::{build_chords, Chord, ChordLabel, ChordTable};
pub use config::{GenerationConfig, GenerationSettings, StyleKind};
pub use continuity::{select_chord, walk_chords};
pub use generate::{generate_accompaniment, Accompaniment, Summary};
pub use key::estimate_key;
pub use midi_writer::{append_accompaniment, sequence_to_midi, ExportOptions};
pub use normalize::{melody_from_bytes, melody_from_smf, parse_pitch, StepGrid};
pub use note::{AccompanimentNote, NoteSequence, TimedNote};
pub use style::{AccompanimentStyle, ArpDirection, BassPattern};
pub use types::{Key, KeyMode};

/// Errors raised at the parsing and export boundaries.
///
/// Generation itself never fails: degenerate input resolves to a
/// defined, deterministic output.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI parse error: {0}")]
    MidiParse(String),

    #[error("invalid step grid: {0}")]
    InvalidGrid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
