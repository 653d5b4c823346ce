//! Step grid files.
//!
//! ```toml
//! bars = 1
//! steps_per_bar = 8
//! ticks_per_beat = 480   # optional, default 480
//! beats_per_bar = 4      # optional, default 4
//! steps = ["C4", "-", "E4", "-", "G4", 67, ".", "C5"]
//! ```
//!
//! A step is a note name, a MIDI number, or a rest marker (`-`, `.` or `""`).

use std::path::Path;

use anyhow::{Context, Result};
use comping::config::DEFAULT_TICKS_PER_BEAT;
use comping::{NoteSequence, StepGrid};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StepCell {
    Number(i64),
    Text(String),
}

impl StepCell {
    fn into_text(self) -> String {
        match self {
            StepCell::Number(n) => n.to_string(),
            StepCell::Text(s) => s,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GridFile {
    bars: u32,
    steps_per_bar: u32,
    #[serde(default = "default_beats_per_bar")]
    beats_per_bar: u32,
    #[serde(default = "default_ticks_per_beat")]
    ticks_per_beat: u16,
    steps: Vec<StepCell>,
}

fn default_beats_per_bar() -> u32 {
    4
}

fn default_ticks_per_beat() -> u16 {
    DEFAULT_TICKS_PER_BEAT
}

/// Parse grid TOML into a melody.
pub fn parse_grid(contents: &str) -> Result<NoteSequence> {
    let file: GridFile = toml::from_str(contents).context("invalid grid file")?;
    let steps: Vec<String> = file.steps.into_iter().map(StepCell::into_text).collect();
    let grid = StepGrid::from_steps(file.bars, file.steps_per_bar, file.beats_per_bar, &steps)?;
    Ok(grid.to_sequence(file.ticks_per_beat.max(1)))
}

pub fn load_grid(path: &Path) -> Result<NoteSequence> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read grid file {}", path.display()))?;
    parse_grid(&contents).with_context(|| format!("failed to load grid {}", path.display()))
}
