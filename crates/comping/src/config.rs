use serde::{Deserialize, Serialize};

use crate::style::{AccompanimentStyle, ArpDirection, BassPattern};

pub const TARGET_OCTAVE_RANGE: (i64, i64) = (2, 5);
pub const VELOCITY_RANGE: (i64, i64) = (20, 120);
pub const MIN_HOLD_BEATS_RANGE: (f64, f64) = (0.25, 4.0);

pub const DEFAULT_TARGET_OCTAVE: u8 = 3;
pub const DEFAULT_VELOCITY: u8 = 60;
pub const DEFAULT_MIN_HOLD_BEATS: f64 = 1.0;
pub const DEFAULT_TICKS_PER_BEAT: u16 = 480;

/// Which renderer to use, without its parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleKind {
    #[default]
    Block,
    Bass,
    Arp,
}

impl std::str::FromStr for StyleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "block" => Ok(StyleKind::Block),
            "bass" => Ok(StyleKind::Bass),
            "arp" | "arpeggio" => Ok(StyleKind::Arp),
            other => Err(format!("unknown style '{}' (expected block, bass or arp)", other)),
        }
    }
}

/// Unvalidated generation parameters, as read from flags or config files.
///
/// Numeric fields are wide so that any user-supplied value can be
/// represented; [`GenerationSettings::into_config`] clamps them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub target_octave: i64,
    pub velocity: i64,
    pub min_hold_beats: f64,
    pub style: StyleKind,
    pub bass_pattern: BassPattern,
    pub arp_direction: ArpDirection,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            target_octave: DEFAULT_TARGET_OCTAVE as i64,
            velocity: DEFAULT_VELOCITY as i64,
            min_hold_beats: DEFAULT_MIN_HOLD_BEATS,
            style: StyleKind::Block,
            bass_pattern: BassPattern::default(),
            arp_direction: ArpDirection::default(),
        }
    }
}

impl GenerationSettings {
    /// Clamp every value into range and bind the tick resolution.
    ///
    /// Out-of-range values are never rejected; they snap to the nearest
    /// bound, infinities included. A NaN hold length has no nearest bound
    /// and falls back to the default.
    pub fn into_config(self, ticks_per_beat: u16) -> GenerationConfig {
        let min_hold_beats = if self.min_hold_beats.is_nan() {
            DEFAULT_MIN_HOLD_BEATS
        } else {
            self.min_hold_beats
                .clamp(MIN_HOLD_BEATS_RANGE.0, MIN_HOLD_BEATS_RANGE.1)
        };

        let style = match self.style {
            StyleKind::Block => AccompanimentStyle::Block,
            StyleKind::Bass => AccompanimentStyle::Bass(self.bass_pattern),
            StyleKind::Arp => AccompanimentStyle::Arp(self.arp_direction),
        };

        GenerationConfig {
            target_octave: self
                .target_octave
                .clamp(TARGET_OCTAVE_RANGE.0, TARGET_OCTAVE_RANGE.1) as u8,
            velocity: self.velocity.clamp(VELOCITY_RANGE.0, VELOCITY_RANGE.1) as u8,
            min_hold_beats,
            style,
            ticks_per_beat: ticks_per_beat.max(1),
        }
    }
}

/// Validated generation parameters. Only constructed through
/// [`GenerationSettings::into_config`], so every field is in range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationConfig {
    target_octave: u8,
    velocity: u8,
    min_hold_beats: f64,
    style: AccompanimentStyle,
    ticks_per_beat: u16,
}

impl GenerationConfig {
    /// Octave of the accompaniment register, 2–5.
    pub fn target_octave(&self) -> u8 {
        self.target_octave
    }

    /// MIDI velocity, 20–120.
    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    /// Velocity normalized against the MIDI maximum.
    pub fn normalized_velocity(&self) -> f64 {
        self.velocity as f64 / 127.0
    }

    pub fn min_hold_beats(&self) -> f64 {
        self.min_hold_beats
    }

    pub fn style(&self) -> AccompanimentStyle {
        self.style
    }

    pub fn ticks_per_beat(&self) -> u16 {
        self.ticks_per_beat
    }

    /// Same values with a different style.
    pub fn with_style(self, style: AccompanimentStyle) -> Self {
        Self { style, ..self }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationSettings::default().into_config(DEFAULT_TICKS_PER_BEAT)
    }
}
