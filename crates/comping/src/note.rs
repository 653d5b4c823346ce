use serde::{Deserialize, Serialize};

/// A single pitched event with absolute tick timing.
///
/// Used for both melody input and generated accompaniment. Velocity is
/// normalized to 0.0–1.0 rather than the MIDI 0–127 byte.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedNote {
    pub pitch: u8,
    pub start_tick: u64,
    pub duration_ticks: u64,
    pub velocity: f64,
}

/// Generated notes share the melody representation.
pub type AccompanimentNote = TimedNote;

impl TimedNote {
    pub fn new(pitch: u8, start_tick: u64, duration_ticks: u64, velocity: f64) -> Self {
        Self {
            pitch,
            start_tick,
            duration_ticks,
            velocity,
        }
    }

    pub fn end_tick(&self) -> u64 {
        self.start_tick.saturating_add(self.duration_ticks)
    }

    /// Pitch reduced to 0–11, ignoring octave.
    pub fn pitch_class(&self) -> u8 {
        self.pitch % 12
    }
}

/// An ordered melody plus the tick resolution it was written at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteSequence {
    pub notes: Vec<TimedNote>,
    pub ticks_per_beat: u16,
}

impl NoteSequence {
    /// Build a canonical sequence.
    ///
    /// Zero-length notes are dropped, velocities are clamped into 0.0–1.0
    /// and the result is sorted by `(start_tick, pitch)`.
    pub fn new(notes: Vec<TimedNote>, ticks_per_beat: u16) -> Self {
        let mut notes: Vec<TimedNote> = notes
            .into_iter()
            .filter(|n| n.duration_ticks > 0 && n.pitch <= 127)
            .map(|n| TimedNote {
                velocity: if n.velocity.is_finite() {
                    n.velocity.clamp(0.0, 1.0)
                } else {
                    0.0
                },
                ..n
            })
            .collect();

        notes.sort_by(|a, b| a.start_tick.cmp(&b.start_tick).then(a.pitch.cmp(&b.pitch)));

        Self {
            notes,
            ticks_per_beat: ticks_per_beat.max(1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Tick at which the last note stops sounding.
    pub fn total_ticks(&self) -> u64 {
        self.notes.iter().map(TimedNote::end_tick).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sorts_by_start_then_pitch() {
        let seq = NoteSequence::new(
            vec![
                TimedNote::new(67, 480, 240, 0.5),
                TimedNote::new(64, 0, 240, 0.5),
                TimedNote::new(60, 480, 240, 0.5),
            ],
            480,
        );

        let order: Vec<(u64, u8)> = seq.notes.iter().map(|n| (n.start_tick, n.pitch)).collect();
        assert_eq!(order, vec![(0, 64), (480, 60), (480, 67)]);
    }

    #[test]
    fn drops_zero_length_and_clamps_velocity() {
        let seq = NoteSequence::new(
            vec![
                TimedNote::new(60, 0, 0, 0.5),
                TimedNote::new(62, 0, 120, 1.7),
                TimedNote::new(64, 120, 120, f64::NAN),
            ],
            0,
        );

        assert_eq!(seq.len(), 2);
        assert_eq!(seq.notes[0].velocity, 1.0);
        assert_eq!(seq.notes[1].velocity, 0.0);
        assert_eq!(seq.ticks_per_beat, 1);
        assert_eq!(seq.total_ticks(), 240);
    }

    #[test]
    fn pitch_class_ignores_octave() {
        assert_eq!(TimedNote::new(61, 0, 1, 1.0).pitch_class(), 1);
        assert_eq!(TimedNote::new(13, 0, 1, 1.0).pitch_class(), 1);
    }
}
