use midly::num::{u15, u24, u28, u4, u7};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};
use serde::{Deserialize, Serialize};

use crate::note::{NoteSequence, TimedNote};
use crate::Result;

/// Default tempo for files written from scratch: 120 BPM.
const DEFAULT_TEMPO_USEC: u32 = 500_000;

/// General MIDI percussion channel (channel 10, zero-based).
const PERCUSSION_CHANNEL: u8 = 9;

/// Largest delta a track event can carry.
const MAX_DELTA: u32 = 0x0FFF_FFFF;

/// Options for MIDI export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// MIDI channel for the accompaniment, 0–15. Default: 0.
    pub channel: u8,
    /// Track name meta event. Default: "Accompaniment".
    pub track_name: String,
    /// General MIDI program to select before the first note, if any.
    pub program: Option<u8>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            channel: 0,
            track_name: "Accompaniment".to_string(),
            program: None,
        }
    }
}

/// Copy every track of `original` and append the accompaniment as a new track.
///
/// Timing is preserved. A single-track (format 0) file is promoted to
/// format 1 so the extra track plays in parallel.
pub fn append_accompaniment(
    original: &Smf,
    accompaniment: &[TimedNote],
    options: &ExportOptions,
) -> Result<Vec<u8>> {
    let format = match original.header.format {
        Format::SingleTrack => Format::Parallel,
        other => other,
    };

    let mut smf = Smf::new(Header::new(format, original.header.timing));
    smf.tracks = original.tracks.clone();
    smf.tracks.push(note_track(
        &options.track_name,
        accompaniment,
        options.channel,
        options.program,
    ));

    write(&smf)
}

/// Write a fresh format 1 file: tempo track, melody track, accompaniment track.
///
/// Used for melodies that did not come from a file (e.g. a step grid). The
/// melody goes on the channel after the accompaniment's (see
/// [`melody_channel`]).
pub fn sequence_to_midi(
    melody: &NoteSequence,
    accompaniment: &[TimedNote],
    options: &ExportOptions,
) -> Result<Vec<u8>> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(melody.ticks_per_beat.clamp(1, 0x7FFF))),
    ));

    smf.tracks.push(tempo_track());
    smf.tracks.push(note_track(
        "Melody",
        &melody.notes,
        melody_channel(options.channel),
        None,
    ));
    smf.tracks.push(note_track(
        &options.track_name,
        accompaniment,
        options.channel,
        options.program,
    ));

    write(&smf)
}

/// The channel after `accompaniment`, wrapping at 16 and skipping the
/// percussion channel.
pub fn melody_channel(accompaniment: u8) -> u8 {
    let channel = (accompaniment.min(15) + 1) % 16;
    if channel == PERCUSSION_CHANNEL {
        channel + 1
    } else {
        channel
    }
}

fn write(smf: &Smf) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    Ok(buf)
}

fn tempo_track() -> Track<'static> {
    vec![
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(DEFAULT_TEMPO_USEC))),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TimeSignature(4, 2, 24, 8)),
        },
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        },
    ]
}

/// Build one named track of note-on/note-off pairs.
///
/// Events are sorted by tick with note-offs ahead of note-ons at the same
/// tick, so a repeated pitch is released before it is struck again.
pub fn note_track<'a>(
    name: &'a str,
    notes: &[TimedNote],
    channel: u8,
    program: Option<u8>,
) -> Track<'a> {
    let channel = u4::new(channel.min(15));
    let mut track: Track<'a> = Vec::with_capacity(notes.len() * 2 + 3);

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(name.as_bytes())),
    });

    if let Some(program) = program {
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::new(program.min(127)),
                },
            },
        });
    }

    // (tick, is_note_on, pitch, velocity)
    let mut events: Vec<(u64, bool, u8, u8)> = Vec::with_capacity(notes.len() * 2);
    for note in notes {
        let velocity = (note.velocity * 127.0).round().clamp(1.0, 127.0) as u8;
        let pitch = note.pitch.min(127);
        events.push((note.start_tick, true, pitch, velocity));
        events.push((note.end_tick(), false, pitch, 0));
    }
    events.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut last_tick = 0u64;
    for (tick, is_on, pitch, velocity) in events {
        let delta = tick.saturating_sub(last_tick).min(MAX_DELTA as u64) as u32;
        last_tick = tick;

        let message = if is_on {
            MidiMessage::NoteOn {
                key: u7::new(pitch),
                vel: u7::new(velocity),
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::new(pitch),
                vel: u7::new(0),
            }
        };

        track.push(TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi { channel, message },
        });
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    track
}
