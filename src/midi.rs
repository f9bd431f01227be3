// MIDI output from generated piano rolls.
//
// A piano roll is a [frames, pitches] binary matrix. Each run of consecutive
// active frames on one pitch row becomes a single note. Notes are written as
// a Standard MIDI File (format 0) on channel 0 at 120 BPM.
//
// Uses the `midly` crate for MIDI writing.

use candle_core::{DType, Tensor};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

use crate::Result;
use crate::config::ModelMeta;

/// Ticks per quarter note in MIDI output.
const TICKS_PER_QUARTER: u16 = 220;

/// Microseconds per quarter note (120 BPM).
const TEMPO_MICROS: u32 = 500_000;

const TICKS_PER_SECOND: f64 = TICKS_PER_QUARTER as f64 * 1_000_000.0 / TEMPO_MICROS as f64;

/// A single note with absolute times in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub key: u8,
    pub velocity: u8,
    pub start_s: f64,
    pub end_s: f64,
}

/// A single-instrument score.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MidiScore {
    pub program: u8,
    pub notes: Vec<Note>,
}

impl MidiScore {
    /// Time of the last note-off in seconds, 0.0 for an empty score.
    pub fn end_time(&self) -> f64 {
        self.notes.iter().map(|n| n.end_s).fold(0.0, f64::max)
    }

    /// Write the score as a Standard MIDI File.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_smf().save(path)?;
        Ok(())
    }

    /// Convert to an in-memory SMF.
    pub fn to_smf(&self) -> Smf<'static> {
        let mut smf = Smf::new(Header::new(
            Format::SingleTrack,
            Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
        ));

        let channel = u4::new(0);
        let mut track: Track<'static> = vec![
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(TEMPO_MICROS))),
            },
            TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::ProgramChange {
                        program: u7::new(self.program.min(127)),
                    },
                },
            },
        ];

        // (tick, note-offs before note-ons at the same tick, key, message)
        let mut events: Vec<(u32, u8, u8, MidiMessage)> = Vec::with_capacity(self.notes.len() * 2);
        for note in &self.notes {
            let key = u7::new(note.key.min(127));
            events.push((
                seconds_to_ticks(note.start_s),
                1,
                note.key,
                MidiMessage::NoteOn {
                    key,
                    vel: u7::new(note.velocity.clamp(1, 127)),
                },
            ));
            events.push((
                seconds_to_ticks(note.end_s),
                0,
                note.key,
                MidiMessage::NoteOff {
                    key,
                    vel: u7::new(0),
                },
            ));
        }
        events.sort_by_key(|&(tick, order, key, _)| (tick, order, key));

        let mut last_tick = 0u32;
        for (tick, _, _, message) in events {
            track.push(TrackEvent {
                delta: u28::new(tick - last_tick),
                kind: TrackEventKind::Midi { channel, message },
            });
            last_tick = tick;
        }

        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
        smf.tracks.push(track);
        smf
    }
}

fn seconds_to_ticks(seconds: f64) -> u32 {
    (seconds.max(0.0) * TICKS_PER_SECOND).round() as u32
}

/// Convert a `[frames, pitches]` piano-roll tensor to a score.
pub fn tensor_to_midi(roll: &Tensor, meta: &ModelMeta) -> Result<MidiScore> {
    let rows = roll.to_dtype(DType::F32)?.to_vec2::<f32>()?;
    Ok(roll_to_score(&rows, meta))
}

/// Run-length encode each pitch row of a piano roll into notes.
///
/// A cell is active when it is above 0.5. Keys that fall outside the MIDI
/// range after offsetting by `meta.lowest_pitch` are dropped.
pub fn roll_to_score(roll: &[Vec<f32>], meta: &ModelMeta) -> MidiScore {
    let fps = meta.frames_per_second;
    let num_frames = roll.len();
    let num_pitches = roll.first().map_or(0, |r| r.len());

    let mut notes = Vec::new();
    for pitch in 0..num_pitches {
        let key = meta.lowest_pitch as usize + pitch;
        if key > 127 {
            break;
        }
        let mut onset: Option<usize> = None;
        for frame in 0..=num_frames {
            let active = frame < num_frames && roll[frame][pitch] > 0.5;
            match (active, onset) {
                (true, None) => onset = Some(frame),
                (false, Some(start)) => {
                    notes.push(Note {
                        key: key as u8,
                        velocity: meta.velocity,
                        start_s: start as f64 / fps,
                        end_s: frame as f64 / fps,
                    });
                    onset = None;
                }
                _ => {}
            }
        }
    }
    notes.sort_by(|a, b| a.start_s.total_cmp(&b.start_s).then(a.key.cmp(&b.key)));

    MidiScore {
        program: meta.program,
        notes,
    }
}
