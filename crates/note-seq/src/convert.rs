//! Conversion from a decoded Standard MIDI File to a [`NoteSequence`].
//!
//! The decoder (`midly`) owns byte parsing; this module only reshapes
//! its event stream: note-on/note-off pairs become [`NoteEvent`]s and
//! tick timestamps become seconds through the piecewise tempo map.
//! This is deliberately the only place that conversion lives.

use std::collections::HashMap;

use midly::{MetaMessage, MidiMessage, Smf, TrackEventKind};
use tracing::debug;

use crate::sequence::{NoteEvent, NoteSequence, TempoMarking, TimeSignature};

/// MIDI default tempo: 500 000 microseconds per quarter note (120 qpm).
const DEFAULT_US_PER_BEAT: f64 = 500_000.0;

/// Piecewise tick-to-seconds clock built from tempo meta events.
struct TempoMap {
    ppq: f64,
    segments: Vec<TempoSegment>,
}

struct TempoSegment {
    tick: u64,
    seconds: f64,
    us_per_beat: f64,
}

impl TempoMap {
    /// `changes` must be sorted by tick.
    fn new(ppq: u16, changes: &[(u64, u32)]) -> Self {
        let ppq = ppq as f64;
        let mut segments = vec![TempoSegment {
            tick: 0,
            seconds: 0.0,
            us_per_beat: DEFAULT_US_PER_BEAT,
        }];

        let mut prev_tick = 0u64;
        let mut prev_seconds = 0.0;
        let mut prev_us = DEFAULT_US_PER_BEAT;

        for &(tick, usec) in changes {
            if tick == prev_tick {
                // A change at the same tick replaces the tempo in force
                prev_us = usec as f64;
                if let Some(last) = segments.last_mut() {
                    last.us_per_beat = prev_us;
                }
                continue;
            }
            let seconds = prev_seconds + (tick - prev_tick) as f64 / ppq * prev_us / 1_000_000.0;
            prev_tick = tick;
            prev_seconds = seconds;
            prev_us = usec as f64;
            segments.push(TempoSegment {
                tick,
                seconds,
                us_per_beat: prev_us,
            });
        }

        TempoMap { ppq, segments }
    }

    fn seconds(&self, tick: u64) -> f64 {
        match self.segments.iter().rev().find(|s| s.tick <= tick) {
            Some(s) => s.seconds + (tick - s.tick) as f64 / self.ppq * s.us_per_beat / 1_000_000.0,
            None => 0.0,
        }
    }
}

/// Reshape a decoded MIDI file into a raw `NoteSequence`.
///
/// The result is unnormalized: a file with no tempo or time-signature
/// metas yields empty lists, and [`crate::normalize`] fills defaults.
/// Track index becomes the instrument index; channel-9 notes are marked
/// as drums; unterminated notes are closed at their track's final tick.
pub fn from_smf(smf: &Smf) -> NoteSequence {
    let ppq = match smf.header.timing {
        midly::Timing::Metrical(ticks) => ticks.as_int(),
        midly::Timing::Timecode(_, _) => 480,
    };

    // First pass: gather the global tempo and time-signature maps
    let mut tempo_changes: Vec<(u64, u32)> = Vec::new();
    let mut signatures: Vec<(u64, u8, u8)> = Vec::new();
    let mut final_tick = 0u64;

    for track in &smf.tracks {
        let mut tick = 0u64;
        for event in track {
            tick += event.delta.as_int() as u64;
            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(usec)) => {
                    tempo_changes.push((tick, usec.as_int()));
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(num, denom_pow, _, _)) => {
                    signatures.push((tick, num, 1u8 << denom_pow));
                }
                _ => {}
            }
        }
        final_tick = final_tick.max(tick);
    }

    // Format-1 files may repeat metas across tracks
    tempo_changes.sort_by_key(|&(tick, _)| tick);
    tempo_changes.dedup();
    signatures.sort_by_key(|&(tick, _, _)| tick);
    signatures.dedup_by_key(|&mut (tick, _, _)| tick);

    let clock = TempoMap::new(ppq, &tempo_changes);

    // Second pass: pair note-on/note-off per (channel, key)
    let mut notes = Vec::new();
    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut tick = 0u64;
        let mut programs = [0u8; 16];
        let mut pending: HashMap<(u8, u8), Vec<(u64, u8, u8)>> = HashMap::new();

        for event in track {
            tick += event.delta.as_int() as u64;

            if let TrackEventKind::Midi { channel, message } = event.kind {
                let ch = channel.as_int();
                match message {
                    MidiMessage::ProgramChange { program } => {
                        programs[ch as usize] = program.as_int();
                    }
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        pending.entry((ch, key.as_int())).or_default().push((
                            tick,
                            vel.as_int(),
                            programs[ch as usize],
                        ));
                    }
                    // vel=0 NoteOn is NoteOff
                    MidiMessage::NoteOff { key, .. } | MidiMessage::NoteOn { key, .. } => {
                        if let Some(stack) = pending.get_mut(&(ch, key.as_int())) {
                            if let Some((onset, velocity, program)) = stack.pop() {
                                notes.push(NoteEvent {
                                    instrument: track_index,
                                    program,
                                    is_drum: ch == 9,
                                    start_time: clock.seconds(onset),
                                    end_time: clock.seconds(tick),
                                    pitch: key.as_int(),
                                    velocity,
                                });
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        // Close any unterminated notes at the track's final tick
        for ((ch, pitch), stack) in pending {
            for (onset, velocity, program) in stack {
                notes.push(NoteEvent {
                    instrument: track_index,
                    program,
                    is_drum: ch == 9,
                    start_time: clock.seconds(onset),
                    end_time: clock.seconds(tick),
                    pitch,
                    velocity,
                });
            }
        }
    }

    // Sort by onset then pitch for determinism; the pending-stack
    // flush above iterates a HashMap
    notes.sort_by(|a: &NoteEvent, b: &NoteEvent| {
        a.start_time
            .total_cmp(&b.start_time)
            .then(a.pitch.cmp(&b.pitch))
    });

    let tempos = tempo_changes
        .iter()
        .map(|&(tick, usec)| TempoMarking {
            time: clock.seconds(tick),
            qpm: 60_000_000.0 / usec as f64,
        })
        .collect();

    let time_signatures = signatures
        .iter()
        .map(|&(tick, numerator, denominator)| TimeSignature {
            time: clock.seconds(tick),
            numerator,
            denominator,
        })
        .collect();

    let total_time = clock.seconds(final_tick);

    debug!(
        notes = notes.len(),
        tempos = tempo_changes.len(),
        total_time,
        "converted MIDI file to note sequence"
    );

    NoteSequence {
        notes,
        tempos,
        time_signatures,
        total_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Assemble a single-track SMF byte stream from raw track events.
    fn smf_bytes(ppq: u16, events: &[(u32, &[u8])]) -> Vec<u8> {
        let mut track = Vec::new();
        for &(delta, data) in events {
            // Deltas in these tests stay below 0x80 or need two bytes
            if delta < 0x80 {
                track.push(delta as u8);
            } else {
                track.push(0x80 | ((delta >> 7) & 0x7F) as u8);
                track.push((delta & 0x7F) as u8);
            }
            track.extend_from_slice(data);
        }
        track.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);

        let mut out = Vec::new();
        out.extend_from_slice(b"MThd");
        out.extend_from_slice(&6u32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&ppq.to_be_bytes());
        out.extend_from_slice(b"MTrk");
        out.extend_from_slice(&(track.len() as u32).to_be_bytes());
        out.extend(track);
        out
    }

    #[test]
    fn pairs_note_on_and_off() {
        // ppq 480, default tempo: one quarter note C4 from 0.0s to 0.5s
        let bytes = smf_bytes(
            480,
            &[(0, &[0x90, 60, 80]), (480, &[0x80, 60, 0])],
        );
        let smf = Smf::parse(&bytes).unwrap();
        let seq = from_smf(&smf);

        assert_eq!(seq.notes.len(), 1);
        assert_eq!(seq.notes[0].pitch, 60);
        assert_eq!(seq.notes[0].velocity, 80);
        assert_eq!(seq.notes[0].start_time, 0.0);
        assert_eq!(seq.notes[0].end_time, 0.5);
        assert_eq!(seq.total_time, 0.5);
    }

    #[test]
    fn zero_velocity_note_on_ends_note() {
        let bytes = smf_bytes(
            480,
            &[(0, &[0x90, 64, 90]), (240, &[0x90, 64, 0])],
        );
        let smf = Smf::parse(&bytes).unwrap();
        let seq = from_smf(&smf);

        assert_eq!(seq.notes.len(), 1);
        assert_eq!(seq.notes[0].end_time, 0.25);
    }

    #[test]
    fn tempo_meta_governs_seconds() {
        // Tempo 60 qpm (1 000 000 us/beat): a quarter note lasts 1s
        let bytes = smf_bytes(
            480,
            &[
                (0, &[0xFF, 0x51, 0x03, 0x0F, 0x42, 0x40]),
                (0, &[0x90, 60, 80]),
                (480, &[0x80, 60, 0]),
            ],
        );
        let smf = Smf::parse(&bytes).unwrap();
        let seq = from_smf(&smf);

        assert_eq!(seq.tempos.len(), 1);
        assert_eq!(seq.tempos[0].qpm, 60.0);
        assert_eq!(seq.notes[0].end_time, 1.0);
    }

    #[test]
    fn mid_piece_tempo_change_is_piecewise() {
        // 120 qpm for one beat, then 60 qpm for one beat: 0.5s + 1.0s
        let bytes = smf_bytes(
            480,
            &[
                (0, &[0x90, 60, 80]),
                (480, &[0xFF, 0x51, 0x03, 0x0F, 0x42, 0x40]),
                (480, &[0x80, 60, 0]),
            ],
        );
        let smf = Smf::parse(&bytes).unwrap();
        let seq = from_smf(&smf);

        assert_eq!(seq.notes[0].end_time, 1.5);
        assert_eq!(seq.total_time, 1.5);
    }

    #[test]
    fn channel_nine_marked_as_drums() {
        let bytes = smf_bytes(
            480,
            &[(0, &[0x99, 36, 100]), (120, &[0x89, 36, 0])],
        );
        let smf = Smf::parse(&bytes).unwrap();
        let seq = from_smf(&smf);

        assert_eq!(seq.notes.len(), 1);
        assert!(seq.notes[0].is_drum);
    }

    #[test]
    fn time_signature_meta_collected() {
        // 3/4: numerator 3, denominator 2^2
        let bytes = smf_bytes(
            480,
            &[
                (0, &[0xFF, 0x58, 0x04, 0x03, 0x02, 0x18, 0x08]),
                (0, &[0x90, 60, 80]),
                (480, &[0x80, 60, 0]),
            ],
        );
        let smf = Smf::parse(&bytes).unwrap();
        let seq = from_smf(&smf);

        assert_eq!(seq.time_signatures.len(), 1);
        assert_eq!(seq.time_signatures[0].numerator, 3);
        assert_eq!(seq.time_signatures[0].denominator, 4);
    }

    #[test]
    fn program_change_stamped_on_notes() {
        let bytes = smf_bytes(
            480,
            &[
                (0, &[0xC0, 24]),
                (0, &[0x90, 60, 80]),
                (480, &[0x80, 60, 0]),
            ],
        );
        let smf = Smf::parse(&bytes).unwrap();
        let seq = from_smf(&smf);

        assert_eq!(seq.notes[0].program, 24);
    }

    #[test]
    fn unterminated_note_closed_at_track_end() {
        let bytes = smf_bytes(480, &[(0, &[0x90, 60, 80]), (960, &[0x90, 62, 80])]);
        let smf = Smf::parse(&bytes).unwrap();
        let seq = from_smf(&smf);

        assert_eq!(seq.notes.len(), 2);
        for note in &seq.notes {
            assert_eq!(note.end_time, 1.0);
        }
    }
}
