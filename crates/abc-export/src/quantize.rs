//! Quantization onto the sixteenth-note grid.
//!
//! The only place float arithmetic happens: everything downstream
//! works in integer grid units. Each note's start and end snap
//! independently from its own wall-clock times, so rounding error is
//! bounded per note instead of accumulating along the stream.

use note_seq::NoteSequence;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Grid units per quarter note (sixteenth-note resolution).
pub const UNITS_PER_QUARTER: u64 = 4;
/// Grid units per whole note.
pub const UNITS_PER_WHOLE: u64 = 16;
/// Denominator for the ABC `L:` header field.
pub const GRID_DENOMINATOR: u64 = 16;

/// A note or chord snapped to the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantizedEvent {
    pub instrument: usize,
    /// Chord members, sorted ascending. Singleton for a plain note.
    pub pitches: Vec<u8>,
    pub start_unit: u64,
    pub duration_units: u64,
    /// Continues a note split at an earlier bar line.
    pub tie_start: bool,
    /// Sustains into the next fragment across a bar line.
    pub tie_end: bool,
}

impl QuantizedEvent {
    pub fn end_unit(&self) -> u64 {
        self.start_unit + self.duration_units
    }
}

fn round_half_up(x: f64) -> u64 {
    (x + 0.5).floor() as u64
}

/// Grid position of a wall-clock time under its governing tempo (the
/// last marking at or before it; no interpolation within a note).
pub fn units_at(seq: &NoteSequence, time: f64) -> u64 {
    let qpm = seq.tempo_at(time).qpm;
    round_half_up(time * qpm / 60.0 * UNITS_PER_QUARTER as f64)
}

/// Snap every pitched note to the grid, one candidate event per note.
///
/// Drum notes carry no pitch spelling and are dropped. A note whose
/// snapped span exceeds `max_units_per_note` fails with
/// [`Error::QuantizationOverflow`]; a span that rounds to zero is
/// promoted to one unit so no note vanishes.
pub fn quantize(seq: &NoteSequence, max_units_per_note: u64) -> Result<Vec<QuantizedEvent>> {
    let mut events = Vec::with_capacity(seq.notes.len());
    let mut dropped_drums = 0usize;

    for note in &seq.notes {
        if note.is_drum {
            dropped_drums += 1;
            continue;
        }

        let qpm = seq.tempo_at(note.start_time).qpm;
        let to_units = |time: f64| round_half_up(time * qpm / 60.0 * UNITS_PER_QUARTER as f64);

        let start_unit = to_units(note.start_time);
        let end_unit = to_units(note.end_time);
        let duration_units = (end_unit.saturating_sub(start_unit)).max(1);

        if duration_units > max_units_per_note {
            return Err(Error::QuantizationOverflow {
                start_time: note.start_time,
                units: duration_units,
                max: max_units_per_note,
            });
        }

        events.push(QuantizedEvent {
            instrument: note.instrument,
            pitches: vec![note.pitch],
            start_unit,
            duration_units,
            tie_start: false,
            tie_end: false,
        });
    }

    if dropped_drums > 0 {
        debug!(dropped_drums, "drum notes have no pitch spelling, skipped");
    }
    debug!(events = events.len(), "quantized notes onto sixteenth grid");

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use note_seq::{normalize, NoteEvent, TempoMarking};
    use pretty_assertions::assert_eq;

    fn seq_of(notes: Vec<NoteEvent>) -> NoteSequence {
        normalize(NoteSequence {
            notes,
            ..NoteSequence::default()
        })
        .unwrap()
    }

    #[test]
    fn quarter_note_at_120_is_four_units() {
        let seq = seq_of(vec![NoteEvent::pitched(0, 60, 0.0, 0.5)]);
        let events = quantize(&seq, 1024).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start_unit, 0);
        assert_eq!(events[0].duration_units, 4);
        assert_eq!(events[0].pitches, vec![60]);
    }

    #[test]
    fn grid_aligned_input_is_idempotent() {
        // Boundaries at exact sixteenth multiples (0.125s at 120 qpm)
        let seq = seq_of(vec![
            NoteEvent::pitched(0, 60, 0.0, 0.125),
            NoteEvent::pitched(0, 62, 0.125, 0.5),
            NoteEvent::pitched(0, 64, 0.5, 1.0),
        ]);
        let events = quantize(&seq, 1024).unwrap();

        assert_eq!(events[0].start_unit, 0);
        assert_eq!(events[0].duration_units, 1);
        assert_eq!(events[1].start_unit, 1);
        assert_eq!(events[1].duration_units, 3);
        assert_eq!(events[2].start_unit, 4);
        assert_eq!(events[2].duration_units, 4);
    }

    #[test]
    fn off_grid_start_snaps_without_drift() {
        // Starts drift slightly sharp of the grid; each note snaps from
        // its own timestamps, so the error never accumulates
        let notes: Vec<NoteEvent> = (0..8)
            .map(|i| {
                let start = i as f64 * 0.125 + 0.004;
                NoteEvent::pitched(0, 60, start, start + 0.121)
            })
            .collect();
        let seq = seq_of(notes);
        let events = quantize(&seq, 1024).unwrap();

        for (i, ev) in events.iter().enumerate() {
            assert_eq!(ev.start_unit, i as u64);
            assert_eq!(ev.duration_units, 1);
        }
    }

    #[test]
    fn vanishing_note_promoted_to_one_unit() {
        let seq = seq_of(vec![NoteEvent::pitched(0, 60, 0.0, 0.01)]);
        let events = quantize(&seq, 1024).unwrap();
        assert_eq!(events[0].duration_units, 1);
    }

    #[test]
    fn governing_tempo_is_last_at_or_before_start() {
        let seq = normalize(NoteSequence {
            notes: vec![NoteEvent::pitched(0, 60, 10.0, 11.0)],
            tempos: vec![
                TempoMarking {
                    time: 0.0,
                    qpm: 120.0,
                },
                TempoMarking {
                    time: 10.0,
                    qpm: 60.0,
                },
            ],
            total_time: 11.0,
            ..NoteSequence::default()
        })
        .unwrap();
        let events = quantize(&seq, 1024).unwrap();

        // At 60 qpm one second is one beat: 4 units
        assert_eq!(events[0].duration_units, 4);
    }

    #[test]
    fn pathological_span_overflows() {
        let seq = seq_of(vec![NoteEvent::pitched(0, 60, 0.0, 3600.0)]);
        let err = quantize(&seq, 1024).unwrap_err();
        assert!(matches!(err, Error::QuantizationOverflow { max: 1024, .. }));
    }

    #[test]
    fn drum_notes_skipped() {
        let mut drum = NoteEvent::pitched(0, 36, 0.0, 0.5);
        drum.is_drum = true;
        let seq = seq_of(vec![drum, NoteEvent::pitched(1, 60, 0.0, 0.5)]);
        let events = quantize(&seq, 1024).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].pitches, vec![60]);
    }
}
