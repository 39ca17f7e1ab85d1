//! Timeline normalization.
//!
//! Runs once at the boundary: validates the raw sequence, sorts its
//! lists, and injects defaults so that downstream components never test
//! for absence. Pure transform, no partial output on failure.

use tracing::debug;

use crate::sequence::{NoteSequence, TempoMarking, TimeSignature};
use crate::{Error, Result};

/// Default tempo when the decoder reports none.
pub const DEFAULT_QPM: f64 = 120.0;

/// Validate and normalize a raw sequence.
///
/// After this call: notes are sorted by start time then pitch, tempos
/// and time signatures are sorted and non-empty with their first entry
/// at time 0 (synthesized from the earliest real entry when needed),
/// and `total_time` is at least the last note's end.
pub fn normalize(mut seq: NoteSequence) -> Result<NoteSequence> {
    if seq.notes.is_empty() {
        return Err(Error::MalformedSequence("note list is empty".into()));
    }
    if !seq.total_time.is_finite() || seq.total_time < 0.0 {
        return Err(Error::MalformedSequence(format!(
            "total_time {} is negative or non-finite",
            seq.total_time
        )));
    }

    for note in &seq.notes {
        if !note.start_time.is_finite() || !note.end_time.is_finite() {
            return Err(Error::MalformedSequence(format!(
                "note on instrument {} has non-finite timing",
                note.instrument
            )));
        }
        if note.start_time < 0.0 {
            return Err(Error::MalformedSequence(format!(
                "note starts at negative time {}s",
                note.start_time
            )));
        }
        if note.end_time <= note.start_time {
            return Err(Error::MalformedSequence(format!(
                "note at {}s has non-positive duration",
                note.start_time
            )));
        }
        if note.pitch > 127 {
            return Err(Error::MalformedSequence(format!(
                "pitch {} out of MIDI range",
                note.pitch
            )));
        }
        if note.velocity > 127 {
            return Err(Error::MalformedSequence(format!(
                "velocity {} out of MIDI range",
                note.velocity
            )));
        }
    }

    for tempo in &seq.tempos {
        if !tempo.qpm.is_finite() || tempo.qpm <= 0.0 {
            return Err(Error::MalformedSequence(format!(
                "tempo {} qpm at {}s is not positive",
                tempo.qpm, tempo.time
            )));
        }
    }

    for ts in &seq.time_signatures {
        if ts.numerator < 1 || ts.denominator == 0 || !ts.denominator.is_power_of_two() {
            return Err(Error::InvalidTimeSignature {
                time: ts.time,
                numerator: ts.numerator,
                denominator: ts.denominator,
            });
        }
    }

    seq.notes.sort_by(|a, b| {
        a.start_time
            .total_cmp(&b.start_time)
            .then(a.pitch.cmp(&b.pitch))
    });
    seq.tempos.sort_by(|a, b| a.time.total_cmp(&b.time));
    seq.time_signatures.sort_by(|a, b| a.time.total_cmp(&b.time));

    if seq.tempos.is_empty() {
        seq.tempos.push(TempoMarking {
            time: 0.0,
            qpm: DEFAULT_QPM,
        });
    } else if seq.tempos[0].time > 0.0 {
        // Back-fill so every note has a governing marking
        let first = TempoMarking {
            time: 0.0,
            ..seq.tempos[0]
        };
        seq.tempos.insert(0, first);
    }

    if seq.time_signatures.is_empty() {
        seq.time_signatures.push(TimeSignature {
            time: 0.0,
            numerator: 4,
            denominator: 4,
        });
    } else if seq.time_signatures[0].time > 0.0 {
        let first = TimeSignature {
            time: 0.0,
            ..seq.time_signatures[0]
        };
        seq.time_signatures.insert(0, first);
    }

    let last_end = seq.notes.iter().map(|n| n.end_time).fold(0.0, f64::max);
    if seq.total_time < last_end {
        debug!(
            reported = seq.total_time,
            actual = last_end,
            "raising under-reported total_time"
        );
        seq.total_time = last_end;
    }

    Ok(seq)
}
