use serde::{Deserialize, Serialize};

/// A single pitched note with absolute wall-clock timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Source track index from the decoder.
    pub instrument: usize,
    /// GM program number in force when the note sounded (0-127).
    pub program: u8,
    /// Channel-10 percussion; carries no pitch spelling.
    pub is_drum: bool,
    pub start_time: f64,
    pub end_time: f64,
    pub pitch: u8,
    pub velocity: u8,
}

impl NoteEvent {
    /// A pitched, non-drum note on the given instrument track.
    pub fn pitched(instrument: usize, pitch: u8, start_time: f64, end_time: f64) -> Self {
        NoteEvent {
            instrument,
            program: 0,
            is_drum: false,
            start_time,
            end_time,
            pitch,
            velocity: 80,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Tempo in quarter notes per minute, effective from `time` onward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoMarking {
    pub time: f64,
    pub qpm: f64,
}

/// Time signature effective from `time` onward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub time: f64,
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    /// Quarter-note beats per measure under this signature.
    pub fn beats_per_measure(&self) -> f64 {
        self.numerator as f64 * 4.0 / self.denominator as f64
    }
}

/// The encoder's sole input: a flat note list plus its timing context.
///
/// After [`crate::normalize`], `tempos` and `time_signatures` are
/// non-empty, sorted, and start at time 0, and `total_time` covers the
/// last note's end. Consumers should not have to test for absence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NoteSequence {
    pub notes: Vec<NoteEvent>,
    pub tempos: Vec<TempoMarking>,
    pub time_signatures: Vec<TimeSignature>,
    pub total_time: f64,
}

impl NoteSequence {
    /// The tempo marking governing `time`: the last marking at or before
    /// it. Falls back to the default 120 qpm on an unnormalized sequence.
    pub fn tempo_at(&self, time: f64) -> TempoMarking {
        self.tempos
            .iter()
            .rev()
            .find(|t| t.time <= time)
            .copied()
            .unwrap_or(TempoMarking {
                time: 0.0,
                qpm: crate::normalize::DEFAULT_QPM,
            })
    }

    /// The time signature governing `time`.
    pub fn time_signature_at(&self, time: f64) -> TimeSignature {
        self.time_signatures
            .iter()
            .rev()
            .find(|ts| ts.time <= time)
            .copied()
            .unwrap_or(TimeSignature {
                time: 0.0,
                numerator: 4,
                denominator: 4,
            })
    }
}
