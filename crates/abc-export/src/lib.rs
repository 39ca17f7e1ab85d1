//! Deterministic note-sequence to ABC notation encoder.
//!
//! Takes the flat, time-stamped [`NoteSequence`] a MIDI decoder
//! produces and emits an ABC notation document in a single pass:
//! quantize onto a sixteenth-note grid, merge simultaneous notes into
//! chords, partition into exactly-full measures with tied splits at bar
//! lines, spell pitches in C major, and serialize.
//!
//! # Example
//!
//! ```
//! use abc_export::{encode, EncodeParams};
//! use note_seq::{NoteEvent, NoteSequence};
//!
//! let seq = NoteSequence {
//!     notes: vec![NoteEvent::pitched(0, 60, 0.0, 0.5)],
//!     ..NoteSequence::default()
//! };
//!
//! let abc = encode(&seq, &EncodeParams::default()).unwrap();
//! assert!(abc.starts_with("X:1\n"));
//! ```
//!
//! The encoder is a pure transform: no I/O, no shared state, and
//! byte-identical output for identical input. On any invariant
//! violation it fails with a typed error before producing any text.

pub mod ast;
pub mod group;
pub mod measure;
pub mod pitch;
pub mod quantize;
pub mod serialize;

use note_seq::NoteSequence;
use tracing::info;

pub use ast::{Accidental, NoteName, PitchSymbol};
pub use measure::{Measure, MeasureToken};
pub use quantize::QuantizedEvent;

/// Errors from encoding. Never partial output: the first violation
/// aborts the whole document.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Sequence(#[from] note_seq::Error),
    #[error("note at {start_time}s spans {units} grid units (maximum {max})")]
    QuantizationOverflow {
        start_time: f64,
        units: u64,
        max: u64,
    },
    #[error("time signature {numerator}/{denominator} is finer than the sixteenth-note grid")]
    UnsupportedTimeSignature { numerator: u8, denominator: u8 },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Parameters for ABC generation.
#[derive(Debug, Clone)]
pub struct EncodeParams {
    /// ABC `X:` reference number.
    pub reference: u32,
    /// ABC `T:` title.
    pub title: String,
    /// Measures per output line.
    pub measures_per_line: usize,
    /// Guard against pathological tempos: one note may not span more
    /// grid units than this.
    pub max_units_per_note: u64,
}

impl Default for EncodeParams {
    fn default() -> Self {
        EncodeParams {
            reference: 1,
            title: "Untitled".to_string(),
            measures_per_line: 4,
            max_units_per_note: 1024,
        }
    }
}

/// Encode a note sequence as an ABC notation document.
pub fn encode(sequence: &NoteSequence, params: &EncodeParams) -> Result<String> {
    let sequence = note_seq::normalize(sequence.clone())?;
    let candidates = quantize::quantize(&sequence, params.max_units_per_note)?;
    let stream = group::group_chords(candidates);
    let measures = measure::segment(&stream, &sequence)?;

    info!(
        notes = sequence.notes.len(),
        events = stream.len(),
        measures = measures.len(),
        "encoded note sequence to ABC"
    );

    Ok(serialize::serialize(&sequence, &measures, params))
}
