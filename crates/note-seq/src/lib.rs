//! Note sequence model for notation export.
//!
//! A [`NoteSequence`] is the flat, time-stamped collection of note events
//! a MIDI decoder produces: notes with wall-clock start/end times, tempo
//! markings, and time signatures. This crate owns the sequence types,
//! their normalization (validation, sorting, default injection), and the
//! one conversion from a decoded [`midly::Smf`] into a sequence.
//!
//! # Example
//!
//! ```
//! use note_seq::{normalize, NoteEvent, NoteSequence};
//!
//! let seq = NoteSequence {
//!     notes: vec![NoteEvent::pitched(0, 60, 0.0, 0.5)],
//!     ..NoteSequence::default()
//! };
//!
//! let seq = normalize(seq).unwrap();
//! assert_eq!(seq.tempos[0].qpm, 120.0);
//! assert_eq!(seq.time_signatures[0].numerator, 4);
//! ```

pub mod convert;
pub mod normalize;
pub mod sequence;

pub use convert::from_smf;
pub use normalize::{normalize, DEFAULT_QPM};
pub use sequence::{NoteEvent, NoteSequence, TempoMarking, TimeSignature};

/// Errors from sequence validation and normalization.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed sequence: {0}")]
    MalformedSequence(String),
    #[error("invalid time signature {numerator}/{denominator} at {time}s")]
    InvalidTimeSignature {
        time: f64,
        numerator: u8,
        denominator: u8,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
