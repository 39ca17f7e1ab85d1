//! ABC text emission.
//!
//! Header fields in the order a conventional ABC reader expects
//! (X, T, M, L, K), then the measure stream: space-joined tokens,
//! bar lines between measures, a line break every few measures.

use std::fmt::Write;

use note_seq::NoteSequence;

use crate::ast::PitchSymbol;
use crate::measure::{Measure, MeasureToken};
use crate::pitch::{self, AccidentalState};
use crate::quantize::{QuantizedEvent, GRID_DENOMINATOR};
use crate::EncodeParams;

/// Render the full ABC document. Pure and deterministic: identical
/// measures always produce byte-identical text.
pub fn serialize(seq: &NoteSequence, measures: &[Measure], params: &EncodeParams) -> String {
    let mut out = String::new();

    let meter = seq.time_signature_at(0.0);
    let _ = writeln!(out, "X:{}", params.reference);
    let _ = writeln!(out, "T:{}", params.title);
    let _ = writeln!(out, "M:{}/{}", meter.numerator, meter.denominator);
    let _ = writeln!(out, "L:1/{GRID_DENOMINATOR}");
    let _ = writeln!(out, "K:C");

    let mut state = AccidentalState::new();
    for (i, measure) in measures.iter().enumerate() {
        state.reset();
        for (j, token) in measure.tokens.iter().enumerate() {
            if j > 0 {
                out.push(' ');
            }
            out.push_str(&render_token(token, &mut state));
        }
        out.push_str(" |");

        let end_of_line = (i + 1) % params.measures_per_line.max(1) == 0;
        if end_of_line || i + 1 == measures.len() {
            out.push('\n');
        } else {
            out.push(' ');
        }
    }

    out
}

fn render_token(token: &MeasureToken, state: &mut AccidentalState) -> String {
    match token {
        MeasureToken::Rest { duration_units } => {
            format!("z{}", duration_suffix(*duration_units))
        }
        MeasureToken::Note(event) => render_event(event, state),
    }
}

fn render_event(event: &QuantizedEvent, state: &mut AccidentalState) -> String {
    let mut out = String::new();

    if event.pitches.len() == 1 {
        out.push_str(&pitch::spell(&PitchSymbol::from_midi(event.pitches[0]), state));
    } else {
        out.push('[');
        for &p in &event.pitches {
            out.push_str(&pitch::spell(&PitchSymbol::from_midi(p), state));
        }
        out.push(']');
    }

    out.push_str(&duration_suffix(event.duration_units));
    if event.tie_end {
        out.push('-');
    }
    out
}

/// Unit multiplier after a note or rest; 1 is implicit in ABC.
fn duration_suffix(units: u64) -> String {
    if units == 1 {
        String::new()
    } else {
        units.to_string()
    }
}
