//! Pitch spelling with per-measure accidental memory.
//!
//! Standard notation convention: an accidental holds for its letter
//! until the bar line, so repeats inside a measure are not re-marked
//! and a natural after a marked sharp needs an explicit `=`.

use std::collections::HashMap;

use crate::ast::{Accidental, NoteName, PitchSymbol};

/// Letter accidentals stated so far in the current measure. The fixed
/// C-major key contributes none, so the reset state is empty.
#[derive(Debug, Default)]
pub struct AccidentalState {
    active: HashMap<NoteName, Accidental>,
}

impl AccidentalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset at a bar line.
    pub fn reset(&mut self) {
        self.active.clear();
    }

    /// The glyph to print for this symbol, if its accidental is not
    /// already in force for the letter; records whatever is decided.
    pub fn glyph_for(&mut self, symbol: &PitchSymbol) -> Option<Accidental> {
        let required = symbol.accidental.unwrap_or(Accidental::Natural);
        let in_force = self
            .active
            .get(&symbol.name)
            .copied()
            .unwrap_or(Accidental::Natural);

        if required == in_force {
            None
        } else {
            self.active.insert(symbol.name, required);
            Some(required)
        }
    }
}

/// Render one pitch as ABC text, consulting and updating the measure's
/// accidental memory.
pub fn spell(symbol: &PitchSymbol, state: &mut AccidentalState) -> String {
    let mut out = String::new();
    if let Some(accidental) = state.glyph_for(symbol) {
        out.push_str(accidental.glyph());
    }
    out.push_str(&symbol.letter_and_marks());
    out
}
