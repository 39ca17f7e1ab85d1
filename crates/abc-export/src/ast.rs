//! Pitch vocabulary for ABC output.
//!
//! Only the subset the encoder emits: note letters, the accidentals a
//! C-major spelling can need, and octave-relative pitch symbols.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteName {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl NoteName {
    /// Semitone offset from C (0-11).
    pub fn to_semitone(&self) -> i8 {
        match self {
            NoteName::C => 0,
            NoteName::D => 2,
            NoteName::E => 4,
            NoteName::F => 5,
            NoteName::G => 7,
            NoteName::A => 9,
            NoteName::B => 11,
        }
    }

    pub fn letter(&self) -> char {
        match self {
            NoteName::C => 'C',
            NoteName::D => 'D',
            NoteName::E => 'E',
            NoteName::F => 'F',
            NoteName::G => 'G',
            NoteName::A => 'A',
            NoteName::B => 'B',
        }
    }

    /// Spell a pitch class (0-11), preferring sharps for chromatic notes.
    pub fn from_semitone(semitone: u8) -> (NoteName, Option<Accidental>) {
        match semitone % 12 {
            0 => (NoteName::C, None),
            1 => (NoteName::C, Some(Accidental::Sharp)),
            2 => (NoteName::D, None),
            3 => (NoteName::D, Some(Accidental::Sharp)),
            4 => (NoteName::E, None),
            5 => (NoteName::F, None),
            6 => (NoteName::F, Some(Accidental::Sharp)),
            7 => (NoteName::G, None),
            8 => (NoteName::G, Some(Accidental::Sharp)),
            9 => (NoteName::A, None),
            10 => (NoteName::A, Some(Accidental::Sharp)),
            11 => (NoteName::B, None),
            _ => unreachable!(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Accidental {
    Sharp,
    Flat,
    Natural,
}

impl Accidental {
    pub fn to_semitone_offset(&self) -> i8 {
        match self {
            Accidental::Sharp => 1,
            Accidental::Flat => -1,
            Accidental::Natural => 0,
        }
    }

    /// ABC glyph preceding the note letter.
    pub fn glyph(&self) -> &'static str {
        match self {
            Accidental::Sharp => "^",
            Accidental::Flat => "_",
            Accidental::Natural => "=",
        }
    }
}

/// A spelled pitch: letter, accidental, and octave relative to the
/// middle-C octave (MIDI 60-71 = octave 0, rendered uppercase unmarked).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitchSymbol {
    pub name: NoteName,
    pub accidental: Option<Accidental>,
    pub octave: i8,
}

impl PitchSymbol {
    /// Spell a MIDI pitch in the fixed C-major context.
    pub fn from_midi(pitch: u8) -> Self {
        let (name, accidental) = NoteName::from_semitone(pitch % 12);
        let octave = (pitch / 12) as i8 - 5;
        PitchSymbol {
            name,
            accidental,
            octave,
        }
    }

    /// Recover the MIDI pitch this symbol spells.
    pub fn to_midi(&self) -> u8 {
        let base = self.name.to_semitone() as i16;
        let acc = self
            .accidental
            .map(|a| a.to_semitone_offset() as i16)
            .unwrap_or(0);
        let octave = (self.octave as i16 + 5) * 12;
        (base + acc + octave).clamp(0, 127) as u8
    }

    /// Letter plus octave marks, without any accidental glyph:
    /// uppercase with commas below middle C, lowercase with
    /// apostrophes above.
    pub fn letter_and_marks(&self) -> String {
        let mut out = String::new();
        if self.octave >= 1 {
            out.push(self.name.letter().to_ascii_lowercase());
            for _ in 1..self.octave {
                out.push('\'');
            }
        } else {
            out.push(self.name.letter());
            for _ in self.octave..0 {
                out.push(',');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn middle_c_is_unmarked_uppercase() {
        let sym = PitchSymbol::from_midi(60);
        assert_eq!(sym.name, NoteName::C);
        assert_eq!(sym.accidental, None);
        assert_eq!(sym.octave, 0);
        assert_eq!(sym.letter_and_marks(), "C");
    }

    #[test]
    fn octave_marks() {
        assert_eq!(PitchSymbol::from_midi(72).letter_and_marks(), "c");
        assert_eq!(PitchSymbol::from_midi(84).letter_and_marks(), "c'");
        assert_eq!(PitchSymbol::from_midi(96).letter_and_marks(), "c''");
        assert_eq!(PitchSymbol::from_midi(48).letter_and_marks(), "C,");
        assert_eq!(PitchSymbol::from_midi(36).letter_and_marks(), "C,,");
    }

    #[test]
    fn chromatic_pitches_spelled_sharp() {
        let sym = PitchSymbol::from_midi(61);
        assert_eq!(sym.name, NoteName::C);
        assert_eq!(sym.accidental, Some(Accidental::Sharp));

        let sym = PitchSymbol::from_midi(70);
        assert_eq!(sym.name, NoteName::A);
        assert_eq!(sym.accidental, Some(Accidental::Sharp));
    }

    #[test]
    fn round_trip_full_midi_range() {
        for pitch in 0u8..=127 {
            assert_eq!(
                PitchSymbol::from_midi(pitch).to_midi(),
                pitch,
                "pitch {pitch} did not round-trip"
            );
        }
    }
}
