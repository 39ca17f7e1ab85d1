//! Bar segmentation.
//!
//! Walks the merged event stream and partitions it into measures whose
//! token durations sum exactly to the capacity of the time signature in
//! force. Events that would overflow a measure split into tied
//! fragments; gaps and the tail out to the sequence's total time fill
//! with rests, chunked at quarter-beat boundaries so the notation reads
//! as beats rather than one opaque long rest.

use note_seq::NoteSequence;
use serde::{Deserialize, Serialize};

use crate::quantize::{self, QuantizedEvent, UNITS_PER_QUARTER, UNITS_PER_WHOLE};
use crate::{Error, Result};

/// One slot in a measure: a sounding event or a rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MeasureToken {
    Note(QuantizedEvent),
    Rest { duration_units: u64 },
}

impl MeasureToken {
    pub fn duration_units(&self) -> u64 {
        match self {
            MeasureToken::Note(ev) => ev.duration_units,
            MeasureToken::Rest { duration_units } => *duration_units,
        }
    }
}

/// A measure filled to exact capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub index: usize,
    pub capacity_units: u64,
    pub tokens: Vec<MeasureToken>,
}

struct SignatureChange {
    start_unit: u64,
    capacity_units: u64,
}

/// Partition the event stream into exactly-full measures.
///
/// `events` must be strictly sequential in grid units (the chord
/// grouper's postcondition).
pub fn segment(events: &[QuantizedEvent], seq: &NoteSequence) -> Result<Vec<Measure>> {
    let changes = signature_changes(seq)?;
    let mut segmenter = Segmenter::new(changes);

    for event in events {
        debug_assert!(event.start_unit >= segmenter.cursor, "stream not sequential");
        segmenter.fill_rests(event.start_unit);
        segmenter.place(event.clone());
    }

    let total_units = quantize::units_at(seq, seq.total_time).max(segmenter.cursor);
    segmenter.fill_rests(total_units);
    segmenter.pad_final_measure();

    Ok(segmenter.measures)
}

/// Measure capacities in grid units, keyed by the grid position where
/// each signature takes effect.
fn signature_changes(seq: &NoteSequence) -> Result<Vec<SignatureChange>> {
    let mut changes = Vec::with_capacity(seq.time_signatures.len());
    for ts in &seq.time_signatures {
        let denominator = ts.denominator as u64;
        if denominator > UNITS_PER_WHOLE || UNITS_PER_WHOLE % denominator != 0 {
            return Err(Error::UnsupportedTimeSignature {
                numerator: ts.numerator,
                denominator: ts.denominator,
            });
        }
        changes.push(SignatureChange {
            start_unit: quantize::units_at(seq, ts.time),
            capacity_units: ts.numerator as u64 * (UNITS_PER_WHOLE / denominator),
        });
    }
    // Normalization guarantees order by time; re-assert in units and
    // let a later signature at the same position win
    changes.sort_by_key(|c| c.start_unit);
    changes.dedup_by(|later, earlier| {
        if later.start_unit == earlier.start_unit {
            earlier.capacity_units = later.capacity_units;
            true
        } else {
            false
        }
    });
    Ok(changes)
}

struct Segmenter {
    measures: Vec<Measure>,
    changes: Vec<SignatureChange>,
    sig_idx: usize,
    tokens: Vec<MeasureToken>,
    capacity: u64,
    used: u64,
    cursor: u64,
}

impl Segmenter {
    fn new(changes: Vec<SignatureChange>) -> Self {
        let capacity = changes
            .first()
            .map(|c| c.capacity_units)
            .unwrap_or(UNITS_PER_WHOLE);
        Segmenter {
            measures: Vec::new(),
            changes,
            sig_idx: 0,
            tokens: Vec::new(),
            capacity,
            used: 0,
            cursor: 0,
        }
    }

    fn remaining(&self) -> u64 {
        self.capacity - self.used
    }

    fn push_token(&mut self, token: MeasureToken) {
        self.used += token.duration_units();
        self.tokens.push(token);
        if self.used == self.capacity {
            self.close_measure();
        }
    }

    fn close_measure(&mut self) {
        debug_assert_eq!(
            self.tokens.iter().map(|t| t.duration_units()).sum::<u64>(),
            self.capacity
        );
        self.measures.push(Measure {
            index: self.measures.len(),
            capacity_units: self.capacity,
            tokens: std::mem::take(&mut self.tokens),
        });
        self.used = 0;

        // A signature boundary inside the closed measure takes effect
        // from the next one
        while self.sig_idx + 1 < self.changes.len()
            && self.changes[self.sig_idx + 1].start_unit <= self.cursor
        {
            self.sig_idx += 1;
        }
        if let Some(change) = self.changes.get(self.sig_idx) {
            self.capacity = change.capacity_units;
        }
    }

    /// Fill rests up to `until`, chunked at beat and bar boundaries.
    fn fill_rests(&mut self, until: u64) {
        while self.cursor < until {
            let next_beat = (self.cursor / UNITS_PER_QUARTER + 1) * UNITS_PER_QUARTER;
            let chunk = (until - self.cursor)
                .min(self.remaining())
                .min(next_beat - self.cursor);
            self.cursor += chunk;
            self.push_token(MeasureToken::Rest {
                duration_units: chunk,
            });
        }
    }

    /// Append an event, splitting it into tied fragments wherever it
    /// crosses a bar line.
    fn place(&mut self, mut event: QuantizedEvent) {
        loop {
            let remaining = self.remaining();
            if event.duration_units <= remaining {
                self.cursor += event.duration_units;
                self.push_token(MeasureToken::Note(event));
                return;
            }

            let mut head = event.clone();
            head.duration_units = remaining;
            head.tie_end = true;

            event.start_unit += remaining;
            event.duration_units -= remaining;
            event.tie_start = true;

            self.cursor += remaining;
            self.push_token(MeasureToken::Note(head));
        }
    }

    fn pad_final_measure(&mut self) {
        if self.used > 0 {
            let target = self.cursor + self.remaining();
            self.fill_rests(target);
        }
    }
}
