//! Chord grouping and stream merging.
//!
//! Events sharing an (instrument, start) merge into one chord; the
//! per-instrument streams then merge into the single token stream the
//! output grammar calls for. Two lossy, documented simplifications:
//! a chord sustains as long as its longest member, and an event whose
//! start falls inside its predecessor's span is pushed forward to the
//! predecessor's end so the stream stays strictly sequential.

use std::collections::BTreeMap;

use tracing::debug;

use crate::quantize::QuantizedEvent;

/// Merge quantized note candidates into a sequential chord stream.
pub fn group_chords(events: Vec<QuantizedEvent>) -> Vec<QuantizedEvent> {
    // Chord merge per (instrument, start)
    let mut by_onset: BTreeMap<(usize, u64), QuantizedEvent> = BTreeMap::new();
    for event in events {
        match by_onset.entry((event.instrument, event.start_unit)) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(event);
            }
            std::collections::btree_map::Entry::Occupied(mut slot) => {
                let chord = slot.get_mut();
                chord.pitches.extend(event.pitches);
                chord.duration_units = chord.duration_units.max(event.duration_units);
            }
        }
    }

    // Monophonic-per-track: push an overlapping start to the previous end
    let mut per_instrument: BTreeMap<usize, Vec<QuantizedEvent>> = BTreeMap::new();
    for ((instrument, _), event) in by_onset {
        per_instrument.entry(instrument).or_default().push(event);
    }
    let mut pushed = 0usize;
    for stream in per_instrument.values_mut() {
        resolve_overlaps(stream, &mut pushed);
    }

    // Merge instrument streams into one; starts shared across
    // instruments union into a single chord
    let mut merged: BTreeMap<u64, QuantizedEvent> = BTreeMap::new();
    for event in per_instrument.into_values().flatten() {
        match merged.entry(event.start_unit) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(event);
            }
            std::collections::btree_map::Entry::Occupied(mut slot) => {
                let chord = slot.get_mut();
                chord.pitches.extend(event.pitches);
                chord.duration_units = chord.duration_units.max(event.duration_units);
            }
        }
    }

    let mut stream: Vec<QuantizedEvent> = merged.into_values().collect();
    resolve_overlaps(&mut stream, &mut pushed);
    if pushed > 0 {
        debug!(pushed, "overlapping starts pushed to the previous event's end");
    }

    for event in &mut stream {
        event.pitches.sort_unstable();
        event.pitches.dedup();
    }
    stream
}

fn resolve_overlaps(stream: &mut [QuantizedEvent], pushed: &mut usize) {
    let mut cursor = 0u64;
    for event in stream.iter_mut() {
        if event.start_unit < cursor {
            event.start_unit = cursor;
            *pushed += 1;
        }
        cursor = event.end_unit();
    }
}
