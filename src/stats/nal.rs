use std::collections::BTreeMap;
use std::fmt::Write;

use bytes::Bytes;

pub const NAL_TYPE_MASK: u8 = 0x1F;

pub const NAL_NON_IDR_SLICE: u8 = 1;
pub const NAL_IDR_SLICE: u8 = 5;
pub const NAL_SPS: u8 = 7;
pub const NAL_PPS: u8 = 8;

/// Rendered in place of a summary when nothing was observed.
pub const NO_UNITS_MARKER: &str = "(no NALs)";

const NAL_LABELS: &[(u8, &str)] = &[
    (0, "RES"),
    (1, "P"),
    (5, "IDR"),
    (6, "SEI"),
    (7, "SPS"),
    (8, "PPS"),
    (24, "STAP-A"),
    (27, "FU-B"),
    (28, "FU-A"),
];

pub fn nal_type(first_byte: u8) -> u8 {
    first_byte & NAL_TYPE_MASK
}

pub fn nal_label(nal_type: u8) -> Option<&'static str> {
    NAL_LABELS
        .iter()
        .find(|(code, _)| *code == nal_type)
        .map(|(_, label)| *label)
}

/// Slice types that are written to a segment as frame payloads.
pub fn is_slice(nal_type: u8) -> bool {
    nal_type == NAL_IDR_SLICE || nal_type == NAL_NON_IDR_SLICE
}

/// Counts coded units by type and remembers the latest parameter sets.
///
/// Classification looks only at the first byte of whatever it is handed.
/// Fed raw RTP payloads, a fragmented unit is therefore counted under its
/// fragmentation type (FU-A) and not the type it carries.
#[derive(Debug, Clone, Default)]
pub struct FrameTypeAccumulator {
    counts: BTreeMap<u8, u64>,
    key_frames: u64,
    saw_key_frame: bool,
    latest_sps: Option<Bytes>,
    latest_pps: Option<Bytes>,
}

impl FrameTypeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one unit. Empty units are ignored and yield `None`.
    pub fn observe(&mut self, unit: &Bytes) -> Option<u8> {
        let first = *unit.first()?;
        let kind = nal_type(first);

        *self.counts.entry(kind).or_insert(0) += 1;
        match kind {
            NAL_IDR_SLICE => {
                self.key_frames += 1;
                self.saw_key_frame = true;
            }
            NAL_SPS => self.latest_sps = Some(unit.clone()),
            NAL_PPS => self.latest_pps = Some(unit.clone()),
            _ => {}
        }

        Some(kind)
    }

    #[cfg(test)]
    pub fn count(&self, nal_type: u8) -> u64 {
        self.counts.get(&nal_type).copied().unwrap_or(0)
    }

    pub fn key_frames(&self) -> u64 {
        self.key_frames
    }

    pub fn saw_key_frame(&self) -> bool {
        self.saw_key_frame
    }

    pub fn has_sps(&self) -> bool {
        self.latest_sps.is_some()
    }

    pub fn has_pps(&self) -> bool {
        self.latest_pps.is_some()
    }

    /// Both parameter sets and a key frame have been seen at least once.
    pub fn is_decodable(&self) -> bool {
        self.has_sps() && self.has_pps() && self.saw_key_frame()
    }

    /// The most recent SPS and PPS, once both exist.
    pub fn parameter_sets(&self) -> Option<(&Bytes, &Bytes)> {
        Some((self.latest_sps.as_ref()?, self.latest_pps.as_ref()?))
    }

    /// Hand off the current counts and start a fresh interval.
    ///
    /// Parameter sets and the key-frame flag are stream history and survive.
    pub fn take_counts(&mut self) -> BTreeMap<u8, u64> {
        std::mem::take(&mut self.counts)
    }

    pub fn summary(&self) -> String {
        summarize(&self.counts)
    }
}

/// `label:count` pairs ordered by type, e.g. `IDR:2, SPS:1, FU-A:40`.
pub fn summarize(counts: &BTreeMap<u8, u64>) -> String {
    if counts.is_empty() {
        return NO_UNITS_MARKER.to_string();
    }

    let mut out = String::new();
    for (i, (kind, count)) in counts.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        match nal_label(*kind) {
            Some(label) => {
                let _ = write!(out, "{label}:{count}");
            }
            None => {
                let _ = write!(out, "NAL{kind}:{count}");
            }
        }
    }
    out
}
