use bytes::Bytes;

use crate::stats::nal::{is_slice, FrameTypeAccumulator};

/// What a unit turns into inside the current segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emission {
    /// The stream has not yet produced SPS, PPS and a key frame.
    Withheld,
    Write {
        /// Parameter sets to lead the segment with, in SPS, PPS order.
        headers: Option<(Bytes, Bytes)>,
        /// Whether the unit itself is a slice to write.
        frame: bool,
    },
}

/// Segment-scoped part of the emission policy.
///
/// The decodability flags it consults live in the stream history and are
/// never reset; this gate only remembers whether the current segment has
/// received its leading parameter sets. A new gate is created per segment.
#[derive(Debug, Default)]
pub struct HeaderGate {
    headers_written: bool,
}

impl HeaderGate {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn headers_written(&self) -> bool {
        self.headers_written
    }

    /// Record that the offered parameter sets reached the segment.
    pub fn mark_headers_written(&mut self) {
        self.headers_written = true;
    }

    /// Decide the writes for a unit of `nal_type`, already folded into `history`.
    ///
    /// Headers are offered on every admitted unit until
    /// [`mark_headers_written`](Self::mark_headers_written) is called.
    pub fn admit(&self, history: &FrameTypeAccumulator, nal_type: u8) -> Emission {
        if !history.is_decodable() {
            return Emission::Withheld;
        }

        let headers = if self.headers_written {
            None
        } else {
            history
                .parameter_sets()
                .map(|(sps, pps)| (sps.clone(), pps.clone()))
        };

        Emission::Write {
            headers,
            frame: is_slice(nal_type),
        }
    }
}
