use bytes::Bytes;
use rtp::codecs::h264::H264Packet;
use rtp::packetizer::Depacketizer;

/// Reassembles H.264 NAL units from RTP payloads (single NAL, STAP-A, FU-A).
#[derive(Debug, Default)]
pub struct H264Depacketizer {
    inner: H264Packet,
}

impl H264Depacketizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// NAL units completed by this payload, without start codes.
    ///
    /// Mid-fragment payloads yield nothing; undecodable payloads are dropped.
    pub fn push(&mut self, payload: &Bytes) -> Vec<Bytes> {
        match self.inner.depacketize(payload) {
            Ok(annex_b) => split_annex_b(&annex_b),
            Err(e) => {
                tracing::trace!(error = %e, "dropping undecodable payload");
                Vec::new()
            }
        }
    }
}

/// Split an Annex-B byte stream on `00 00 01` / `00 00 00 01` start codes.
pub fn split_annex_b(data: &Bytes) -> Vec<Bytes> {
    let mut units = Vec::new();
    let mut start: Option<usize> = None;
    let mut i = 0;

    while i + 3 <= data.len() {
        if data[i] == 0 && data[i + 1] == 0 && data[i + 2] == 1 {
            if let Some(begin) = start {
                push_trimmed(&mut units, data, begin, i);
            }
            i += 3;
            start = Some(i);
        } else {
            i += 1;
        }
    }

    if let Some(begin) = start {
        push_trimmed(&mut units, data, begin, data.len());
    }
    units
}

fn push_trimmed(units: &mut Vec<Bytes>, data: &Bytes, begin: usize, mut end: usize) {
    // leading zero of a four-byte start code belongs to the next code
    while end > begin && data[end - 1] == 0 {
        end -= 1;
    }
    if end > begin {
        units.push(data.slice(begin..end));
    }
}
