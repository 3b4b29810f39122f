use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::camera::{Connector, MediaKind, MediaSession, RtpPacket, TrackInfo, TransportError};
use crate::config::StreamTarget;
use crate::stats::{
    loss_rate_percent, BitrateMeter, FrameTypeAccumulator, SequenceEvent, SequenceLossEstimator,
    StreamStat,
};

/// State bundle of one monitored stream. Owned by its task alone.
#[derive(Debug)]
pub struct StreamMonitor {
    tracks: Vec<TrackInfo>,
    loss: HashMap<usize, SequenceLossEstimator>,
    units: FrameTypeAccumulator,
    bitrate: BitrateMeter,
    packets: u64,
}

impl StreamMonitor {
    pub fn new(tracks: Vec<TrackInfo>) -> Self {
        Self {
            tracks,
            loss: HashMap::new(),
            units: FrameTypeAccumulator::new(),
            bitrate: BitrateMeter::new(),
            packets: 0,
        }
    }

    pub fn track_kind(&self, track: usize) -> Option<MediaKind> {
        self.tracks.get(track).map(|t| t.kind)
    }

    /// Account for one delivered packet.
    ///
    /// Video payloads are classified by their first byte as delivered, so
    /// fragments count as FU-A.
    pub fn on_packet(&mut self, pkt: &RtpPacket) -> SequenceEvent {
        self.packets += 1;
        self.bitrate.add(pkt.payload.len());

        let event = self
            .loss
            .entry(pkt.track)
            .or_insert_with(SequenceLossEstimator::new)
            .observe(pkt.sequence_number);

        if self.track_kind(pkt.track) == Some(MediaKind::Video) {
            self.units.observe(&pkt.payload);
        }
        event
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }

    pub fn lost(&self) -> u64 {
        self.loss.values().map(|est| est.lost()).sum()
    }

    pub fn bytes(&self) -> u64 {
        self.bitrate.total_bytes()
    }

    /// Loss estimators by track index, ascending.
    pub fn track_loss(&self) -> Vec<(usize, &SequenceLossEstimator)> {
        let mut tracks: Vec<_> = self.loss.iter().map(|(track, est)| (*track, est)).collect();
        tracks.sort_by_key(|(track, _)| *track);
        tracks
    }

    /// Counts since the last call; stream history is kept.
    pub fn take_counts(&mut self) -> BTreeMap<u8, u64> {
        self.units.take_counts()
    }

    pub fn finish(&self, target: &StreamTarget, elapsed: Duration) -> StreamStat {
        let lost = self.lost();
        StreamStat {
            name: target.name.clone(),
            url: target.url.clone(),
            total_packets: self.packets,
            loss_count: lost,
            loss_rate_percent: loss_rate_percent(self.packets, lost),
            key_frame_count: self.units.key_frames(),
            has_sps: self.units.has_sps(),
            has_pps: self.units.has_pps(),
            bitrate_kbps: self.bitrate.kbps(elapsed),
            nal_summary: self.units.summary(),
        }
    }
}

/// Observe one stream for `window` and compute its health figures.
pub async fn analyze_stream<C: Connector>(
    connector: &C,
    target: &StreamTarget,
    window: Duration,
) -> Result<StreamStat, TransportError> {
    let mut session = super::start_session(connector, &target.url)
        .await
        .inspect_err(|e| {
            tracing::error!(stream = %target.name, stage = e.stage(), error = %e, "analysis aborted");
        })?;

    let mut monitor = StreamMonitor::new(session.tracks().to_vec());
    let elapsed = super::observe_for(&mut session, window, |pkt| {
        monitor.on_packet(pkt);
    })
    .await;
    tracing::debug!(
        stream = %target.name,
        packets = monitor.packets(),
        bytes = monitor.bytes(),
        "observation window closed"
    );

    Ok(monitor.finish(target, elapsed))
}
