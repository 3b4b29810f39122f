use std::future::Future;

use crate::camera::{Connector, H264Depacketizer, MediaSession};
use crate::record::{RecordError, SegmentOpener, SegmentScheduler, UnitOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSummary {
    pub segments: u32,
    pub frames: u64,
    pub nal_summary: String,
}

/// Extends 32-bit RTP timestamps so PTS stays monotonic across wraparound.
#[derive(Debug, Default)]
struct PtsExtender {
    last: Option<(u32, i64)>,
}

impl PtsExtender {
    fn extend(&mut self, timestamp: u32) -> i64 {
        let pts = match self.last {
            None => i64::from(timestamp),
            Some((prev, prev_pts)) => {
                prev_pts + i64::from(timestamp.wrapping_sub(prev) as i32)
            }
        };
        self.last = Some((timestamp, pts));
        pts
    }
}

/// Record the first H.264 track of `url` until `shutdown` resolves.
///
/// A segment that cannot be opened ends the recording with an error. Unit
/// write and segment flush failures are logged and the stream continues.
pub async fn record_stream<C, O, S>(
    connector: &C,
    url: &str,
    mut scheduler: SegmentScheduler<O>,
    shutdown: S,
) -> Result<RecordSummary, RecordError>
where
    C: Connector,
    O: SegmentOpener + Send,
    O::Writer: Send,
    S: Future<Output = ()> + Send,
{
    let mut session = connector.connect(url).await?;
    let video = session
        .tracks()
        .iter()
        .find(|t| t.is_h264())
        .map(|t| t.index)
        .ok_or(RecordError::NoVideoTrack)?;
    session.setup_all().await?;
    session.play().await?;
    tracing::info!(url, track = video, "recording");

    let mut depack = H264Depacketizer::new();
    let mut pts = PtsExtender::default();
    tokio::pin!(shutdown);

    loop {
        let next = tokio::select! {
            _ = &mut shutdown => break,
            next = session.next_packet() => next,
        };
        let pkt = match next {
            Some(Ok(pkt)) => pkt,
            Some(Err(e)) => {
                tracing::error!(error = %e, "stream failed, waiting for shutdown");
                shutdown.as_mut().await;
                break;
            }
            None => {
                tracing::warn!("stream ended, waiting for shutdown");
                shutdown.as_mut().await;
                break;
            }
        };

        if pkt.track != video {
            continue;
        }
        let units = depack.push(&pkt.payload);
        if units.is_empty() {
            continue;
        }

        let frame_pts = pts.extend(pkt.timestamp);
        match scheduler.begin_frame(frame_pts) {
            Ok(()) => {}
            Err(e @ RecordError::Close { .. }) => {
                tracing::error!(error = %e, "previous segment may be truncated")
            }
            Err(e) => return Err(e),
        }
        for unit in &units {
            match scheduler.write_unit(unit, frame_pts) {
                Ok(UnitOutcome::Withheld) => {
                    tracing::trace!("waiting for parameter sets and key frame")
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(segment = ?scheduler.segment_index(), error = %e, "dropping unit"),
            }
        }
    }

    let summary = RecordSummary {
        segments: scheduler.segments_opened(),
        frames: scheduler.frames_written(),
        nal_summary: scheduler.history().summary(),
    };
    let scheduler_base = scheduler.base_pts();
    scheduler.finish()?;
    tracing::info!(
        segments = summary.segments,
        frames = summary.frames,
        base_pts = ?scheduler_base,
        "recording stopped: {}",
        summary.nal_summary
    );
    Ok(summary)
}
