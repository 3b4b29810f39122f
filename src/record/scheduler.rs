use std::io;

use bytes::Bytes;
use thiserror::Error;

use super::gate::{Emission, HeaderGate};
use crate::camera::TransportError;
use crate::stats::FrameTypeAccumulator;

/// Presentation timestamps run on a 90 kHz clock.
pub const PTS_CLOCK_HZ: i64 = 90_000;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to open segment {index}: {source}")]
    SegmentOpen { index: u32, source: io::Error },
    #[error("failed to write to segment {index}: {source}")]
    Write { index: u32, source: io::Error },
    #[error("failed to close segment {index}: {source}")]
    Close { index: u32, source: io::Error },
    #[error("no H.264 video track in session")]
    NoVideoTrack,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Container writer for one segment.
pub trait UnitWriter {
    fn write_unit(&mut self, unit: &[u8], pts: i64) -> io::Result<()>;

    /// Flush and release the underlying resource.
    fn finish(&mut self) -> io::Result<()>;
}

/// Allocates the output resource for each segment.
pub trait SegmentOpener {
    type Writer: UnitWriter;

    fn open(&mut self, index: u32) -> io::Result<Self::Writer>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitOutcome {
    /// Empty unit, nothing to classify.
    Empty,
    /// Gate not yet open; dropped without error.
    Withheld,
    Written { headers: bool, frame: bool },
}

struct OpenSegment<W> {
    index: u32,
    writer: W,
    gate: HeaderGate,
}

/// Splits one stream into PTS-aligned segments and gates what goes in them.
///
/// `base_pts` and the unit history are stream-scoped; the writer and the
/// header gate belong to the open segment and are replaced on rotation.
pub struct SegmentScheduler<O: SegmentOpener> {
    opener: O,
    /// `None` when rotation is disabled.
    duration_units: Option<i64>,
    base_pts: Option<i64>,
    current: Option<OpenSegment<O::Writer>>,
    history: FrameTypeAccumulator,
    segments_opened: u32,
    frames_written: u64,
}

impl<O: SegmentOpener> SegmentScheduler<O> {
    /// `segment_secs <= 0` writes a single unbounded segment.
    pub fn new(opener: O, segment_secs: i64) -> Self {
        let duration_units = (segment_secs > 0).then(|| segment_secs * PTS_CLOCK_HZ);
        Self {
            opener,
            duration_units,
            base_pts: None,
            current: None,
            history: FrameTypeAccumulator::new(),
            segments_opened: 0,
            frames_written: 0,
        }
    }

    pub fn base_pts(&self) -> Option<i64> {
        self.base_pts
    }

    pub fn segment_index(&self) -> Option<u32> {
        self.current.as_ref().map(|s| s.index)
    }

    pub fn history(&self) -> &FrameTypeAccumulator {
        &self.history
    }

    pub fn segments_opened(&self) -> u32 {
        self.segments_opened
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Account for a new frame at `pts`, opening or rotating the segment.
    ///
    /// Must precede the [`write_unit`](Self::write_unit) calls for the frame.
    /// A [`RecordError::Close`] means the previous segment failed to flush;
    /// the next segment is already open and recording can go on.
    pub fn begin_frame(&mut self, pts: i64) -> Result<(), RecordError> {
        let base = *self.base_pts.get_or_insert(pts);

        let Some(segment) = &self.current else {
            return self.open_segment(1);
        };

        let Some(duration) = self.duration_units else {
            return Ok(());
        };

        let index = segment.index;
        if pts >= base + duration * i64::from(index) {
            let closed = self.close_current();
            self.open_segment(index + 1)?;
            closed?;
        }
        Ok(())
    }

    /// Fold `unit` into the stream history and write what the gate admits.
    pub fn write_unit(&mut self, unit: &Bytes, pts: i64) -> Result<UnitOutcome, RecordError> {
        let Some(nal_type) = self.history.observe(unit) else {
            return Ok(UnitOutcome::Empty);
        };
        let Some(segment) = self.current.as_mut() else {
            return Ok(UnitOutcome::Withheld);
        };

        match segment.gate.admit(&self.history, nal_type) {
            Emission::Withheld => Ok(UnitOutcome::Withheld),
            Emission::Write { headers, frame } => {
                let index = segment.index;
                let wrote_headers = headers.is_some();
                if let Some((sps, pps)) = headers {
                    segment
                        .writer
                        .write_unit(&sps, pts)
                        .and_then(|()| segment.writer.write_unit(&pps, pts))
                        .map_err(|source| RecordError::Write { index, source })?;
                    segment.gate.mark_headers_written();
                }
                if frame {
                    segment
                        .writer
                        .write_unit(unit, pts)
                        .map_err(|source| RecordError::Write { index, source })?;
                    self.frames_written += 1;
                }
                Ok(UnitOutcome::Written {
                    headers: wrote_headers,
                    frame,
                })
            }
        }
    }

    /// Close the open segment, if any.
    pub fn finish(mut self) -> Result<(), RecordError> {
        self.close_current()
    }

    fn open_segment(&mut self, index: u32) -> Result<(), RecordError> {
        let writer = self
            .opener
            .open(index)
            .map_err(|source| RecordError::SegmentOpen { index, source })?;
        tracing::info!(segment = index, "opened segment");
        self.current = Some(OpenSegment {
            index,
            writer,
            gate: HeaderGate::new(),
        });
        self.segments_opened += 1;
        Ok(())
    }

    fn close_current(&mut self) -> Result<(), RecordError> {
        let Some(mut segment) = self.current.take() else {
            return Ok(());
        };
        let index = segment.index;
        segment
            .writer
            .finish()
            .map_err(|source| RecordError::Close { index, source })?;
        tracing::info!(segment = index, "closed segment");
        Ok(())
    }
}
