use std::fmt;

use serde::Serialize;

use crate::config::StreamTarget;

/// Per-stream analysis result, produced once at the end of the window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamStat {
    pub name: String,
    pub url: String,
    pub total_packets: u64,
    pub loss_count: u64,
    pub loss_rate_percent: f64,
    pub key_frame_count: u64,
    pub has_sps: bool,
    pub has_pps: bool,
    pub bitrate_kbps: f64,
    pub nal_summary: String,
}

impl StreamStat {
    /// Zeroed stat for a stream that never reached playback.
    pub fn empty(target: &StreamTarget) -> Self {
        Self {
            name: target.name.clone(),
            url: target.url.clone(),
            total_packets: 0,
            loss_count: 0,
            loss_rate_percent: 0.0,
            key_frame_count: 0,
            has_sps: false,
            has_pps: false,
            bitrate_kbps: 0.0,
            nal_summary: super::nal::NO_UNITS_MARKER.to_string(),
        }
    }
}

impl fmt::Display for StreamStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] Packets- {} / Loss- {} ({:.2}%) / Bitrate- {:.1} kbps / KeyFrames- {} / NAL- {}",
            self.name,
            self.total_packets,
            self.loss_count,
            self.loss_rate_percent,
            self.bitrate_kbps,
            self.key_frame_count,
            self.nal_summary
        )
    }
}

/// Outcome of a reachability check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub url: String,
    pub success: bool,
    pub message: String,
}

impl CheckResult {
    pub fn failed(target: &StreamTarget, message: impl Into<String>) -> Self {
        Self {
            name: target.name.clone(),
            url: target.url.clone(),
            success: false,
            message: message.into(),
        }
    }

    pub fn passed(target: &StreamTarget, packets: u64) -> Self {
        Self {
            name: target.name.clone(),
            url: target.url.clone(),
            success: true,
            message: format!("receiving ({packets} packets)"),
        }
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "OK" } else { "FAIL" };
        write!(f, "[{}] {} {} ({})", self.name, status, self.message, self.url)
    }
}

/// Totals over every task of one pooled run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub streams: usize,
    pub healthy: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, healthy: bool) {
        self.streams += 1;
        if healthy {
            self.healthy += 1;
        } else {
            self.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> StreamTarget {
        StreamTarget {
            name: "lobby".into(),
            url: "rtsp://cam/1".into(),
        }
    }

    #[test]
    fn test_stat_line() {
        let stat = StreamStat {
            total_packets: 99,
            loss_count: 1,
            loss_rate_percent: 1.0,
            key_frame_count: 2,
            bitrate_kbps: 100.0,
            nal_summary: "IDR:2".into(),
            ..StreamStat::empty(&target())
        };
        assert_eq!(
            stat.to_string(),
            "[lobby] Packets- 99 / Loss- 1 (1.00%) / Bitrate- 100.0 kbps / KeyFrames- 2 / NAL- IDR:2"
        );
    }

    #[test]
    fn test_empty_stat_has_marker() {
        let stat = StreamStat::empty(&target());
        assert_eq!(stat.nal_summary, "(no NALs)");
        let json = serde_json::to_value(&stat).unwrap();
        assert_eq!(json["name"], "lobby");
        assert_eq!(json["total_packets"], 0);
    }

    #[test]
    fn test_check_result_json() {
        let results = vec![
            CheckResult::passed(&target(), 12),
            CheckResult::failed(&target(), "no RTP received"),
        ];
        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json[0]["success"], true);
        assert_eq!(json[0]["message"], "receiving (12 packets)");
        assert_eq!(json[1]["success"], false);
        assert_eq!(json[1]["url"], "rtsp://cam/1");
    }

    #[test]
    fn test_run_summary() {
        let mut summary = RunSummary::default();
        summary.record(true);
        summary.record(false);
        summary.record(true);
        assert_eq!(
            summary,
            RunSummary {
                streams: 3,
                healthy: 2,
                failed: 1
            }
        );
    }
}
