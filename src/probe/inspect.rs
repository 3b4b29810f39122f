use std::future::Future;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::analyze::StreamMonitor;
use crate::camera::{Connector, MediaKind, MediaSession, TransportError};
use crate::stats::nal::summarize;
use crate::stats::SequenceEvent;

/// Live view of one stream until `shutdown` resolves. Returns packets seen.
///
/// Every `report_interval` the frame-type counts since the previous report
/// are logged and reset.
pub async fn inspect_stream<C, S>(
    connector: &C,
    url: &str,
    report_interval: Duration,
    shutdown: S,
) -> Result<u64, TransportError>
where
    C: Connector,
    S: Future<Output = ()> + Send,
{
    let mut session = connector.connect(url).await?;
    for track in session.tracks() {
        tracing::info!(
            track = track.index,
            kind = ?track.kind,
            encoding = %track.encoding,
            clock_rate = track.clock_rate,
            "described track"
        );
    }
    session.setup_all().await?;
    session.play().await?;
    tracing::info!(url, "playing");

    let mut monitor = StreamMonitor::new(session.tracks().to_vec());
    let report_interval = report_interval.max(Duration::from_secs(1));
    let mut report = interval_at(Instant::now() + report_interval, report_interval);
    report.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);
    let mut live = true;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = report.tick() => {
                let counts = monitor.take_counts();
                tracing::info!(packets = monitor.packets(), "frame types: {}", summarize(&counts));
            }
            next = session.next_packet(), if live => match next {
                Some(Ok(pkt)) => {
                    if let SequenceEvent::Lost { expected, received, missing } = monitor.on_packet(&pkt) {
                        tracing::warn!(track = pkt.track, expected, received, missing, "packet loss");
                    }
                    if monitor.track_kind(pkt.track) == Some(MediaKind::Application) {
                        for line in extract_metadata(&pkt.payload).unwrap_or_default() {
                            tracing::info!(track = pkt.track, "metadata: {}", line);
                        }
                    }
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "stream failed");
                    live = false;
                }
                None => {
                    tracing::warn!("stream ended");
                    live = false;
                }
            },
        }
    }

    for (track, est) in monitor.track_loss() {
        tracing::info!(
            track,
            received = est.received(),
            lost = est.lost(),
            "loss rate {:.2}%",
            est.loss_rate_percent()
        );
    }
    tracing::info!(packets = monitor.packets(), lost = monitor.lost(), "inspection stopped");
    Ok(monitor.packets())
}

/// Split an XML-bearing payload into one line per element tag.
///
/// Anything before the first `<` is binary framing and skipped.
pub fn extract_metadata(payload: &[u8]) -> Option<Vec<String>> {
    let start = payload.iter().position(|&b| b == b'<')?;
    let text = String::from_utf8_lossy(&payload[start..]);
    let lines = text
        .split('>')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(|piece| format!("{piece}>"))
        .collect();
    Some(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::fake::{packet, FailAt, Script, ScriptedConnector};
    use crate::camera::TrackInfo;

    const URL: &str = "rtsp://cam/door";

    #[test]
    fn test_metadata_lines() {
        let payload = b"\x00\x01junk<tt:MetadataStream><tt:Event>motion</tt:Event></tt:MetadataStream>";
        let lines = extract_metadata(payload).unwrap();
        assert_eq!(
            lines,
            vec![
                "<tt:MetadataStream>",
                "<tt:Event>",
                "motion</tt:Event>",
                "</tt:MetadataStream>",
            ]
        );
    }

    #[test]
    fn test_metadata_without_markup() {
        assert_eq!(extract_metadata(b"\x80\x60binary"), None);
        assert_eq!(extract_metadata(b"<").unwrap(), vec!["<>"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_until_shutdown() {
        let mut script = Script::video(vec![
            packet(0, 1, 0, &[0x65]),
            packet(0, 2, 0, &[0x41]),
            packet(0, 5, 0, &[0x41]),
            packet(1, 1, 0, b"<a>"),
        ]);
        script.tracks.push(TrackInfo {
            index: 1,
            kind: MediaKind::Application,
            encoding: "vnd.onvif.metadata".into(),
            clock_rate: 90_000,
        });
        let connector = ScriptedConnector::new().with(URL, script);

        let start = Instant::now();
        let shutdown = tokio::time::sleep(Duration::from_secs(65));
        let packets = inspect_stream(&connector, URL, Duration::from_secs(20), shutdown)
            .await
            .unwrap();
        assert_eq!(packets, 4);
        assert_eq!(start.elapsed(), Duration::from_secs(65));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ended_stream_waits_for_shutdown() {
        let mut script = Script::video(vec![packet(0, 1, 0, &[0x41])]);
        script.ends = true;
        let connector = ScriptedConnector::new().with(URL, script);

        let start = Instant::now();
        let shutdown = tokio::time::sleep(Duration::from_secs(3));
        let packets = inspect_stream(&connector, URL, Duration::from_secs(1), shutdown)
            .await
            .unwrap();
        assert_eq!(packets, 1);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_failure_propagates() {
        let connector = ScriptedConnector::new().with(URL, Script::failing(FailAt::Play));
        let err = inspect_stream(&connector, URL, Duration::from_secs(1), std::future::pending::<()>())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), "play");
    }
}
