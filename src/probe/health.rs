use std::time::Duration;

use crate::camera::Connector;
use crate::config::StreamTarget;
use crate::stats::CheckResult;

/// Reachability check: the stream passes if any RTP arrives within `window`.
pub async fn check_stream<C: Connector>(
    connector: &C,
    target: &StreamTarget,
    window: Duration,
) -> CheckResult {
    tracing::debug!(stream = %target.name, "connecting");
    let mut session = match super::start_session(connector, &target.url).await {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(stream = %target.name, stage = e.stage(), error = %e, "health check failed");
            return CheckResult::failed(target, e.to_string());
        }
    };
    tracing::debug!(stream = %target.name, "playing, waiting for RTP");

    let mut packets = 0u64;
    super::observe_for(&mut session, window, |_| packets += 1).await;

    if packets == 0 {
        CheckResult::failed(target, "no RTP received")
    } else {
        CheckResult::passed(target, packets)
    }
}
