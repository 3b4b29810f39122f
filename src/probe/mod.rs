//! Per-stream tasks: one per CLI variant.

mod analyze;
mod health;
mod inspect;
mod record;

use std::time::Duration;

use tokio::time::Instant;

use crate::camera::{Connector, MediaSession, RtpPacket, TransportError};

pub use analyze::analyze_stream;
pub use health::check_stream;
pub use inspect::inspect_stream;
pub use record::record_stream;

/// Connect, set up every track and start playback.
async fn start_session<C: Connector>(
    connector: &C,
    url: &str,
) -> Result<C::Session, TransportError> {
    let mut session = connector.connect(url).await?;
    session.setup_all().await?;
    session.play().await?;
    Ok(session)
}

/// Feed packets to `on_packet` until `window` has elapsed.
///
/// The window is fixed. If the stream ends or fails early the remaining
/// time is waited out without data.
async fn observe_for<S, F>(session: &mut S, window: Duration, mut on_packet: F) -> Duration
where
    S: MediaSession,
    F: FnMut(&RtpPacket) + Send,
{
    let start = Instant::now();
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);
    let mut live = true;

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            next = session.next_packet(), if live => match next {
                Some(Ok(pkt)) => on_packet(&pkt),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "stream failed inside observation window");
                    live = false;
                }
                None => {
                    tracing::debug!("stream ended inside observation window");
                    live = false;
                }
            },
        }
    }

    start.elapsed()
}
