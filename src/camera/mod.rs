#[cfg(test)]
pub mod fake;
mod h264;
mod rtsp;
mod session;

pub use h264::H264Depacketizer;
pub use rtsp::RtspConnector;
pub use session::{Connector, MediaKind, MediaSession, RtpPacket, TrackInfo, TransportError};
