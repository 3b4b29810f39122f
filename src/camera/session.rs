use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("describe failed: {0}")]
    Describe(String),
    #[error("setup failed for track {track}: {reason}")]
    Setup { track: usize, reason: String },
    #[error("play failed: {0}")]
    Play(String),
    #[error("stream error: {0}")]
    Stream(String),
    #[error("session not in a state that allows {0}")]
    State(&'static str),
}

impl TransportError {
    /// Session stage that failed, for one-line reports.
    pub fn stage(&self) -> &'static str {
        match self {
            TransportError::InvalidUrl(_) => "url parse",
            TransportError::Describe(_) => "describe",
            TransportError::Setup { .. } => "setup",
            TransportError::Play(_) => "play",
            TransportError::Stream(_) => "stream",
            TransportError::State(_) => "session state",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
    Application,
    Other,
}

impl MediaKind {
    pub fn from_media(media: &str) -> Self {
        match media {
            "video" => MediaKind::Video,
            "audio" => MediaKind::Audio,
            "application" => MediaKind::Application,
            _ => MediaKind::Other,
        }
    }
}

/// One described track of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub index: usize,
    pub kind: MediaKind,
    /// Lowercase encoding name from the session description, e.g. `h264`.
    pub encoding: String,
    pub clock_rate: u32,
}

impl TrackInfo {
    pub fn is_h264(&self) -> bool {
        self.kind == MediaKind::Video && self.encoding == "h264"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    /// Index into [`MediaSession::tracks`].
    pub track: usize,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub payload: Bytes,
}

/// Opens transport sessions. Connecting includes fetching the description.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: MediaSession;

    async fn connect(&self, url: &str) -> Result<Self::Session, TransportError>;
}

/// A described session. Dropping it closes the session.
#[async_trait]
pub trait MediaSession: Send {
    fn tracks(&self) -> &[TrackInfo];

    async fn setup_all(&mut self) -> Result<(), TransportError>;

    async fn play(&mut self) -> Result<(), TransportError>;

    /// Next delivered packet, in the order the transport hands them over.
    /// `None` once the stream has ended.
    async fn next_packet(&mut self) -> Option<Result<RtpPacket, TransportError>>;
}
