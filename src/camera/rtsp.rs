use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use retina::client::{
    Credentials, Described, PacketItem, PlayOptions, Playing, Session, SessionOptions,
    SetupOptions, TcpTransportOptions, Transport, UdpTransportOptions,
};
use url::Url;

use super::session::{Connector, MediaKind, MediaSession, RtpPacket, TrackInfo, TransportError};
use crate::config::TransportMode;

const USER_AGENT: &str = concat!("rtspwatch/", env!("CARGO_PKG_VERSION"));

impl From<TransportMode> for Transport {
    fn from(mode: TransportMode) -> Self {
        match mode {
            TransportMode::Tcp => Transport::Tcp(TcpTransportOptions::default()),
            TransportMode::Udp => Transport::Udp(UdpTransportOptions::default()),
        }
    }
}

/// RTSP client backed by retina.
#[derive(Debug, Clone)]
pub struct RtspConnector {
    transport: TransportMode,
}

impl RtspConnector {
    pub fn new(transport: TransportMode) -> Self {
        Self { transport }
    }
}

/// Moves `user:pass@` out of the URL; retina takes credentials separately.
fn split_credentials(url: &mut Url) -> Option<Credentials> {
    if url.username().is_empty() {
        return None;
    }
    let creds = Credentials {
        username: url.username().to_string(),
        password: url.password().unwrap_or_default().to_string(),
    };
    let _ = url.set_username("");
    let _ = url.set_password(None);
    Some(creds)
}

#[async_trait]
impl Connector for RtspConnector {
    type Session = RtspSession;

    async fn connect(&self, url: &str) -> Result<RtspSession, TransportError> {
        let mut url = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        let creds = split_credentials(&mut url);

        let options = SessionOptions::default()
            .user_agent(USER_AGENT.to_string())
            .creds(creds);

        let session = Session::describe(url, options)
            .await
            .map_err(|e| TransportError::Describe(e.to_string()))?;

        let tracks = session
            .streams()
            .iter()
            .enumerate()
            .map(|(index, stream)| TrackInfo {
                index,
                kind: MediaKind::from_media(stream.media()),
                encoding: stream.encoding_name().to_lowercase(),
                clock_rate: stream.clock_rate_hz(),
            })
            .collect::<Vec<_>>();

        tracing::debug!(tracks = tracks.len(), "session described");

        Ok(RtspSession {
            state: SessionState::Described(Box::new(session)),
            tracks,
            transport: self.transport,
        })
    }
}

enum SessionState {
    Described(Box<Session<Described>>),
    Playing(Pin<Box<Session<Playing>>>),
    Closed,
}

pub struct RtspSession {
    state: SessionState,
    tracks: Vec<TrackInfo>,
    transport: TransportMode,
}

#[async_trait]
impl MediaSession for RtspSession {
    fn tracks(&self) -> &[TrackInfo] {
        &self.tracks
    }

    async fn setup_all(&mut self) -> Result<(), TransportError> {
        let SessionState::Described(session) = &mut self.state else {
            return Err(TransportError::State("setup"));
        };

        let transport = Transport::from(self.transport);
        for track in 0..self.tracks.len() {
            session
                .setup(track, SetupOptions::default().transport(transport.clone()))
                .await
                .map_err(|e| TransportError::Setup {
                    track,
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }

    async fn play(&mut self) -> Result<(), TransportError> {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Described(session) => {
                let playing = session
                    .play(PlayOptions::default())
                    .await
                    .map_err(|e| TransportError::Play(e.to_string()))?;
                self.state = SessionState::Playing(Box::pin(playing));
                Ok(())
            }
            other => {
                self.state = other;
                Err(TransportError::State("play"))
            }
        }
    }

    async fn next_packet(&mut self) -> Option<Result<RtpPacket, TransportError>> {
        let SessionState::Playing(session) = &mut self.state else {
            return None;
        };

        loop {
            match session.next().await? {
                Ok(PacketItem::Rtp(pkt)) => {
                    return Some(Ok(RtpPacket {
                        track: pkt.stream_id(),
                        sequence_number: pkt.sequence_number(),
                        // low 32 bits are the wire timestamp
                        timestamp: pkt.timestamp().timestamp() as u32,
                        payload: Bytes::copy_from_slice(pkt.payload()),
                    }));
                }
                Ok(_) => continue,
                Err(e) => {
                    self.state = SessionState::Closed;
                    return Some(Err(TransportError::Stream(e.to_string())));
                }
            }
        }
    }
}
