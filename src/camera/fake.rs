//! Scripted in-memory transport for tests.

use std::collections::HashMap;
use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;

use super::session::{Connector, MediaKind, MediaSession, RtpPacket, TrackInfo, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Connect,
    Setup,
    Play,
}

#[derive(Debug, Clone)]
pub struct Script {
    pub tracks: Vec<TrackInfo>,
    pub packets: Vec<RtpPacket>,
    pub fail_at: Option<FailAt>,
    /// Report end of stream after the last packet instead of stalling.
    pub ends: bool,
}

impl Script {
    pub fn video(packets: Vec<RtpPacket>) -> Self {
        Self {
            tracks: vec![video_track(0)],
            packets,
            fail_at: None,
            ends: false,
        }
    }

    pub fn failing(at: FailAt) -> Self {
        Self {
            fail_at: Some(at),
            ..Self::video(Vec::new())
        }
    }
}

pub fn video_track(index: usize) -> TrackInfo {
    TrackInfo {
        index,
        kind: MediaKind::Video,
        encoding: "h264".into(),
        clock_rate: 90_000,
    }
}

pub fn packet(track: usize, sequence_number: u16, timestamp: u32, payload: &[u8]) -> RtpPacket {
    RtpPacket {
        track,
        sequence_number,
        timestamp,
        payload: Bytes::copy_from_slice(payload),
    }
}

#[derive(Debug, Default)]
pub struct ScriptedConnector {
    scripts: HashMap<String, Script>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, script: Script) -> Self {
        self.scripts.insert(url.to_string(), script);
        self
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Session = ScriptedSession;

    async fn connect(&self, url: &str) -> Result<ScriptedSession, TransportError> {
        let script = self
            .scripts
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::Describe(format!("unknown url {url}")))?;
        if script.fail_at == Some(FailAt::Connect) {
            return Err(TransportError::Describe("connection refused".into()));
        }
        Ok(ScriptedSession {
            packets: script.packets.iter().cloned().collect(),
            script,
            playing: false,
        })
    }
}

pub struct ScriptedSession {
    script: Script,
    packets: VecDeque<RtpPacket>,
    playing: bool,
}

#[async_trait]
impl MediaSession for ScriptedSession {
    fn tracks(&self) -> &[TrackInfo] {
        &self.script.tracks
    }

    async fn setup_all(&mut self) -> Result<(), TransportError> {
        if self.script.fail_at == Some(FailAt::Setup) {
            return Err(TransportError::Setup {
                track: 0,
                reason: "unsupported transport".into(),
            });
        }
        Ok(())
    }

    async fn play(&mut self) -> Result<(), TransportError> {
        if self.script.fail_at == Some(FailAt::Play) {
            return Err(TransportError::Play("454 session not found".into()));
        }
        self.playing = true;
        Ok(())
    }

    async fn next_packet(&mut self) -> Option<Result<RtpPacket, TransportError>> {
        if !self.playing {
            return None;
        }
        match self.packets.pop_front() {
            Some(pkt) => Some(Ok(pkt)),
            None if self.script.ends => None,
            None => std::future::pending().await,
        }
    }
}
