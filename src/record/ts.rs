//! Minimal MPEG-TS writer for a single H.264 elementary stream.

use std::io::{self, Write};

use crate::stats::nal::{nal_type, NAL_IDR_SLICE};

use super::scheduler::UnitWriter;

pub const TS_PACKET_SIZE: usize = 188;
const MAX_PAYLOAD_SIZE: usize = 184;
const SYNC_BYTE: u8 = 0x47;

const PAT_PID: u16 = 0x0000;
const PMT_PID: u16 = 0x1000;
pub const VIDEO_PID: u16 = 0x0100;
const PROGRAM_NUMBER: u16 = 1;
const TRANSPORT_STREAM_ID: u16 = 1;
const STREAM_TYPE_H264: u8 = 0x1B;
const VIDEO_STREAM_ID: u8 = 0xE0;

const PTS_MASK: i64 = (1 << 33) - 1;
const ANNEXB_START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Writes each NAL unit as one PES packet on [`VIDEO_PID`].
///
/// PAT and PMT lead the output and are repeated before every IDR slice.
pub struct TsWriter<W: Write> {
    out: W,
    pat_cc: u8,
    pmt_cc: u8,
    video_cc: u8,
}

impl<W: Write> TsWriter<W> {
    pub fn new(out: W) -> io::Result<Self> {
        let mut writer = Self {
            out,
            pat_cc: 0,
            pmt_cc: 0,
            video_cc: 0,
        };
        writer.write_psi()?;
        Ok(writer)
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_psi(&mut self) -> io::Result<()> {
        let pat = pat_section();
        let packet = psi_packet(PAT_PID, next_cc(&mut self.pat_cc), &pat);
        self.out.write_all(&packet)?;

        let pmt = pmt_section();
        let packet = psi_packet(PMT_PID, next_cc(&mut self.pmt_cc), &pmt);
        self.out.write_all(&packet)
    }

    fn write_pes(&mut self, pes: &[u8], pcr_base: u64) -> io::Result<()> {
        let mut offset = 0;
        let mut first = true;

        while offset < pes.len() {
            // adaptation field bytes after its length byte
            let mut adaptation = Vec::new();
            if first {
                adaptation.push(0x10); // PCR flag
                adaptation.extend_from_slice(&encode_pcr(pcr_base));
            }
            let mut has_adaptation = !adaptation.is_empty();

            let remaining = pes.len() - offset;
            let mut room = MAX_PAYLOAD_SIZE
                - if has_adaptation {
                    1 + adaptation.len()
                } else {
                    0
                };
            if remaining < room {
                let mut stuffing = room - remaining;
                if !has_adaptation {
                    has_adaptation = true;
                    stuffing -= 1;
                    if stuffing > 0 {
                        adaptation.push(0x00);
                        stuffing -= 1;
                    }
                }
                adaptation.resize(adaptation.len() + stuffing, 0xFF);
                room = remaining;
            }

            let mut packet = Vec::with_capacity(TS_PACKET_SIZE);
            packet.push(SYNC_BYTE);
            let start_flag = if first { 0x40 } else { 0x00 };
            packet.push(start_flag | ((VIDEO_PID >> 8) as u8 & 0x1F));
            packet.push((VIDEO_PID & 0xFF) as u8);
            let control = if has_adaptation { 0x30 } else { 0x10 };
            packet.push(control | next_cc(&mut self.video_cc));
            if has_adaptation {
                packet.push(adaptation.len() as u8);
                packet.extend_from_slice(&adaptation);
            }
            packet.extend_from_slice(&pes[offset..offset + room]);
            debug_assert_eq!(packet.len(), TS_PACKET_SIZE);

            self.out.write_all(&packet)?;
            offset += room;
            first = false;
        }
        Ok(())
    }
}

impl<W: Write> UnitWriter for TsWriter<W> {
    fn write_unit(&mut self, unit: &[u8], pts: i64) -> io::Result<()> {
        if unit.first().map(|b| nal_type(*b)) == Some(NAL_IDR_SLICE) {
            self.write_psi()?;
        }
        let pts = (pts & PTS_MASK) as u64;
        let pes = pes_packet(unit, pts);
        self.write_pes(&pes, pts)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

fn next_cc(cc: &mut u8) -> u8 {
    let current = *cc;
    *cc = (*cc + 1) & 0x0F;
    current
}

fn pes_packet(unit: &[u8], pts: u64) -> Vec<u8> {
    let mut pes = Vec::with_capacity(19 + ANNEXB_START_CODE.len() + unit.len());
    pes.extend_from_slice(&[0x00, 0x00, 0x01, VIDEO_STREAM_ID]);
    // unbounded length for video
    pes.extend_from_slice(&[0x00, 0x00]);
    pes.push(0x80);
    pes.push(0xC0); // PTS and DTS
    pes.push(10);
    pes.extend_from_slice(&encode_timestamp(pts, 0x03));
    pes.extend_from_slice(&encode_timestamp(pts, 0x01));
    pes.extend_from_slice(&ANNEXB_START_CODE);
    pes.extend_from_slice(unit);
    pes
}

fn pat_section() -> Vec<u8> {
    let mut section = vec![0x00, 0x00, 0x00];
    section.extend_from_slice(&TRANSPORT_STREAM_ID.to_be_bytes());
    section.extend_from_slice(&[0xC1, 0x00, 0x00]);
    section.extend_from_slice(&PROGRAM_NUMBER.to_be_bytes());
    section.extend_from_slice(&pid_field(PMT_PID));
    finish_section(section)
}

fn pmt_section() -> Vec<u8> {
    let mut section = vec![0x02, 0x00, 0x00];
    section.extend_from_slice(&PROGRAM_NUMBER.to_be_bytes());
    section.extend_from_slice(&[0xC1, 0x00, 0x00]);
    section.extend_from_slice(&pid_field(VIDEO_PID)); // PCR PID
    section.extend_from_slice(&[0xF0, 0x00]);
    section.push(STREAM_TYPE_H264);
    section.extend_from_slice(&pid_field(VIDEO_PID));
    section.extend_from_slice(&[0xF0, 0x00]);
    finish_section(section)
}

fn pid_field(pid: u16) -> [u8; 2] {
    [0xE0 | ((pid >> 8) as u8 & 0x1F), (pid & 0xFF) as u8]
}

/// Fill in the section length and append the CRC.
fn finish_section(mut section: Vec<u8>) -> Vec<u8> {
    let length = section.len() - 3 + 4;
    section[1] = 0xB0 | ((length >> 8) as u8 & 0x0F);
    section[2] = (length & 0xFF) as u8;
    let crc = crc32_mpeg(&section);
    section.extend_from_slice(&crc.to_be_bytes());
    section
}

fn psi_packet(pid: u16, cc: u8, section: &[u8]) -> [u8; TS_PACKET_SIZE] {
    let mut packet = [0xFF; TS_PACKET_SIZE];
    packet[0] = SYNC_BYTE;
    packet[1] = 0x40 | ((pid >> 8) as u8 & 0x1F);
    packet[2] = (pid & 0xFF) as u8;
    packet[3] = 0x10 | cc;
    packet[4] = 0x00; // pointer field
    packet[5..5 + section.len()].copy_from_slice(section);
    packet
}

fn encode_timestamp(ts: u64, marker: u8) -> [u8; 5] {
    [
        (marker << 4) | ((((ts >> 30) & 0x07) as u8) << 1) | 0x01,
        ((ts >> 22) & 0xFF) as u8,
        ((((ts >> 15) & 0x7F) as u8) << 1) | 0x01,
        ((ts >> 7) & 0xFF) as u8,
        (((ts & 0x7F) as u8) << 1) | 0x01,
    ]
}

fn encode_pcr(base: u64) -> [u8; 6] {
    [
        (base >> 25) as u8,
        (base >> 17) as u8,
        (base >> 9) as u8,
        (base >> 1) as u8,
        (((base & 0x01) as u8) << 7) | 0x7E,
        0x00,
    ]
}

fn crc32_mpeg(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= u32::from(byte) << 24;
        for _ in 0..8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ 0x04C1_1DB7
            } else {
                crc << 1
            };
        }
    }
    crc
}
