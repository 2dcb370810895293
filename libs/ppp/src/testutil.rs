//! In-memory serial link and frame builders for tests.

use core::convert::Infallible;
use std::collections::VecDeque;
use std::vec::Vec;

use crate::fcs::FCS_LEN;
use crate::hdlc::{self, FLAG};
use crate::relay::LedRelay;
use crate::transport::Transport;

#[derive(Debug, Default)]
pub struct Loopback {
    pub incoming: VecDeque<u8>,
    pub sent: Vec<u8>,
    pub flushes: usize,
}

impl Loopback {
    pub fn feed(&mut self, bytes: &[u8]) {
        self.incoming.extend(bytes.iter().copied());
    }

    /// Unstuffed payloads (FCS stripped) of every frame written so far.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        let mut current = Vec::new();
        let mut in_frame = false;
        for &b in &self.sent {
            if b == FLAG {
                if in_frame {
                    let mut out = [0u8; 2048];
                    let len = hdlc::decode(&current, &mut out).expect("valid frame on the wire");
                    frames.push(out[..len - FCS_LEN].to_vec());
                    current.clear();
                }
                in_frame = !in_frame;
            } else if in_frame {
                current.push(b);
            }
        }
        frames
    }

    /// Raw bytes written outside of any frame.
    pub fn raw_text(&self) -> Vec<u8> {
        let mut text = Vec::new();
        let mut in_frame = false;
        for &b in &self.sent {
            if b == FLAG {
                in_frame = !in_frame;
            } else if !in_frame {
                text.push(b);
            }
        }
        text
    }
}

impl Transport for Loopback {
    type Error = Infallible;

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
        let mut n = 0;
        while n < buf.len() {
            match self.incoming.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Infallible> {
        self.sent.push(byte);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        self.flushes += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingRelay {
    pub peer: Vec<(u8, bool)>,
    pub local: Vec<u8>,
}

impl LedRelay for RecordingRelay {
    fn set_peer_led_state(&mut self, address: u8, on: bool) {
        self.peer.push((address, on));
    }

    fn toggle_local_led(&mut self, address: u8) {
        self.local.push(address);
    }
}

/// Copies `payload` into `buf` and appends a valid FCS. Returns the length.
pub fn frame_with_fcs(payload: &[u8], buf: &mut [u8]) -> usize {
    let len = payload.len() + FCS_LEN;
    buf[..payload.len()].copy_from_slice(payload);
    hdlc::seal(&mut buf[..len]).unwrap();
    len
}

/// Flag-delimited, stuffed wire bytes for `payload`.
pub fn wire_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = payload.to_vec();
    frame.extend_from_slice(&[0, 0]);
    hdlc::seal(&mut frame).unwrap();
    let mut out = Vec::new();
    hdlc::stuff::<()>(&frame, |b| {
        out.push(b);
        Ok(())
    })
    .unwrap();
    out
}

/// PPP + IPv4 header around `transport`, with a correct header checksum.
pub fn ipv4_frame(proto: u8, src: [u8; 4], dst: [u8; 4], transport: &[u8]) -> Vec<u8> {
    let total = 20 + transport.len();
    let mut frame = std::vec![0xFF, 0x03, 0x00, 0x21];
    let mut ip = [0u8; 20];
    ip[0] = 0x45;
    ip[2..4].copy_from_slice(&(total as u16).to_be_bytes());
    ip[4..6].copy_from_slice(&0x0102u16.to_be_bytes());
    ip[8] = 64;
    ip[9] = proto;
    ip[12..16].copy_from_slice(&src);
    ip[16..20].copy_from_slice(&dst);
    let sum = crate::checksum::internet_checksum(&ip);
    ip[10..12].copy_from_slice(&sum.to_be_bytes());
    frame.extend_from_slice(&ip);
    frame.extend_from_slice(transport);
    frame
}
