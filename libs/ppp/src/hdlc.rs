//! Asynchronous HDLC-like framing (RFC 1662): 0x7E flags, 0x7D escapes, FCS
//! trailer.
//!
//! Outgoing frames are built in place with two trailing bytes reserved for the
//! FCS; [`seal`] fills them and [`stuff`] or [`encode`] escape the result.
//! Incoming bytes sit in an [`RxRing`] until [`Deframer`] finds a closing flag.

use crate::fcs::{self, Fcs, FCS_LEN};
use crate::ring::RxRing;
use crate::Error;

pub const FLAG: u8 = 0x7E;
pub const ESCAPE: u8 = 0x7D;
pub const ESCAPE_XOR: u8 = 0x20;

/// Control characters are always escaped; no ACCM is negotiated.
pub const fn needs_escape(byte: u8) -> bool {
    byte < 0x20 || byte == ESCAPE || byte == FLAG
}

/// Writes the FCS of `frame[..len - 2]` into the last two bytes of `frame`.
pub fn seal(frame: &mut [u8]) -> Result<(), Error> {
    if frame.len() < FCS_LEN {
        return Err(Error::Truncated);
    }
    let split = frame.len() - FCS_LEN;
    let trailer = fcs::trailer(&frame[..split]);
    frame[split..].copy_from_slice(&trailer);
    Ok(())
}

/// Feeds a sealed frame to `emit` with opening and closing flags, escaping
/// as needed.
pub fn stuff<E>(frame: &[u8], mut emit: impl FnMut(u8) -> Result<(), E>) -> Result<(), E> {
    emit(FLAG)?;
    for &byte in frame {
        if needs_escape(byte) {
            emit(ESCAPE)?;
            emit(byte ^ ESCAPE_XOR)?;
        } else {
            emit(byte)?;
        }
    }
    emit(FLAG)
}

/// Seals `frame` and writes the stuffed bytes into `out`.
pub fn encode(frame: &mut [u8], out: &mut [u8]) -> Result<usize, Error> {
    seal(frame)?;
    let mut idx = 0;
    stuff::<Error>(frame, |byte| {
        ensure_capacity(out, idx)?;
        out[idx] = byte;
        idx += 1;
        Ok(())
    })?;
    Ok(idx)
}

/// Unstuffs one frame. Flags at either end are skipped; the FCS is checked
/// and left in `out` as the last two bytes.
pub fn decode(stuffed: &[u8], out: &mut [u8]) -> Result<usize, Error> {
    let start = stuffed.iter().position(|&b| b != FLAG).unwrap_or(stuffed.len());
    let end = stuffed
        .iter()
        .rposition(|&b| b != FLAG)
        .map_or(start, |i| i + 1);
    unstuff(stuffed[start..end].iter().copied(), out)
}

fn unstuff(bytes: impl Iterator<Item = u8>, out: &mut [u8]) -> Result<usize, Error> {
    let mut fcs = Fcs::new();
    let mut len = 0;
    let mut escaping = false;
    for byte in bytes {
        let byte = if escaping {
            escaping = false;
            byte ^ ESCAPE_XOR
        } else if byte == ESCAPE {
            escaping = true;
            continue;
        } else {
            byte
        };
        let slot = out.get_mut(len).ok_or(Error::FrameTooLarge)?;
        *slot = byte;
        len += 1;
        fcs.accumulate(byte);
    }
    if len < FCS_LEN {
        return Err(Error::Truncated);
    }
    if !fcs.is_good() {
        return Err(Error::BadFcs(fcs.value()));
    }
    Ok(len)
}

fn ensure_capacity(out: &[u8], idx: usize) -> Result<(), Error> {
    if idx >= out.len() {
        Err(Error::BufferTooSmall)
    } else {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Discarding noise until the first flag ever seen.
    Hunting,
    InFrame,
}

/// Splits the receive ring into frames.
#[derive(Debug)]
pub struct Deframer {
    state: State,
    start: usize,
}

impl Deframer {
    pub const fn new() -> Self {
        Self {
            state: State::Hunting,
            start: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn is_synced(&self) -> bool {
        self.state == State::InFrame
    }

    /// Reads the ring up to the next non-empty frame and unstuffs it into
    /// `out`. Returns `None` once the ring has no complete frame left.
    ///
    /// The flag that closes one frame opens the next; back-to-back flags
    /// yield nothing.
    pub fn next_frame<const N: usize>(
        &mut self,
        ring: &mut RxRing<N>,
        out: &mut [u8],
    ) -> Option<Result<usize, Error>> {
        loop {
            let at = ring.tail();
            if ring.pop()? != FLAG {
                continue;
            }
            let start = self.start;
            self.start = ring.tail();
            match self.state {
                State::Hunting => {
                    self.state = State::InFrame;
                    ring.commit();
                }
                State::InFrame if at == start => ring.commit(),
                State::InFrame => {
                    let result = unstuff(ring.span(start, at), out);
                    ring.commit();
                    return Some(result);
                }
            }
        }
    }

    /// Gives up on a partial frame that filled the whole ring. Its remaining
    /// bytes will fail the FCS check when the next flag arrives.
    pub fn abandon<const N: usize>(&mut self, ring: &mut RxRing<N>) {
        ring.commit();
        self.start = ring.tail();
    }
}

impl Default for Deframer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fcs::FCS_GOOD;
    use std::vec::Vec;

    const LCP_REQ: [u8; 8] = [0xFF, 0x03, 0xC0, 0x21, 0x01, 0x01, 0x00, 0x04];

    fn sealed(payload: &[u8]) -> Vec<u8> {
        let mut frame = payload.to_vec();
        frame.extend_from_slice(&[0, 0]);
        seal(&mut frame).unwrap();
        frame
    }

    fn stuffed(payload: &[u8]) -> Vec<u8> {
        let frame = sealed(payload);
        let mut out = Vec::new();
        stuff::<()>(&frame, |b| {
            out.push(b);
            Ok(())
        })
        .unwrap();
        out
    }

    fn ring_with(bytes: &[u8]) -> RxRing<256> {
        let mut ring = RxRing::new();
        for &b in bytes {
            assert!(ring.push(b));
        }
        ring
    }

    #[test]
    fn escapes_control_flag_and_escape_bytes() {
        let wire = stuffed(&[0x41, 0x7E, 0x7D, 0x03, 0x20]);
        assert_eq!(wire[0], FLAG);
        assert_eq!(*wire.last().unwrap(), FLAG);
        assert_eq!(&wire[1..8], &[0x41, 0x7D, 0x5E, 0x7D, 0x5D, 0x7D, 0x23]);
        assert_eq!(wire[8], 0x20);
        let inner = &wire[1..wire.len() - 1];
        assert!(inner.iter().all(|&b| b != FLAG));
        assert!(inner.iter().all(|&b| b >= 0x20 || b == ESCAPE));
    }

    #[test]
    fn encode_reports_short_output() {
        let mut frame = sealed(&LCP_REQ);
        let mut out = [0u8; 8];
        assert_eq!(encode(&mut frame, &mut out), Err(Error::BufferTooSmall));
    }

    #[test]
    fn decode_recovers_frame_and_checks_fcs() {
        let wire = stuffed(&LCP_REQ);
        let mut out = [0u8; 64];
        let len = decode(&wire, &mut out).unwrap();
        assert_eq!(len, LCP_REQ.len() + FCS_LEN);
        assert_eq!(&out[..LCP_REQ.len()], &LCP_REQ);
        assert_eq!(fcs::fcs16(&out[..len]), FCS_GOOD);
    }

    #[test]
    fn escaped_payload_bytes_come_back_unchanged() {
        let payload = [0x7E, 0x7D, 0x00, 0x41];
        let wire = stuffed(&payload);
        assert_eq!(&wire[1..7], &[0x7D, 0x5E, 0x7D, 0x5D, 0x7D, 0x20]);

        let mut out = [0u8; 64];
        let len = decode(&wire, &mut out).unwrap();
        assert_eq!(&out[..len - FCS_LEN], &payload);

        let mut frame = sealed(&payload);
        let mut encoded = [0u8; 64];
        let n = encode(&mut frame, &mut encoded).unwrap();
        assert_eq!(&encoded[..n], wire.as_slice());
    }

    #[test]
    fn decode_rejects_flipped_bit() {
        let mut wire = stuffed(&LCP_REQ);
        wire[5] ^= 0x04;
        let mut out = [0u8; 64];
        assert!(matches!(decode(&wire, &mut out), Err(Error::BadFcs(_))));
    }

    #[test]
    fn deframer_skips_noise_before_first_flag() {
        let mut bytes = b"garbage".to_vec();
        bytes.extend(stuffed(&LCP_REQ));
        let mut ring = ring_with(&bytes);
        let mut deframer = Deframer::new();
        let mut out = [0u8; 64];

        let len = deframer.next_frame(&mut ring, &mut out).unwrap().unwrap();
        assert_eq!(&out[..len - FCS_LEN], &LCP_REQ);
        assert!(deframer.next_frame(&mut ring, &mut out).is_none());
    }

    #[test]
    fn deframer_yields_every_frame_in_a_burst() {
        let first = stuffed(&LCP_REQ);
        let second = stuffed(&[0xFF, 0x03, 0xC0, 0x21, 0x05, 0x09, 0x00, 0x04]);
        // Shared flag between frames, as many peers send them.
        let mut bytes = first.clone();
        bytes.extend_from_slice(&second[1..]);
        let mut ring = ring_with(&bytes);
        let mut deframer = Deframer::new();
        let mut out = [0u8; 64];

        let a = deframer.next_frame(&mut ring, &mut out).unwrap().unwrap();
        assert_eq!(out[4], 0x01);
        assert_eq!(a, 10);
        let b = deframer.next_frame(&mut ring, &mut out).unwrap().unwrap();
        assert_eq!(out[4], 0x05);
        assert_eq!(b, 10);
        assert!(deframer.next_frame(&mut ring, &mut out).is_none());
    }

    #[test]
    fn deframer_ignores_empty_frames_and_waits_for_close() {
        let wire = stuffed(&LCP_REQ);
        let mut ring = ring_with(&[FLAG, FLAG, FLAG]);
        let mut deframer = Deframer::new();
        let mut out = [0u8; 64];
        assert!(deframer.next_frame(&mut ring, &mut out).is_none());
        assert!(deframer.is_synced());

        // Body arrives without its closing flag yet.
        for &b in &wire[1..wire.len() - 1] {
            ring.push(b);
        }
        assert!(deframer.next_frame(&mut ring, &mut out).is_none());
        ring.push(FLAG);
        let len = deframer.next_frame(&mut ring, &mut out).unwrap().unwrap();
        assert_eq!(&out[..8], &LCP_REQ);
        assert_eq!(len, 10);
    }

    #[test]
    fn deframer_reports_bad_fcs_then_resyncs() {
        let mut bad = stuffed(&LCP_REQ);
        bad[3] ^= 0x01;
        let mut bytes = bad;
        bytes.extend(stuffed(&LCP_REQ));
        let mut ring = ring_with(&bytes);
        let mut deframer = Deframer::new();
        let mut out = [0u8; 64];

        assert!(matches!(
            deframer.next_frame(&mut ring, &mut out),
            Some(Err(Error::BadFcs(_)))
        ));
        assert!(matches!(deframer.next_frame(&mut ring, &mut out), Some(Ok(10))));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut ring = ring_with(&[FLAG; 1]);
        for b in 0..40u8 {
            ring.push(0x40 + b);
        }
        ring.push(FLAG);
        let mut deframer = Deframer::new();
        let mut out = [0u8; 16];
        assert_eq!(
            deframer.next_frame(&mut ring, &mut out),
            Some(Err(Error::FrameTooLarge))
        );
    }
}
