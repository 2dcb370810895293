//! 16-bit ones'-complement Internet checksum.
//!
//! The accumulator can be carried across calls so that a pseudo-header and the
//! transport segment that follows it are summed as one block: the first call
//! restarts, later calls continue.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Checksum {
    sum: u32,
}

impl Checksum {
    pub const fn new() -> Self {
        Self { sum: 0 }
    }

    /// Adds `data` as big-endian 16-bit words and returns the complement of
    /// the folded running sum. An odd trailing byte is summed as if followed
    /// by a zero pad byte.
    pub fn compute(&mut self, data: &[u8], restart: bool) -> u16 {
        if restart {
            self.sum = 0;
        }
        let mut words = data.chunks_exact(2);
        for pair in &mut words {
            self.sum = self
                .sum
                .wrapping_add(u16::from_be_bytes([pair[0], pair[1]]) as u32);
        }
        if let [last] = words.remainder() {
            self.sum = self.sum.wrapping_add((*last as u32) << 8);
        }
        // Twice: the first fold can itself carry.
        self.sum = (self.sum & 0xFFFF) + (self.sum >> 16);
        self.sum = (self.sum & 0xFFFF) + (self.sum >> 16);
        !(self.sum as u16)
    }

    /// Folded sum before complementing.
    pub const fn folded(&self) -> u16 {
        self.sum as u16
    }
}

/// One-shot checksum over `data`.
pub fn internet_checksum(data: &[u8]) -> u16 {
    Checksum::new().compute(data, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Header from the usual worked example; checksum field is bytes 10..12.
    const IP_HEADER: [u8; 20] = [
        0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0xB8, 0x61, 0xC0, 0xA8,
        0x00, 0x01, 0xC0, 0xA8, 0x00, 0xC7,
    ];

    #[test]
    fn known_ipv4_header_checksum() {
        let mut header = IP_HEADER;
        header[10] = 0;
        header[11] = 0;
        assert_eq!(internet_checksum(&header), 0xB861);
    }

    #[test]
    fn stored_checksum_sums_to_all_ones() {
        let mut ck = Checksum::new();
        assert_eq!(ck.compute(&IP_HEADER, true), 0);
        assert_eq!(ck.folded(), 0xFFFF);
    }

    #[test]
    fn odd_length_pads_with_zero() {
        assert_eq!(internet_checksum(&[0x01]), !0x0100);
        assert_eq!(
            internet_checksum(&[0x12, 0x34, 0x56]),
            internet_checksum(&[0x12, 0x34, 0x56, 0x00])
        );
    }

    #[test]
    fn continuation_equals_single_pass() {
        let head = [0x0A, 0x00, 0x00, 0x01, 0x0A, 0x00, 0x00, 0x02];
        let tail = [0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02];
        let mut joined = [0u8; 14];
        joined[..8].copy_from_slice(&head);
        joined[8..].copy_from_slice(&tail);

        let mut ck = Checksum::new();
        ck.compute(&head, true);
        assert_eq!(ck.compute(&tail, false), internet_checksum(&joined));
    }

    #[test]
    fn restart_discards_previous_sum() {
        let mut ck = Checksum::new();
        ck.compute(&[0xFF, 0xFF, 0x12, 0x34], true);
        assert_eq!(ck.compute(&[0x00, 0x01], true), !0x0001);
    }

    #[test]
    fn carries_fold_back_in() {
        // 0xFFFF + 0x0002 = 0x1_0001 -> 0x0002 after folding.
        assert_eq!(internet_checksum(&[0xFF, 0xFF, 0x00, 0x02]), !0x0002);
    }
}
