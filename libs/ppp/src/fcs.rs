//! HDLC frame check sequence: CRC-16/CCITT, reflected (polynomial 0x8408),
//! seeded with 0xFFFF and processed LSB first.

pub const FCS_INIT: u16 = 0xFFFF;
/// Running value after a good frame, trailer included, has been accumulated.
pub const FCS_GOOD: u16 = 0xF0B8;
pub const FCS_LEN: usize = 2;

const FCS_POLY: u16 = 0x8408;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fcs(u16);

impl Fcs {
    pub const fn new() -> Self {
        Self(FCS_INIT)
    }

    pub fn reset(&mut self) {
        self.0 = FCS_INIT;
    }

    pub fn accumulate(&mut self, byte: u8) {
        let mut x = byte as u16;
        for _ in 0..8 {
            self.0 = if (self.0 ^ x) & 1 != 0 {
                (self.0 >> 1) ^ FCS_POLY
            } else {
                self.0 >> 1
            };
            x >>= 1;
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.accumulate(b);
        }
    }

    pub const fn value(&self) -> u16 {
        self.0
    }

    pub const fn is_good(&self) -> bool {
        self.0 == FCS_GOOD
    }
}

impl Default for Fcs {
    fn default() -> Self {
        Self::new()
    }
}

/// FCS accumulator value over a whole block, starting from the seed.
pub fn fcs16(bytes: &[u8]) -> u16 {
    let mut fcs = Fcs::new();
    fcs.update(bytes);
    fcs.value()
}

/// Trailer bytes to append after `bytes`: the complemented FCS, low byte first.
pub fn trailer(bytes: &[u8]) -> [u8; FCS_LEN] {
    (!fcs16(bytes)).to_le_bytes()
}
