//! Receive ring for raw serial bytes.
//!
//! Three cursors: `head` is where the next received byte lands, `tail` is the
//! next byte the deframer reads, and `rtail` marks the start of the frame that
//! is still being assembled. Bytes between `rtail` and `tail` have been looked
//! at but must not be overwritten until the frame is handed off, so the writer
//! stops one slot short of `rtail` rather than `tail`.

pub struct RxRing<const N: usize> {
    buf: [u8; N],
    head: usize,
    tail: usize,
    rtail: usize,
    level: usize,
}

impl<const N: usize> RxRing<N> {
    const MASK: usize = {
        assert!(N.is_power_of_two(), "ring size must be a power of two");
        N - 1
    };

    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            head: 0,
            tail: 0,
            rtail: 0,
            level: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Stores `byte`, or drops it and returns false when the ring is full.
    pub fn push(&mut self, byte: u8) -> bool {
        let next = (self.head + 1) & Self::MASK;
        if next == self.rtail {
            return false;
        }
        self.buf[self.head] = byte;
        self.head = next;
        self.level += 1;
        true
    }

    pub fn pop(&mut self) -> Option<u8> {
        if self.tail == self.head {
            return None;
        }
        let byte = self.buf[self.tail];
        self.tail = (self.tail + 1) & Self::MASK;
        self.level -= 1;
        Some(byte)
    }

    /// Releases everything up to the read cursor for overwriting.
    pub fn commit(&mut self) {
        self.rtail = self.tail;
    }

    pub const fn tail(&self) -> usize {
        self.tail
    }

    pub const fn committed(&self) -> usize {
        self.rtail
    }

    /// Bytes received but not yet read.
    pub const fn level(&self) -> usize {
        self.level
    }

    pub fn is_full(&self) -> bool {
        (self.head + 1) & Self::MASK == self.rtail
    }

    /// Bytes from index `start` up to, not including, index `end`.
    pub fn span(&self, start: usize, end: usize) -> impl Iterator<Item = u8> + '_ {
        let len = end.wrapping_sub(start) & Self::MASK;
        (0..len).map(move |i| self.buf[(start + i) & Self::MASK])
    }

    pub fn reset(&mut self) {
        self.buf.fill(0);
        self.head = 0;
        self.tail = 0;
        self.rtail = 0;
        self.level = 0;
    }
}

impl<const N: usize> Default for RxRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[test]
    fn fifo_order_and_level() {
        let mut ring = RxRing::<8>::new();
        for b in 1..=3 {
            assert!(ring.push(b));
        }
        assert_eq!(ring.level(), 3);
        assert_eq!(ring.pop(), Some(1));
        assert_eq!(ring.pop(), Some(2));
        assert_eq!(ring.level(), 1);
        assert_eq!(ring.pop(), Some(3));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn writer_stops_short_of_committed_tail() {
        let mut ring = RxRing::<8>::new();
        for b in 0..7 {
            assert!(ring.push(b));
        }
        assert!(ring.is_full());
        assert!(!ring.push(0xAA));

        // Reading alone does not free space.
        while ring.pop().is_some() {}
        assert!(!ring.push(0xAA));

        ring.commit();
        assert!(ring.push(0xAA));
        assert_eq!(ring.pop(), Some(0xAA));
    }

    #[test]
    fn span_wraps_around() {
        let mut ring = RxRing::<8>::new();
        for b in 0..6 {
            ring.push(b);
        }
        while ring.pop().is_some() {}
        ring.commit();
        let start = ring.tail();
        for b in 10..15 {
            assert!(ring.push(b));
        }
        for _ in 0..5 {
            ring.pop();
        }
        let collected: Vec<u8> = ring.span(start, ring.tail()).collect();
        assert_eq!(collected, [10, 11, 12, 13, 14]);
        assert_eq!(ring.span(3, 3).count(), 0);
    }

    #[test]
    fn reset_clears_cursors() {
        let mut ring = RxRing::<4>::new();
        ring.push(1);
        ring.push(2);
        ring.pop();
        ring.reset();
        assert_eq!(ring.level(), 0);
        assert_eq!(ring.tail(), 0);
        assert_eq!(ring.committed(), 0);
        assert_eq!(ring.pop(), None);
    }
}
