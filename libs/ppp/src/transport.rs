/// Byte-oriented serial link under the framer.
///
/// Reads are non-blocking: `read_bytes` returns `Ok(0)` when nothing is
/// pending. Writes may be buffered until `flush`.
pub trait Transport {
    type Error;

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error>;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        for &b in bytes {
            self.write_byte(b)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
