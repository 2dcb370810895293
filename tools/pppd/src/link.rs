use crate::capture::{Capture, Direction};
use anyhow::{Context, Result};
use blinky_ppp::Transport;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::path::PathBuf;

/// Serial port seen through the session's byte transport.
///
/// Writes collect in a buffer until the session flushes, so a whole frame
/// goes out in one `write_all` and lands in the capture as one chunk.
pub struct SerialLink<P, C: Write> {
    port: P,
    pending: Vec<u8>,
    capture: Option<Capture<C>>,
}

impl<P: Read + Write, C: Write> SerialLink<P, C> {
    pub fn new(port: P, capture: Option<Capture<C>>) -> Self {
        Self {
            port,
            pending: Vec::with_capacity(blinky_ppp::PKT_BUF_LEN * 2),
            capture,
        }
    }

    fn capture(&mut self, dir: Direction, bytes: &[u8]) {
        if let Some(cap) = self.capture.as_mut() {
            if let Err(e) = cap.record(dir, bytes) {
                log::warn!("capture disabled: {e}");
                self.capture = None;
            }
        }
    }
}

/// Pending byte count on the port; `None` when it cannot tell.
pub trait Pending {
    fn pending(&self) -> io::Result<Option<usize>>;
}

impl Pending for Box<dyn serialport::SerialPort> {
    fn pending(&self) -> io::Result<Option<usize>> {
        Ok(Some(self.bytes_to_read()? as usize))
    }
}

impl<P: Read + Write + Pending, C: Write> Transport for SerialLink<P, C> {
    type Error = io::Error;

    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let want = match self.port.pending()? {
            Some(0) => return Ok(0),
            Some(n) => n.min(buf.len()),
            None => buf.len(),
        };
        let n = match self.port.read(&mut buf[..want]) {
            Ok(n) => n,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => 0,
            Err(e) => return Err(e),
        };
        self.capture(Direction::Rx, &buf[..n]);
        Ok(n)
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.pending.push(byte);
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.pending.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let out = std::mem::take(&mut self.pending);
        self.port.write_all(&out)?;
        self.port.flush()?;
        self.capture(Direction::Tx, &out);
        self.pending = out;
        self.pending.clear();
        Ok(())
    }
}

/// Exclusive claim on a serial device for the lifetime of the value.
pub struct PortLock {
    _file: File,
    path: PathBuf,
}

impl PortLock {
    pub fn acquire(port: &str) -> Result<Self> {
        let name: String = port
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let path = std::env::temp_dir().join(format!("blinky-pppd-{name}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("open lock {}", path.display()))?;
        file.try_lock_exclusive()
            .with_context(|| format!("another blinky-pppd is running on {port}"))?;
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timefmt::Clock;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakePort {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
        writes: usize,
    }

    impl Read for FakePort {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.rx.len());
            for (slot, b) in buf.iter_mut().zip(self.rx.drain(..n)) {
                *slot = b;
            }
            Ok(n)
        }
    }

    impl Write for FakePort {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes += 1;
            self.tx.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Pending for FakePort {
        fn pending(&self) -> io::Result<Option<usize>> {
            Ok(Some(self.rx.len()))
        }
    }

    #[test]
    fn reads_only_what_is_pending() {
        let mut port = FakePort::default();
        port.rx.extend(b"CLIENT");
        let mut link: SerialLink<_, Vec<u8>> = SerialLink::new(port, None);
        let mut buf = [0u8; 4];
        assert_eq!(link.read_bytes(&mut buf).unwrap(), 4);
        assert_eq!(link.read_bytes(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"NT");
        assert_eq!(link.read_bytes(&mut buf).unwrap(), 0);
    }

    #[test]
    fn writes_are_batched_until_flush() {
        let cap = Capture::new(Vec::new(), Clock::new());
        let mut link = SerialLink::new(FakePort::default(), Some(cap));
        link.write_byte(0x7E).unwrap();
        link.write_all(&[0xFF, 0x7D, 0x23]).unwrap();
        link.write_byte(0x7E).unwrap();
        assert!(link.port.tx.is_empty());
        link.flush().unwrap();
        link.flush().unwrap();
        assert_eq!(link.port.tx, [0x7E, 0xFF, 0x7D, 0x23, 0x7E]);
        assert_eq!(link.port.writes, 1);

        let cap = link.capture.take().unwrap();
        let text = String::from_utf8(cap.into_inner()).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("\"hex\":\"7eff7d237e\""));
    }

    #[test]
    fn second_lock_on_same_port_fails() {
        let port = format!("/dev/test-{}", std::process::id());
        let first = PortLock::acquire(&port).unwrap();
        assert!(PortLock::acquire(&port).is_err());
        let path = first.path().to_path_buf();
        drop(first);
        assert!(PortLock::acquire(&port).is_ok());
        let _ = std::fs::remove_file(path);
    }
}
