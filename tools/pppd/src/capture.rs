use crate::timefmt::Clock;
use anyhow::{Context, Result};
use serde_json::json;
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Rx,
    Tx,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Rx => "rx",
            Direction::Tx => "tx",
        }
    }
}

/// JSON-lines log of every chunk crossing the serial port.
pub struct Capture<W: Write> {
    out: W,
    clock: Clock,
}

impl Capture<BufWriter<std::fs::File>> {
    pub fn open(path: &Path, clock: Clock) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open capture {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file), clock))
    }
}

impl<W: Write> Capture<W> {
    pub fn new(out: W, clock: Clock) -> Self {
        Self { out, clock }
    }

    pub fn record(&mut self, dir: Direction, bytes: &[u8]) -> std::io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let ts = self.clock.now();
        let line = json!({
            "ts": ts.iso(),
            "mono_ms": ts.mono_ms() as u64,
            "dir": dir.as_str(),
            "len": bytes.len(),
            "hex": hex(bytes),
        });
        writeln!(self.out, "{}", line)?;
        self.out.flush()
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.out
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}
