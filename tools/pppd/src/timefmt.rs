use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug)]
pub struct Clock {
    start: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
    pub fn now(&self) -> Timestamp {
        Timestamp {
            wall: Local::now(),
            mono: self.start.elapsed(),
        }
    }
    /// Milliseconds since the clock started, as the session wants them.
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[derive(Clone, Debug)]
pub struct Timestamp {
    pub wall: DateTime<Local>,
    pub mono: Duration,
}

impl Timestamp {
    pub fn iso(&self) -> String {
        self.wall
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }
    pub fn mono_ms(&self) -> u128 {
        self.mono.as_millis()
    }
}
