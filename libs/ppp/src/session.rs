//! The one link context: receive ring, deframer, packet buffer and the small
//! amount of state the protocol handlers share.

use core::net::Ipv4Addr;

use crate::config::Config;
use crate::dispatch::{self, Ctx, Outbound, Outcome};
use crate::hdlc::{Deframer, FLAG};
use crate::relay::{LedBank, LedRelay};
use crate::ring::RxRing;
use crate::transport::Transport;
use crate::{Error, CONNECT_REQUEST, CONNECT_RESPONSE};

pub const RX_BUF_LEN: usize = 4096;
/// Largest unstuffed frame, FCS included, and scratch space for replies.
pub const PKT_BUF_LEN: usize = 1600;

const READ_CHUNK: usize = 64;

/// Diagnostic counters. Reset together with the link.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub frames_sent: u32,
    /// Frames that passed the FCS check.
    pub frames_received: u32,
    pub fcs_errors: u32,
    /// Valid frames that produced no reply.
    pub frames_dropped: u32,
    /// Frames rejected by the deframer for size before any FCS check.
    pub malformed_frames: u32,
    /// Bytes lost to a full receive ring.
    pub bytes_dropped: u32,
    /// Partial frames abandoned because they filled the ring.
    pub overruns: u32,
    pub last_frame_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LinkState {
    pub online: bool,
    pub host_ip: Option<Ipv4Addr>,
    pub ident: u16,
    pub ipcp_naks: u8,
}

impl LinkState {
    pub fn new(initial_ident: u16) -> Self {
        Self {
            online: false,
            host_ip: None,
            ident: initial_ident,
            ipcp_naks: 0,
        }
    }

    /// IP identification for the next originated packet.
    pub fn next_ident(&mut self) -> u16 {
        let ident = self.ident;
        self.ident = self.ident.wrapping_add(1);
        ident
    }
}

/// Streaming search for the dialer's connect string; matches may span reads.
#[derive(Debug, Default, Clone, Copy)]
struct ConnectMatcher {
    matched: usize,
}

impl ConnectMatcher {
    fn feed(&mut self, byte: u8) -> bool {
        if byte == CONNECT_REQUEST[self.matched] {
            self.matched += 1;
        } else {
            // The pattern has no repeated prefix, so restart is enough.
            self.matched = usize::from(byte == CONNECT_REQUEST[0]);
        }
        if self.matched == CONNECT_REQUEST.len() {
            self.matched = 0;
            return true;
        }
        false
    }
}

/// Input to [`Session::intake`].
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    /// The transport has bytes to read.
    Readable,
    /// Bytes already taken off the wire by the caller.
    Received(&'a [u8]),
    /// Drop the link and start over.
    Reset,
}

pub struct Session {
    rx: RxRing<RX_BUF_LEN>,
    deframer: Deframer,
    pkt: [u8; PKT_BUF_LEN],
    link: LinkState,
    stats: Stats,
    connect: ConnectMatcher,
    leds: LedBank,
    config: Config,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            rx: RxRing::new(),
            deframer: Deframer::new(),
            pkt: [0; PKT_BUF_LEN],
            link: LinkState::new(config.initial_ident),
            stats: Stats::default(),
            connect: ConnectMatcher::default(),
            leds: LedBank::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn is_online(&self) -> bool {
        self.link.online
    }

    /// Address the peer proposed in its IPCP request, if any.
    pub fn host_ip(&self) -> Option<Ipv4Addr> {
        self.link.host_ip
    }

    pub fn led_state(&self, address: u8) -> Option<bool> {
        self.leds.state(address)
    }

    /// Reads everything the transport has and answers every complete frame.
    pub fn poll<T: Transport, R: LedRelay>(
        &mut self,
        io: &mut T,
        relay: &mut R,
        now_ms: u64,
    ) -> Result<(), T::Error> {
        self.intake(Event::Readable, io, relay, now_ms)
    }

    pub fn intake<T: Transport, R: LedRelay>(
        &mut self,
        event: Event<'_>,
        io: &mut T,
        relay: &mut R,
        now_ms: u64,
    ) -> Result<(), T::Error> {
        match event {
            Event::Readable => {
                let mut chunk = [0u8; READ_CHUNK];
                loop {
                    let n = io.read_bytes(&mut chunk)?;
                    if n == 0 {
                        break;
                    }
                    self.ingest(&chunk[..n], io)?;
                    self.drain(io, relay, now_ms)?;
                }
            }
            Event::Received(bytes) => {
                for chunk in bytes.chunks(READ_CHUNK) {
                    self.ingest(chunk, io)?;
                    self.drain(io, relay, now_ms)?;
                }
            }
            Event::Reset => self.reset(),
        }
        Ok(())
    }

    /// Tears the link down. LED states survive; everything else starts over.
    pub fn reset(&mut self) {
        self.rx.reset();
        self.deframer.reset();
        self.pkt.fill(0);
        self.link = LinkState::new(self.config.initial_ident);
        self.stats = Stats::default();
        self.connect = ConnectMatcher::default();
    }

    fn ingest<T: Transport>(&mut self, bytes: &[u8], io: &mut T) -> Result<(), T::Error> {
        for &byte in bytes {
            if !self.link.online {
                if self.connect.feed(byte) && self.config.connect_handshake {
                    info!("link: dialer connect string, answering");
                    io.write_all(CONNECT_RESPONSE)?;
                    io.flush()?;
                    self.link.online = true;
                }
                if byte == FLAG {
                    info!("link: online");
                    self.link.online = true;
                }
            }
            self.store(byte);
        }
        Ok(())
    }

    fn store(&mut self, byte: u8) {
        if self.rx.push(byte) {
            return;
        }
        if self.rx.level() == 0 {
            // Everything in the ring belongs to one unterminated frame.
            warn!("rx: ring full inside a frame, resyncing");
            self.deframer.abandon(&mut self.rx);
            self.stats.overruns = self.stats.overruns.wrapping_add(1);
            if self.rx.push(byte) {
                return;
            }
        }
        self.stats.bytes_dropped = self.stats.bytes_dropped.wrapping_add(1);
    }

    fn drain<T: Transport, R: LedRelay>(
        &mut self,
        io: &mut T,
        relay: &mut R,
        now_ms: u64,
    ) -> Result<(), T::Error> {
        while let Some(result) = self.deframer.next_frame(&mut self.rx, &mut self.pkt) {
            let len = match result {
                Ok(len) => len,
                Err(Error::BadFcs(residue)) => {
                    debug!("rx: bad fcs, residue {:x}", residue);
                    self.stats.fcs_errors = self.stats.fcs_errors.wrapping_add(1);
                    continue;
                }
                Err(err) => {
                    debug!("rx: malformed frame: {:?}", err);
                    self.stats.malformed_frames = self.stats.malformed_frames.wrapping_add(1);
                    continue;
                }
            };
            self.stats.frames_received = self.stats.frames_received.wrapping_add(1);
            self.stats.last_frame_ms = Some(now_ms);

            let mut ctx = Ctx {
                out: Outbound::new(&mut *io, &mut self.stats),
                link: &mut self.link,
                leds: &mut self.leds,
                relay: &mut *relay,
                config: &self.config,
            };
            match dispatch::dispatch(&mut self.pkt, len, &mut ctx)? {
                Outcome::Replied | Outcome::Accepted => {}
                Outcome::Dropped(reason) => {
                    debug!("rx: no reply: {:?}", reason);
                    self.stats.frames_dropped = self.stats.frames_dropped.wrapping_add(1);
                }
                Outcome::LinkDown => {
                    info!("link: terminated by peer");
                    self.reset();
                    break;
                }
            }
        }
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
