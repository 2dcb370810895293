//! Routes a validated frame to its protocol handler and sends the reply.

use crate::config::Config;
use crate::relay::{LedBank, LedRelay};
use crate::session::{LinkState, Stats};
use crate::transport::Transport;
use crate::wire::{ip_protocol, protocol, Ipv4Packet, PppHeader, PPP_HEADER_LEN};
use crate::{fcs::FCS_LEN, hdlc, http, icmp, ipcp, lcp, tcp, udp, Error};

/// Why a frame got no reply.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    Malformed(Error),
    NotPpp,
    UnknownProtocol(u16),
    UnknownIpProtocol(u8),
    UnsupportedCode(u8),
    UnsupportedOption(u8),
    NakBudgetExhausted,
    NotEchoRequest,
    NoUdpCommand,
    PureAck,
    TcpFlags(u8),
}

impl From<Error> for Discard {
    fn from(err: Error) -> Self {
        Discard::Malformed(err)
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Replied,
    /// Handled without needing an answer.
    Accepted,
    Dropped(Discard),
    /// Peer terminated the link; the session must reset.
    LinkDown,
}

/// Frame-level writer: seals, stuffs and counts every outgoing frame.
pub(crate) struct Outbound<'a, T> {
    io: &'a mut T,
    stats: &'a mut Stats,
}

impl<'a, T: Transport> Outbound<'a, T> {
    pub fn new(io: &'a mut T, stats: &'a mut Stats) -> Self {
        Self { io, stats }
    }

    /// Frames sent so far, before this one.
    pub fn frames_sent(&self) -> u32 {
        self.stats.frames_sent
    }

    /// `frame` must end with two spare bytes for the FCS.
    pub fn send(&mut self, frame: &mut [u8]) -> Result<(), T::Error> {
        if hdlc::seal(frame).is_err() {
            return Ok(());
        }
        self.stats.frames_sent = self.stats.frames_sent.wrapping_add(1);
        trace!("tx frame len={}", frame.len());
        let io = &mut *self.io;
        hdlc::stuff(frame, |b| io.write_byte(b))?;
        self.io.flush()
    }
}

pub(crate) struct Ctx<'a, T, R> {
    pub out: Outbound<'a, T>,
    pub link: &'a mut LinkState,
    pub leds: &'a mut LedBank,
    pub relay: &'a mut R,
    pub config: &'a Config,
}

/// `frame[..len]` is a received frame with its FCS; the rest of `frame` is
/// free space for growing the reply.
pub(crate) fn dispatch<T: Transport, R: LedRelay>(
    frame: &mut [u8],
    len: usize,
    ctx: &mut Ctx<'_, T, R>,
) -> Result<Outcome, T::Error> {
    if len < PPP_HEADER_LEN + FCS_LEN {
        return Ok(Outcome::Dropped(Error::Truncated.into()));
    }
    let header = match PppHeader::parse(&frame[..len]) {
        Ok(h) => h,
        Err(e) => return Ok(Outcome::Dropped(e.into())),
    };
    if !header.is_standard() {
        return Ok(Outcome::Dropped(Discard::NotPpp));
    }
    match header.protocol {
        protocol::LCP => lcp::handle(frame, len, &mut ctx.out),
        protocol::IPCP => ipcp::handle(frame, len, ctx),
        protocol::IPV4 => ipv4(frame, len, ctx),
        other => Ok(Outcome::Dropped(Discard::UnknownProtocol(other))),
    }
}

fn ipv4<T: Transport, R: LedRelay>(
    frame: &mut [u8],
    len: usize,
    ctx: &mut Ctx<'_, T, R>,
) -> Result<Outcome, T::Error> {
    let proto = match Ipv4Packet::new_checked(&frame[PPP_HEADER_LEN..len - FCS_LEN]) {
        Ok(ip) => ip.protocol(),
        Err(e) => return Ok(Outcome::Dropped(e.into())),
    };
    let frames_sent = ctx.out.frames_sent();
    let planned = match proto {
        ip_protocol::ICMP => icmp::echo_reply(frame, len),
        ip_protocol::UDP => udp::reply(frame, len, ctx.link, frames_sent),
        ip_protocol::TCP => {
            let mut site = http::Site {
                leds: &mut *ctx.leds,
                relay: &mut *ctx.relay,
                server_name: ctx.config.server_name.as_str(),
                frames_sent,
            };
            tcp::reply(frame, len, ctx.config.tcp_window, &mut site)
        }
        other => Err(Discard::UnknownIpProtocol(other)),
    };
    match planned {
        Ok(reply_len) => {
            ctx.out.send(&mut frame[..reply_len])?;
            if proto == ip_protocol::TCP {
                tcp::scrub(frame);
            }
            Ok(Outcome::Replied)
        }
        Err(reason) => Ok(Outcome::Dropped(reason)),
    }
}
