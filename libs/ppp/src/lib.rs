#![no_std]
//! Minimal PPP stack for a single peer on an HDLC-framed serial link.
//!
//! The stack terminates LCP and IPCP with trivial "no options" negotiation,
//! answers ICMP echo, a pair of UDP test commands, and fakes TCP connections
//! well enough to serve a small HTTP page and a WebSocket handshake. All state
//! lives in one [`Session`]; the caller supplies the serial port through
//! [`Transport`] and the radio LED relay through [`LedRelay`].

#[macro_use]
mod fmt;

pub mod checksum;
pub mod fcs;
pub mod hdlc;
pub mod http;
pub mod ip;
pub mod ring;
pub mod wire;

mod config;
mod dispatch;
mod icmp;
mod ipcp;
mod lcp;
mod relay;
mod session;
mod tcp;
mod transport;
mod udp;
mod websocket;

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod testutil;

pub use config::{Config, SERVER_NAME_CAPACITY};
pub use dispatch::{Discard, Outcome};
pub use relay::{LedBank, LedRelay, LED_COUNT};
pub use session::{Event, Session, Stats, PKT_BUF_LEN, RX_BUF_LEN};
pub use tcp::SYN_SEQ_OFFSET;
pub use transport::Transport;
pub use udp::build_datagram;
pub use websocket::accept_key;

/// Raw bytes the peer's dialer sends before starting PPP.
pub const CONNECT_REQUEST: &[u8] = b"CLIENT";
/// Raw answer expected by the dialer.
pub const CONNECT_RESPONSE: &[u8] = b"CLIENTSERVER";

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    BufferTooSmall,
    Truncated,
    InvalidLength,
    InvalidVersion(u8),
    FrameTooLarge,
    /// FCS residue over the whole frame was not 0xF0B8.
    BadFcs(u16),
}
