//! Link Control Protocol, reduced to "no options, please".
//!
//! A Configure-Request with any options is rejected wholesale. An empty one
//! is acked and answered with our own empty request in the same burst.

use crate::dispatch::{Discard, Outbound, Outcome};
use crate::fcs::FCS_LEN;
use crate::transport::Transport;
use crate::wire::{ControlPacket, CONTROL_HEADER_LEN, PPP_HEADER_LEN};

pub const CONFIGURE_REQUEST: u8 = 1;
pub const CONFIGURE_ACK: u8 = 2;
pub const CONFIGURE_NAK: u8 = 3;
pub const CONFIGURE_REJECT: u8 = 4;
pub const TERMINATE_REQUEST: u8 = 5;
pub const TERMINATE_ACK: u8 = 6;

pub(crate) fn handle<T: Transport>(
    frame: &mut [u8],
    len: usize,
    out: &mut Outbound<'_, T>,
) -> Result<Outcome, T::Error> {
    let (code, length) = match ControlPacket::new_checked(&frame[PPP_HEADER_LEN..len - FCS_LEN]) {
        Ok(pkt) => (pkt.code(), pkt.length()),
        Err(e) => return Ok(Outcome::Dropped(e.into())),
    };
    match code {
        CONFIGURE_REQUEST if length as usize != CONTROL_HEADER_LEN => {
            debug!("lcp: rejecting {} bytes of options", length);
            set_code(frame, CONFIGURE_REJECT);
            out.send(&mut frame[..len])?;
            Ok(Outcome::Replied)
        }
        CONFIGURE_REQUEST => {
            set_code(frame, CONFIGURE_ACK);
            out.send(&mut frame[..len])?;
            set_code(frame, CONFIGURE_REQUEST);
            out.send(&mut frame[..len])?;
            Ok(Outcome::Replied)
        }
        TERMINATE_REQUEST => {
            info!("lcp: terminate request");
            set_code(frame, TERMINATE_ACK);
            out.send(&mut frame[..len])?;
            Ok(Outcome::LinkDown)
        }
        other => Ok(Outcome::Dropped(Discard::UnsupportedCode(other))),
    }
}

fn set_code(frame: &mut [u8], code: u8) {
    frame[PPP_HEADER_LEN] = code;
}
