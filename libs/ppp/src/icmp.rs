//! ICMP echo responder.

use crate::dispatch::Discard;
use crate::fcs::FCS_LEN;
use crate::wire::{IcmpPacket, Ipv4Packet, PPP_HEADER_LEN};

/// Turns an echo request into an echo reply in place and returns the frame
/// length to send. The payload is echoed untouched.
pub(crate) fn echo_reply(frame: &mut [u8], len: usize) -> Result<usize, Discard> {
    let mut ip = Ipv4Packet::new_checked(&mut frame[PPP_HEADER_LEN..len - FCS_LEN])?;
    let mut icmp = IcmpPacket::new_checked(ip.payload_mut())?;
    if icmp.msg_type() != IcmpPacket::<&[u8]>::ECHO_REQUEST {
        return Err(Discard::NotEchoRequest);
    }
    icmp.set_msg_type(IcmpPacket::<&[u8]>::ECHO_REPLY);
    icmp.fill_checksum();

    ip.set_ttl(ip.ttl().saturating_sub(1));
    ip.swap_addresses();
    ip.fill_checksum();
    trace!("icmp: echo reply, {} bytes", ip.total_len());
    Ok(PPP_HEADER_LEN + ip.total_len() as usize + FCS_LEN)
}
