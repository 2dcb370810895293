//! IPv4 helpers shared by the ICMP, UDP and TCP responders.

use core::net::Ipv4Addr;

use crate::checksum::Checksum;
use crate::wire::{pseudo_header, protocol, Ipv4Packet, PppHeader, IPV4_HEADER_LEN, PPP_HEADER_LEN};
use crate::Error;

/// TTL on packets the stack originates.
pub const DEFAULT_TTL: u8 = 128;

/// Checksum of a UDP or TCP segment including its pseudo-header. The checksum
/// field inside `segment` must already be zero.
pub fn transport_checksum(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, segment: &[u8]) -> u16 {
    let mut sum = Checksum::new();
    sum.compute(&pseudo_header(src, dst, protocol, segment.len() as u16), true);
    sum.compute(segment, false)
}

/// Recomputes the transport checksum of the segment carried by `packet`.
/// `field` is the offset of the checksum inside the transport header.
pub fn fill_transport_checksum(packet: &mut [u8], field: usize) -> Result<u16, Error> {
    let mut ip = Ipv4Packet::new_checked(packet)?;
    let (src, dst, proto) = (ip.src(), ip.dst(), ip.protocol());
    let segment = ip.payload_mut();
    if segment.len() < field + 2 {
        return Err(Error::Truncated);
    }
    segment[field..field + 2].fill(0);
    let mut sum = transport_checksum(src, dst, proto, segment);
    if sum == 0 && proto == crate::wire::ip_protocol::UDP {
        // Zero means "no checksum" for UDP.
        sum = 0xFFFF;
    }
    segment[field..field + 2].copy_from_slice(&sum.to_be_bytes());
    Ok(sum)
}

/// Writes a PPP header for IPv4 and a fresh 20-byte IPv4 header at the start
/// of `frame`. Lengths and checksums are left for the caller.
pub fn init_header(
    frame: &mut [u8],
    ident: u16,
    src: Ipv4Addr,
    dst: Ipv4Addr,
    proto: u8,
) -> Result<(), Error> {
    let end = PPP_HEADER_LEN + IPV4_HEADER_LEN;
    if frame.len() < end {
        return Err(Error::BufferTooSmall);
    }
    PppHeader::new(protocol::IPV4).write(frame)?;
    let header = &mut frame[PPP_HEADER_LEN..end];
    header.fill(0);
    header[0] = 0x45;
    header[2..4].copy_from_slice(&(IPV4_HEADER_LEN as u16).to_be_bytes());
    let mut ip = Ipv4Packet::new_checked(header)?;
    ip.set_ident(ident);
    ip.set_flags_fragment(Ipv4Packet::<&[u8]>::DONT_FRAGMENT);
    ip.set_ttl(DEFAULT_TTL);
    ip.set_protocol(proto);
    ip.set_src(src);
    ip.set_dst(dst);
    Ok(())
}
