//! UDP responder: `echo ` datagrams are bounced back annotated, `test`
//! datagrams get a freshly built reply carrying the sent-frame counter.

use core::fmt::Write as _;
use core::net::SocketAddrV4;

use heapless::String;

use crate::dispatch::Discard;
use crate::fcs::FCS_LEN;
use crate::ip::{fill_transport_checksum, init_header};
use crate::session::LinkState;
use crate::wire::{
    ip_protocol, Ipv4Packet, UdpPacket, IPV4_HEADER_LEN, PPP_HEADER_LEN, UDP_HEADER_LEN,
};
use crate::Error;

pub const ECHO_PREFIX: &[u8] = b"echo ";
pub const TEST_PREFIX: &[u8] = b"test";

const ECHO_MARKER: &[u8; 4] = b"Got{";
const ECHO_APPENDIX: &[u8] = b"} UDP Server: PPP-Blinky\n";
const UDP_CHECKSUM_FIELD: usize = 6;

pub(crate) fn reply(
    frame: &mut [u8],
    len: usize,
    link: &mut LinkState,
    frames_sent: u32,
) -> Result<usize, Discard> {
    let ip = Ipv4Packet::new_checked(&frame[PPP_HEADER_LEN..len - FCS_LEN])?;
    let (src, dst, header_len) = (ip.src(), ip.dst(), ip.header_len());
    let udp = UdpPacket::new_checked(ip.payload())?;
    let (src_port, dst_port, udp_len) = (udp.src_port(), udp.dst_port(), udp.len() as usize);

    if udp.payload().starts_with(ECHO_PREFIX) {
        debug!("udp: echo from port {}", src_port);
        Ok(echo(frame, header_len, udp_len)?)
    } else if udp.payload().starts_with(TEST_PREFIX) {
        debug!("udp: test from port {}", src_port);
        let mut msg: String<32> = String::new();
        // u32 always fits.
        let _ = writeln!(msg, "Response Count {}", frames_sent);
        Ok(build_datagram(
            frame,
            link.next_ident(),
            SocketAddrV4::new(dst, dst_port),
            SocketAddrV4::new(src, src_port),
            msg.as_bytes(),
        )?)
    } else {
        Err(Discard::NoUdpCommand)
    }
}

/// Rewrites the datagram in place: addresses and ports swapped, the first four
/// payload bytes replaced by the marker, the appendix added at the end.
fn echo(frame: &mut [u8], header_len: usize, udp_len: usize) -> Result<usize, Error> {
    let udp_start = PPP_HEADER_LEN + header_len;
    let data_end = udp_start + udp_len;
    let new_udp_len = udp_len + ECHO_APPENDIX.len();
    let total = header_len + new_udp_len;
    if PPP_HEADER_LEN + total + FCS_LEN > frame.len() {
        return Err(Error::BufferTooSmall);
    }

    let data = udp_start + UDP_HEADER_LEN;
    frame[data..data + ECHO_MARKER.len()].copy_from_slice(ECHO_MARKER);
    frame[data_end..data_end + ECHO_APPENDIX.len()].copy_from_slice(ECHO_APPENDIX);

    let packet = &mut frame[PPP_HEADER_LEN..PPP_HEADER_LEN + total];
    packet[2..4].copy_from_slice(&(total as u16).to_be_bytes());
    let mut ip = Ipv4Packet::new_checked(&mut *packet)?;
    ip.swap_addresses();
    let mut udp = UdpPacket::new_checked(ip.payload_mut())?;
    let (src_port, dst_port) = (udp.src_port(), udp.dst_port());
    udp.set_src_port(dst_port);
    udp.set_dst_port(src_port);
    udp.set_len(new_udp_len as u16);
    ip.fill_checksum();
    fill_transport_checksum(packet, UDP_CHECKSUM_FIELD)?;

    Ok(PPP_HEADER_LEN + total + FCS_LEN)
}

/// Builds a complete PPP-framed UDP datagram at the start of `frame`, leaving
/// room for the FCS. Returns the frame length including the FCS.
pub fn build_datagram(
    frame: &mut [u8],
    ident: u16,
    src: SocketAddrV4,
    dst: SocketAddrV4,
    payload: &[u8],
) -> Result<usize, Error> {
    let udp_len = UDP_HEADER_LEN + payload.len();
    let total = IPV4_HEADER_LEN + udp_len;
    let frame_len = PPP_HEADER_LEN + total + FCS_LEN;
    if frame_len > frame.len() || total > u16::MAX as usize {
        return Err(Error::BufferTooSmall);
    }
    init_header(frame, ident, *src.ip(), *dst.ip(), ip_protocol::UDP)?;

    let packet = &mut frame[PPP_HEADER_LEN..PPP_HEADER_LEN + total];
    packet[IPV4_HEADER_LEN + UDP_HEADER_LEN..].copy_from_slice(payload);
    packet[2..4].copy_from_slice(&(total as u16).to_be_bytes());
    let mut ip = Ipv4Packet::new_checked(&mut *packet)?;
    {
        let segment = ip.payload_mut();
        segment[..UDP_HEADER_LEN].fill(0);
        segment[4..6].copy_from_slice(&(udp_len as u16).to_be_bytes());
        let mut udp = UdpPacket::new_checked(segment)?;
        udp.set_src_port(src.port());
        udp.set_dst_port(dst.port());
    }
    ip.fill_checksum();
    fill_transport_checksum(packet, UDP_CHECKSUM_FIELD)?;
    Ok(frame_len)
}
