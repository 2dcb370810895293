//! Stateless TCP responder.
//!
//! Each reply is computed from the incoming segment alone. A SYN is answered
//! with a SYN-ACK whose sequence number is derived from the peer's; data
//! carrying an HTTP GET gets the whole response in one segment; a FIN is
//! answered with FIN-ACK. Nothing about the connection is remembered.

use crate::dispatch::Discard;
use crate::fcs::FCS_LEN;
use crate::http::{Request, Site};
use crate::ip::fill_transport_checksum;
use crate::relay::LedRelay;
use crate::wire::{Ipv4Packet, TcpFlags, TcpPacket, IPV4_HEADER_LEN, PPP_HEADER_LEN, TCP_HEADER_LEN};

/// Added to the peer's initial sequence number to make ours.
pub const SYN_SEQ_OFFSET: u32 = 0x1000_0000;

const TCP_CHECKSUM_FIELD: usize = 16;
/// First byte of outgoing TCP data.
const DATA_OUT: usize = PPP_HEADER_LEN + IPV4_HEADER_LEN + TCP_HEADER_LEN;
const SCRUB_LEN: usize = 500;

const FIN: u8 = TcpFlags::FIN.bits();
const SYN: u8 = TcpFlags::SYN.bits();
const PSH: u8 = TcpFlags::PSH.bits();
const ACK: u8 = TcpFlags::ACK.bits();
const ACK_PSH: u8 = ACK | PSH;
const FIN_ACK: u8 = FIN | ACK;
const FIN_PSH_ACK: u8 = FIN | PSH | ACK;

pub(crate) fn reply<R: LedRelay>(
    frame: &mut [u8],
    len: usize,
    window: u16,
    site: &mut Site<'_, R>,
) -> Result<usize, Discard> {
    let (ip_header_len, data_len, seq_in, ack_in, flags, request) = {
        let ip = Ipv4Packet::new_checked(&frame[PPP_HEADER_LEN..len - FCS_LEN])?;
        let tcp = TcpPacket::new_checked(ip.payload())?;
        let data = tcp.payload();
        (
            ip.header_len(),
            data.len(),
            tcp.seq(),
            tcp.ack(),
            tcp.flags().without_ecn(),
            Request::parse(data),
        )
    };

    let mut ack_out = seq_in.wrapping_add(data_len as u32);
    let mut seq_out = ack_in;
    let mut response = None;
    let flags_out = match flags.bits() {
        SYN => {
            seq_out = seq_in.wrapping_add(SYN_SEQ_OFFSET);
            ack_out = ack_out.wrapping_add(1);
            TcpFlags::SYN | TcpFlags::ACK
        }
        ACK if data_len == 0 => return Err(Discard::PureAck),
        ACK | ACK_PSH => match request {
            Some(req) => {
                response = Some(req);
                TcpFlags::ACK | TcpFlags::PSH
            }
            None => TcpFlags::ACK,
        },
        FIN | FIN_ACK | FIN_PSH_ACK => {
            ack_out = ack_out.wrapping_add(1);
            TcpFlags::ACK | TcpFlags::FIN
        }
        other => return Err(Discard::TcpFlags(other)),
    };

    // Replies carry bare 20-byte IP and TCP headers; pull the fixed TCP
    // header down over any IP options.
    let tcp_start = PPP_HEADER_LEN + IPV4_HEADER_LEN;
    if ip_header_len > IPV4_HEADER_LEN {
        let from = PPP_HEADER_LEN + ip_header_len;
        frame.copy_within(from..from + TCP_HEADER_LEN, tcp_start);
    }

    let body_len = match &response {
        Some(req) => {
            let room = frame.len().saturating_sub(FCS_LEN);
            site.respond(req, frame.get_mut(DATA_OUT..room).unwrap_or_default())?
        }
        None => 0,
    };

    let total = IPV4_HEADER_LEN + TCP_HEADER_LEN + body_len;
    let packet = &mut frame[PPP_HEADER_LEN..PPP_HEADER_LEN + total];
    packet[0] = 0x45;
    packet[2..4].copy_from_slice(&(total as u16).to_be_bytes());
    packet[IPV4_HEADER_LEN + 12] = (TCP_HEADER_LEN as u8 / 4) << 4;
    let mut ip = Ipv4Packet::new_checked(&mut *packet)?;
    ip.swap_addresses();
    {
        let mut tcp = TcpPacket::new_checked(ip.payload_mut())?;
        tcp.swap_ports();
        tcp.set_seq(seq_out);
        tcp.set_ack(ack_out);
        tcp.set_flags(flags_out);
        tcp.set_window(window);
        tcp.set_urgent(0);
    }
    ip.fill_checksum();
    fill_transport_checksum(packet, TCP_CHECKSUM_FIELD)?;
    trace!(
        "tcp: flags {:x} -> {:x}, {} data bytes",
        flags.bits(),
        flags_out.bits(),
        body_len
    );

    Ok(PPP_HEADER_LEN + total + FCS_LEN)
}

/// Clears the data area after a reply so later in-place parsing cannot see
/// stale bytes.
pub(crate) fn scrub(frame: &mut [u8]) {
    let end = (DATA_OUT + SCRUB_LEN).min(frame.len());
    if let Some(area) = frame.get_mut(DATA_OUT..end) {
        area.fill(0);
    }
}
