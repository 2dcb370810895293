//! IP Control Protocol. The peer's address is accepted as proposed; our own
//! request carries no options, so a Nak for an address is answered by asking
//! again with whatever the peer suggested.

use core::net::Ipv4Addr;

use crate::dispatch::{Ctx, Discard, Outcome};
use crate::fcs::FCS_LEN;
use crate::lcp::{CONFIGURE_ACK, CONFIGURE_NAK, CONFIGURE_REQUEST};
use crate::relay::LedRelay;
use crate::transport::Transport;
use crate::wire::{ControlPacket, CONTROL_HEADER_LEN, PPP_HEADER_LEN};

pub const OPTION_IP_ADDRESS: u8 = 3;

/// Header plus an IP-Address option: type, length, four address bytes.
const ADDRESS_OPTION_END: usize = CONTROL_HEADER_LEN + 6;

pub(crate) fn handle<T: Transport, R: LedRelay>(
    frame: &mut [u8],
    len: usize,
    ctx: &mut Ctx<'_, T, R>,
) -> Result<Outcome, T::Error> {
    let body = &frame[PPP_HEADER_LEN..len - FCS_LEN];
    let (code, option, address) = match ControlPacket::new_checked(body) {
        Ok(pkt) => (pkt.code(), pkt.first_option(), peer_address(pkt.options())),
        Err(e) => return Ok(Outcome::Dropped(e.into())),
    };
    match code {
        CONFIGURE_REQUEST => {
            if let (Some(OPTION_IP_ADDRESS), Some(addr)) = (option, address) {
                let [a, b, c, d] = addr.octets();
                info!("ipcp: peer address {}.{}.{}.{}", a, b, c, d);
                ctx.link.host_ip = Some(addr);
            }
            ctx.link.ipcp_naks = 0;
            set_code(frame, CONFIGURE_ACK);
            ctx.out.send(&mut frame[..len])?;

            // Our own request: same identifier, no options.
            set_code(frame, CONFIGURE_REQUEST);
            if let Ok(mut pkt) = ControlPacket::new_checked(&mut frame[PPP_HEADER_LEN..]) {
                pkt.set_length(CONTROL_HEADER_LEN as u16);
            }
            let own = PPP_HEADER_LEN + CONTROL_HEADER_LEN + FCS_LEN;
            ctx.out.send(&mut frame[..own])?;
            Ok(Outcome::Replied)
        }
        CONFIGURE_NAK if option == Some(OPTION_IP_ADDRESS) => {
            if ctx.link.ipcp_naks >= ctx.config.max_ipcp_naks {
                warn!("ipcp: giving up after {} naks", ctx.link.ipcp_naks);
                return Ok(Outcome::Dropped(Discard::NakBudgetExhausted));
            }
            ctx.link.ipcp_naks += 1;
            set_code(frame, CONFIGURE_REQUEST);
            ctx.out.send(&mut frame[..len])?;
            Ok(Outcome::Replied)
        }
        CONFIGURE_NAK => Ok(Outcome::Dropped(Discard::UnsupportedOption(
            option.unwrap_or(0),
        ))),
        CONFIGURE_ACK => {
            ctx.link.ipcp_naks = 0;
            Ok(Outcome::Accepted)
        }
        other => Ok(Outcome::Dropped(Discard::UnsupportedCode(other))),
    }
}

fn peer_address(options: &[u8]) -> Option<Ipv4Addr> {
    let opt = options.get(..ADDRESS_OPTION_END - CONTROL_HEADER_LEN)?;
    Some(Ipv4Addr::new(opt[2], opt[3], opt[4], opt[5]))
}

fn set_code(frame: &mut [u8], code: u8) {
    frame[PPP_HEADER_LEN] = code;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dispatch::Outbound;
    use crate::relay::LedBank;
    use crate::session::{LinkState, Stats};
    use crate::testutil::{frame_with_fcs, Loopback};

    const REQ_WITH_ADDR: [u8; 14] = [
        0xFF, 0x03, 0x80, 0x21, 0x01, 0x07, 0x00, 0x0A, 0x03, 0x06, 172, 10, 10, 1,
    ];

    struct Harness {
        io: Loopback,
        stats: Stats,
        link: LinkState,
        leds: LedBank,
        config: Config,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                io: Loopback::default(),
                stats: Stats::default(),
                link: LinkState::new(10000),
                leds: LedBank::new(),
                config: Config::default(),
            }
        }

        fn run(&mut self, payload: &[u8]) -> Outcome {
            let mut buf = [0u8; 64];
            let len = frame_with_fcs(payload, &mut buf);
            let mut relay = ();
            let mut ctx = Ctx {
                out: Outbound::new(&mut self.io, &mut self.stats),
                link: &mut self.link,
                leds: &mut self.leds,
                relay: &mut relay,
                config: &self.config,
            };
            handle(&mut buf, len, &mut ctx).unwrap()
        }
    }

    #[test]
    fn request_captures_address_and_answers_twice() {
        let mut h = Harness::new();
        assert_eq!(h.run(&REQ_WITH_ADDR), Outcome::Replied);
        assert_eq!(h.link.host_ip, Some(Ipv4Addr::new(172, 10, 10, 1)));

        let frames = h.io.frames();
        assert_eq!(frames.len(), 2);
        let mut ack = REQ_WITH_ADDR;
        ack[4] = CONFIGURE_ACK;
        assert_eq!(frames[0], ack);
        assert_eq!(frames[1], [0xFF, 0x03, 0x80, 0x21, 0x01, 0x07, 0x00, 0x04]);
    }

    #[test]
    fn request_without_address_keeps_previous() {
        let mut h = Harness::new();
        h.link.host_ip = Some(Ipv4Addr::new(10, 0, 0, 9));
        assert_eq!(
            h.run(&[0xFF, 0x03, 0x80, 0x21, 0x01, 0x01, 0x00, 0x04]),
            Outcome::Replied
        );
        assert_eq!(h.link.host_ip, Some(Ipv4Addr::new(10, 0, 0, 9)));
        assert_eq!(h.io.frames().len(), 2);
    }

    #[test]
    fn nak_with_address_is_turned_into_request() {
        let mut h = Harness::new();
        let mut nak = REQ_WITH_ADDR;
        nak[4] = CONFIGURE_NAK;
        assert_eq!(h.run(&nak), Outcome::Replied);
        let frames = h.io.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][4], CONFIGURE_REQUEST);
        assert_eq!(&frames[0][5..], &nak[5..]);
    }

    #[test]
    fn nak_loop_is_bounded() {
        let mut h = Harness::new();
        h.config.max_ipcp_naks = 2;
        let mut nak = REQ_WITH_ADDR;
        nak[4] = CONFIGURE_NAK;
        assert_eq!(h.run(&nak), Outcome::Replied);
        assert_eq!(h.run(&nak), Outcome::Replied);
        assert_eq!(h.run(&nak), Outcome::Dropped(Discard::NakBudgetExhausted));
        assert_eq!(h.io.frames().len(), 2);

        // A fresh request from the peer re-arms the budget.
        h.run(&REQ_WITH_ADDR);
        assert_eq!(h.link.ipcp_naks, 0);
    }

    #[test]
    fn nak_for_other_option_and_ack_are_silent() {
        let mut h = Harness::new();
        let nak = [0xFF, 0x03, 0x80, 0x21, 0x03, 0x01, 0x00, 0x0A, 0x81, 0x06, 0, 0, 0, 0];
        assert_eq!(h.run(&nak), Outcome::Dropped(Discard::UnsupportedOption(0x81)));
        let ack = [0xFF, 0x03, 0x80, 0x21, 0x02, 0x01, 0x00, 0x04];
        assert_eq!(h.run(&ack), Outcome::Accepted);
        assert!(h.io.sent.is_empty());
    }
}
