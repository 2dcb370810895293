use blinky_ppp::LedRelay;
use blinky_radio_link::{LedCommand, RadioParams};
use std::io::Write;

/// Forwards LED switch requests to the peer board as radio payloads.
///
/// Without an output port the commands are only logged.
pub struct RadioRelay<W> {
    params: RadioParams,
    out: Option<W>,
    packet_index: u16,
}

impl<W: Write> RadioRelay<W> {
    pub fn new(params: RadioParams, out: Option<W>) -> Self {
        Self {
            params,
            out,
            packet_index: 0,
        }
    }

    /// Command payload padded with zeros to the configured radio length.
    fn payload(&self, cmd: &LedCommand) -> Vec<u8> {
        let mut payload = cmd.encode().to_vec();
        let len = usize::from(self.params.payload_len).max(payload.len());
        payload.resize(len, 0);
        payload
    }
}

impl<W: Write> LedRelay for RadioRelay<W> {
    fn set_peer_led_state(&mut self, address: u8, on: bool) {
        // Numbered from 1; the index advances before each send.
        self.packet_index = self.packet_index.wrapping_add(1);
        let cmd = LedCommand {
            packet_index: self.packet_index,
            address,
            on,
        };
        let payload = self.payload(&cmd);
        log::info!(
            "relay: led {} -> {} (packet {}, channel {})",
            address,
            if on { "on" } else { "off" },
            cmd.packet_index,
            self.params.channel
        );
        if let Some(out) = self.out.as_mut() {
            if let Err(e) = out.write_all(&payload).and_then(|_| out.flush()) {
                log::warn!("relay: write failed: {e}");
            }
        }
    }

    fn toggle_local_led(&mut self, address: u8) {
        log::debug!("relay: local led {} toggled", address);
    }
}
