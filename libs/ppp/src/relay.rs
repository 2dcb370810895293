//! LED state mirrored to the radio peer.

/// LEDs addressable from the web page, at relay addresses 1..=3.
pub const LED_COUNT: usize = 3;

/// Receives LED changes requested over HTTP.
pub trait LedRelay {
    /// Forward the new state of the LED at `address` to the radio peer.
    fn set_peer_led_state(&mut self, address: u8, on: bool);

    /// Mirror the change on a board-local LED, if there is one.
    fn toggle_local_led(&mut self, _address: u8) {}
}

impl LedRelay for () {
    fn set_peer_led_state(&mut self, _address: u8, _on: bool) {}
}

impl<R: LedRelay + ?Sized> LedRelay for &mut R {
    fn set_peer_led_state(&mut self, address: u8, on: bool) {
        (**self).set_peer_led_state(address, on);
    }

    fn toggle_local_led(&mut self, address: u8) {
        (**self).toggle_local_led(address);
    }
}

/// Remembered on/off state per relay address. Survives link resets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedBank {
    states: [bool; LED_COUNT],
}

impl LedBank {
    pub const fn new() -> Self {
        Self {
            states: [false; LED_COUNT],
        }
    }

    pub fn state(&self, address: u8) -> Option<bool> {
        let idx = (address as usize).checked_sub(1)?;
        self.states.get(idx).copied()
    }

    /// Flips the LED at `address` and returns its new state.
    pub fn toggle(&mut self, address: u8) -> Option<bool> {
        let idx = (address as usize).checked_sub(1)?;
        let slot = self.states.get_mut(idx)?;
        *slot = !*slot;
        Some(*slot)
    }
}
