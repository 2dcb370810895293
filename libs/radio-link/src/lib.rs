#![no_std]
//! Companion radio definitions for the blinky link: the connectivity-test
//! parameter table and the LED relay command that rides in radio payloads.

use core::fmt;
use core::ops::RangeInclusive;

#[cfg(test)]
extern crate std;

// Parameter ranges and defaults of the GENFSK connectivity test.
pub const CHANNEL_RANGE: RangeInclusive<u8> = 0..=0x7F;
pub const DEFAULT_CHANNEL: u8 = 0x2A;
pub const POWER_RANGE: RangeInclusive<u8> = 0..=0x20;
pub const DEFAULT_POWER: u8 = 0x08;
pub const PAYLOAD_LEN_RANGE: RangeInclusive<u8> = 6..=63;
pub const DEFAULT_PAYLOAD_LEN: u8 = 6;

/// Number of entries in [`ParamTable`].
pub const PARAM_COUNT: usize = 4;

/// Trailing opcode bytes of an LED command payload.
pub const LED_OPCODE: [u8; 2] = [0xAB, 0xDC];
pub const LED_COMMAND_LEN: usize = 6;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    OutOfRange { param: &'static str, value: u32 },
    BadOpcode,
    Truncated,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfRange { param, value } => {
                write!(f, "{} out of range: {}", param, value)
            }
            Error::BadOpcode => f.write_str("not an LED command"),
            Error::Truncated => f.write_str("payload truncated"),
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum RadioMode {
    #[default]
    Rx = 1,
    Tx = 2,
}

impl RadioMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            RadioMode::Rx => "RX",
            RadioMode::Tx => "TX",
        }
    }
}

/// Typed view of the radio configuration.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RadioParams {
    pub mode: RadioMode,
    pub channel: u8,
    pub power: u8,
    pub payload_len: u8,
}

impl Default for RadioParams {
    fn default() -> Self {
        Self {
            mode: RadioMode::Rx,
            channel: DEFAULT_CHANNEL,
            power: DEFAULT_POWER,
            payload_len: DEFAULT_PAYLOAD_LEN,
        }
    }
}

impl RadioParams {
    pub fn validate(&self) -> Result<(), Error> {
        check("Channel", &CHANNEL_RANGE, self.channel)?;
        check("Power", &POWER_RANGE, self.power)?;
        check("Payload", &PAYLOAD_LEN_RANGE, self.payload_len)?;
        Ok(())
    }

    pub fn table(&self) -> ParamTable {
        ParamTable {
            entries: [
                Param {
                    name: "Mode",
                    value: ParamValue::Text(self.mode.as_str()),
                },
                Param {
                    name: "Channel",
                    value: ParamValue::Number(self.channel as u32),
                },
                Param {
                    name: "Power",
                    value: ParamValue::Number(self.power as u32),
                },
                Param {
                    name: "Payload",
                    value: ParamValue::Number(self.payload_len as u32),
                },
            ],
        }
    }
}

fn check(param: &'static str, range: &RangeInclusive<u8>, value: u8) -> Result<(), Error> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(Error::OutOfRange {
            param,
            value: value as u32,
        })
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamValue {
    Number(u32),
    Text(&'static str),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(n) => write!(f, "{}", n),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: &'static str,
    pub value: ParamValue,
}

/// Ordered, read-only snapshot of the named parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamTable {
    entries: [Param; PARAM_COUNT],
}

impl ParamTable {
    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.entries.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.entries
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// Peer LED switch request carried over the radio.
///
/// Wire layout: `[index_hi, index_lo, address, state, 0xAB, 0xDC]`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedCommand {
    pub packet_index: u16,
    pub address: u8,
    pub on: bool,
}

impl LedCommand {
    pub fn encode(&self) -> [u8; LED_COMMAND_LEN] {
        let [hi, lo] = self.packet_index.to_be_bytes();
        [
            hi,
            lo,
            self.address,
            self.on as u8,
            LED_OPCODE[0],
            LED_OPCODE[1],
        ]
    }

    /// Decodes the first six bytes of a radio payload; trailing padding is
    /// ignored since payloads are sized by the configured length.
    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        if payload.len() < LED_COMMAND_LEN {
            return Err(Error::Truncated);
        }
        if payload[4..6] != LED_OPCODE {
            return Err(Error::BadOpcode);
        }
        Ok(Self {
            packet_index: u16::from_be_bytes([payload[0], payload[1]]),
            address: payload[2],
            on: payload[3] == 1,
        })
    }
}
