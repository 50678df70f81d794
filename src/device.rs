//! Device table and address validation for MELSEC PLCs.
//!
//! Every addressable memory area in the PLC is identified by a single
//! letter. The letter determines the binary device code used on the wire,
//! the numeric base its address text is written in, and the maximum legal
//! address.
//!
//! | Letter | Area | Code | Base | Max address |
//! |--------|------|------|------|-------------|
//! | X | Input | 0x9C | octal | 1024 |
//! | Y | Output | 0x9D | octal | 1024 |
//! | M | Internal relay | 0x90 | decimal | 32768 |
//! | L | Latch relay | 0x92 | decimal | 32768 |
//! | F | Annunciator | 0x93 | decimal | 32768 |
//! | B | Link relay | 0xA0 | hex | 32768 |
//! | W | Link register | 0xB4 | hex | 32768 |
//! | D | Data register | 0xA8 | decimal | 8000 |
//! | R | File register | 0xAF | decimal | 32768 |
//!
//! # Example
//!
//! ```
//! use melsec_mc::Device;
//!
//! let dev: Device = "D100".parse().unwrap();
//! assert_eq!(dev.address, 100);
//!
//! // X/Y addresses are octal
//! let out: Device = "Y17".parse().unwrap();
//! assert_eq!(out.address, 0o17);
//!
//! // B/W addresses are hexadecimal
//! let link: Device = "WFF".parse().unwrap();
//! assert_eq!(link.address, 0xFF);
//! ```

use std::str::FromStr;

use crate::error::{McError, Result};

/// At most this many characters after the device letter are significant.
/// Extra trailing characters are ignored, not an error.
const MAX_ADDRESS_CHARS: usize = 5;

/// Device types addressable through the MC protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    /// X - input relay (octal addressing).
    X,
    /// Y - output relay (octal addressing).
    Y,
    /// M - internal relay (decimal addressing).
    M,
    /// L - latch relay (decimal addressing).
    L,
    /// F - annunciator (decimal addressing).
    F,
    /// B - link relay (hexadecimal addressing).
    B,
    /// W - link register (hexadecimal addressing).
    W,
    /// D - data register (decimal addressing).
    D,
    /// R - file register (decimal addressing).
    R,
}

impl DeviceType {
    /// Resolves a device letter (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns a `Config` error for unknown letters.
    pub fn from_letter(letter: char) -> Result<Self> {
        match letter.to_ascii_uppercase() {
            'X' => Ok(DeviceType::X),
            'Y' => Ok(DeviceType::Y),
            'M' => Ok(DeviceType::M),
            'L' => Ok(DeviceType::L),
            'F' => Ok(DeviceType::F),
            'B' => Ok(DeviceType::B),
            'W' => Ok(DeviceType::W),
            'D' => Ok(DeviceType::D),
            'R' => Ok(DeviceType::R),
            other => Err(McError::config(format!("unknown device letter '{other}'"))),
        }
    }

    /// Returns the binary device code sent on the wire.
    pub(crate) fn code(self) -> u8 {
        match self {
            DeviceType::X => 0x9C,
            DeviceType::Y => 0x9D,
            DeviceType::M => 0x90,
            DeviceType::L => 0x92,
            DeviceType::F => 0x93,
            DeviceType::B => 0xA0,
            DeviceType::W => 0xB4,
            DeviceType::D => 0xA8,
            DeviceType::R => 0xAF,
        }
    }

    /// Returns the numeric base the address text is written in.
    pub fn base(self) -> u32 {
        match self {
            DeviceType::X | DeviceType::Y => 8,
            DeviceType::B | DeviceType::W => 16,
            _ => 10,
        }
    }

    /// Returns the maximum legal device number.
    pub fn max_address(self) -> u32 {
        match self {
            DeviceType::X | DeviceType::Y => 1024,
            DeviceType::D => 8000,
            _ => 32768,
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let letter = match self {
            DeviceType::X => 'X',
            DeviceType::Y => 'Y',
            DeviceType::M => 'M',
            DeviceType::L => 'L',
            DeviceType::F => 'F',
            DeviceType::B => 'B',
            DeviceType::W => 'W',
            DeviceType::D => 'D',
            DeviceType::R => 'R',
        };
        write!(f, "{letter}")
    }
}

/// A parsed head device: area type plus numeric start address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Device {
    /// Memory area type.
    pub device_type: DeviceType,
    /// Start device number, already decoded from the area's base.
    pub address: u32,
}

impl Device {
    /// Parses a head-device string such as `"D100"`, `"Y17"`, or `"WFF"`.
    ///
    /// The first character selects the device type; the address that follows
    /// is decoded in the type's base (octal for X/Y, hex for B/W, decimal
    /// otherwise). Only the first 5 characters after the letter are
    /// significant.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the letter is unknown, no address text
    /// follows the letter, the text is not a valid numeral in the type's
    /// base, or the value exceeds the type's maximum address.
    pub fn parse(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let letter = chars
            .next()
            .ok_or_else(|| McError::config("head device cannot be empty"))?;
        let device_type = DeviceType::from_letter(letter)?;

        let addr_text: String = chars.take(MAX_ADDRESS_CHARS).collect();
        if addr_text.is_empty() {
            return Err(McError::config(format!(
                "no address after device letter in '{text}'"
            )));
        }

        let address = u32::from_str_radix(&addr_text, device_type.base()).map_err(|_| {
            McError::config(format!(
                "invalid base-{} address '{addr_text}' for device {device_type}",
                device_type.base()
            ))
        })?;

        if address > device_type.max_address() {
            return Err(McError::config(format!(
                "address out of range in '{text}' (parsed={address}, max={})",
                device_type.max_address()
            )));
        }

        Ok(Self {
            device_type,
            address,
        })
    }
}

impl FromStr for Device {
    type Err = McError;

    fn from_str(s: &str) -> Result<Self> {
        Device::parse(s)
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.device_type.base() {
            8 => write!(f, "{}{:o}", self.device_type, self.address),
            16 => write!(f, "{}{:X}", self.device_type, self.address),
            _ => write!(f, "{}{}", self.device_type, self.address),
        }
    }
}
