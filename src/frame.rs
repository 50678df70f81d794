//! 3E frame construction and response parsing.
//!
//! This module is pure: it builds request frames and decodes response
//! frames as byte sequences, with no I/O. The request layout is the binary
//! ("3E") frame format, little-endian throughout:
//!
//! | Offset | Field | Size |
//! |--------|-------|------|
//! | 0-1 | Sub-header (request = 0x0050) | 2 |
//! | 2 | Network no. | 1 |
//! | 3 | PC no. (0xFF) | 1 |
//! | 4-5 | Request dest. module I/O (0x03FF) | 2 |
//! | 6 | Request dest. station | 1 |
//! | 7-8 | Following data length | 2 |
//! | 9-10 | CPU monitoring timer | 2 |
//! | 11-12 | Command (0x0401 = batch read, 0x1401 = batch write) | 2 |
//! | 13-14 | Subcommand (0x0000 = word unit, 0x0001 = bit unit) | 2 |
//! | 15-17 | Start device number | 3 |
//! | 18 | Device code | 1 |
//! | 19-20 | Point count | 2 |
//! | 21+ | Payload (writes only) | variable |
//!
//! For frames carrying a payload, the data-length field at bytes 7-8 is
//! patched to `total size - 9` after the payload is appended.
//!
//! Responses start with an 11-byte header whose last two bytes (offsets
//! 9-10, little-endian) are the end code: 0 means success, anything else is
//! a protocol error. Read responses carry payload bytes from offset 11.
//!
//! # Example
//!
//! ```
//! use melsec_mc::{frame, Device};
//!
//! let dev: Device = "D0".parse().unwrap();
//! let bytes = frame::encode_read_words(&dev, 1).unwrap();
//! assert_eq!(bytes.len(), 21);
//! assert_eq!(bytes[18], 0xA8); // D device code
//! ```

use crate::device::Device;
use crate::error::{McError, Result};

/// Response header size: everything up to and including the end code.
pub const RESPONSE_HEADER_SIZE: usize = 11;

/// Offset of the 2-byte little-endian end code within a response.
pub const END_CODE_OFFSET: usize = 9;

/// Maximum word points per read or write.
pub const MAX_WORD_POINTS: u16 = 960;
/// Maximum double-word points per read or write (two word slots each).
pub const MAX_DWORD_POINTS: u16 = 480;
/// Maximum bit points per read or write.
pub const MAX_BIT_POINTS: u16 = 3584;

/// Fixed request header + command templates (15 bytes each).
/// Sub-header, network, PC no., module I/O, station, data length,
/// CPU timer, command, subcommand.
const READ_WORD_TEMPLATE: [u8; 15] = [
    0x50, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00, 0x0C, 0x00, 0x00, 0x00, 0x01, 0x04, 0x00, 0x00,
];
const READ_BIT_TEMPLATE: [u8; 15] = [
    0x50, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00, 0x0C, 0x00, 0x00, 0x00, 0x01, 0x04, 0x01, 0x00,
];
const WRITE_WORD_TEMPLATE: [u8; 15] = [
    0x50, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00, 0x0C, 0x00, 0x00, 0x00, 0x01, 0x14, 0x00, 0x00,
];
const WRITE_BIT_TEMPLATE: [u8; 15] = [
    0x50, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00, 0x0C, 0x00, 0x00, 0x00, 0x01, 0x14, 0x01, 0x00,
];

/// Data operations, used to select point-count limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Batch read, word units.
    ReadWord,
    /// Batch read, double-word units (two word slots per point).
    ReadDword,
    /// Batch read, bit units.
    ReadBit,
    /// Batch write, word units.
    WriteWord,
    /// Batch write, double-word units.
    WriteDword,
    /// Batch write, bit units.
    WriteBit,
}

impl Operation {
    /// Returns the maximum point count for this operation.
    pub fn point_limit(self) -> u16 {
        match self {
            Operation::ReadWord | Operation::WriteWord => MAX_WORD_POINTS,
            Operation::ReadDword | Operation::WriteDword => MAX_DWORD_POINTS,
            Operation::ReadBit | Operation::WriteBit => MAX_BIT_POINTS,
        }
    }

    /// Validates a point count against this operation's limit.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if `count` is zero or exceeds the limit.
    pub fn validate_count(self, count: u16) -> Result<()> {
        if count == 0 {
            return Err(McError::config("point count must be > 0"));
        }
        if count > self.point_limit() {
            return Err(McError::config(format!(
                "point count {count} exceeds limit {} for {self:?}",
                self.point_limit()
            )));
        }
        Ok(())
    }
}

/// Appends start address (3 bytes LE), device code, and point count (2 bytes
/// LE) to a request under construction.
fn push_target(frame: &mut Vec<u8>, device: &Device, points: u16) {
    let addr = device.address;
    frame.push((addr & 0xFF) as u8);
    frame.push(((addr >> 8) & 0xFF) as u8);
    frame.push(((addr >> 16) & 0xFF) as u8);
    frame.push(device.device_type.code());
    frame.extend_from_slice(&points.to_le_bytes());
}

/// Patches the following-data-length field (bytes 7-8) once a payload has
/// been appended. Read frames keep the template value.
fn patch_data_length(frame: &mut [u8]) {
    let len = (frame.len() - 9) as u16;
    frame[7] = (len & 0xFF) as u8;
    frame[8] = (len >> 8) as u8;
}

/// Builds a batch-read request in word units.
///
/// Double-word reads reuse this frame shape: the caller validates the
/// double-word count against [`MAX_DWORD_POINTS`] and passes `count * 2`
/// word points here.
///
/// # Errors
///
/// Returns a `Config` error if `points` is zero or over [`MAX_WORD_POINTS`].
pub fn encode_read_words(device: &Device, points: u16) -> Result<Vec<u8>> {
    Operation::ReadWord.validate_count(points)?;
    let mut frame = Vec::with_capacity(21);
    frame.extend_from_slice(&READ_WORD_TEMPLATE);
    push_target(&mut frame, device, points);
    Ok(frame)
}

/// Builds a batch-read request in bit units.
///
/// # Errors
///
/// Returns a `Config` error if `points` is zero or over [`MAX_BIT_POINTS`].
pub fn encode_read_bits(device: &Device, points: u16) -> Result<Vec<u8>> {
    Operation::ReadBit.validate_count(points)?;
    let mut frame = Vec::with_capacity(21);
    frame.extend_from_slice(&READ_BIT_TEMPLATE);
    push_target(&mut frame, device, points);
    Ok(frame)
}

/// Builds a batch-write request in bit units.
///
/// Each input value is treated as one bit (nonzero = 1). An odd-length
/// sequence is padded with one trailing 0 bit, then consecutive pairs are
/// packed one per byte as `(hi << 4) | lo`. The frame's point count stays
/// the original unpadded bit count.
///
/// # Errors
///
/// Returns a `Config` error if `bits` is empty or longer than
/// [`MAX_BIT_POINTS`].
pub fn encode_write_bits(device: &Device, bits: &[u8]) -> Result<Vec<u8>> {
    let points = u16::try_from(bits.len())
        .map_err(|_| McError::config("point count exceeds u16 range"))?;
    Operation::WriteBit.validate_count(points)?;

    let mut nibbles: Vec<u8> = bits.iter().map(|&v| u8::from(v != 0)).collect();
    if nibbles.len() % 2 != 0 {
        nibbles.push(0);
    }

    let mut frame = Vec::with_capacity(21 + nibbles.len() / 2);
    frame.extend_from_slice(&WRITE_BIT_TEMPLATE);
    push_target(&mut frame, device, points);
    for pair in nibbles.chunks_exact(2) {
        frame.push((pair[0] << 4) | pair[1]);
    }
    patch_data_length(&mut frame);
    Ok(frame)
}

/// Builds a batch-write request of signed 16-bit words (little-endian).
///
/// # Errors
///
/// Returns a `Config` error if `values` is empty or longer than
/// [`MAX_WORD_POINTS`].
pub fn encode_write_words(device: &Device, values: &[i16]) -> Result<Vec<u8>> {
    let points = u16::try_from(values.len())
        .map_err(|_| McError::config("point count exceeds u16 range"))?;
    Operation::WriteWord.validate_count(points)?;

    let mut frame = Vec::with_capacity(21 + values.len() * 2);
    frame.extend_from_slice(&WRITE_WORD_TEMPLATE);
    push_target(&mut frame, device, points);
    for value in values {
        frame.extend_from_slice(&value.to_le_bytes());
    }
    patch_data_length(&mut frame);
    Ok(frame)
}

/// Builds a batch-write request of signed 32-bit double-words.
///
/// Each value occupies two consecutive word slots (4 bytes little-endian),
/// so the frame's point count is twice the double-word count.
///
/// # Errors
///
/// Returns a `Config` error if `values` is empty or longer than
/// [`MAX_DWORD_POINTS`].
pub fn encode_write_dwords(device: &Device, values: &[i32]) -> Result<Vec<u8>> {
    let points = u16::try_from(values.len())
        .map_err(|_| McError::config("point count exceeds u16 range"))?;
    Operation::WriteDword.validate_count(points)?;

    let mut frame = Vec::with_capacity(21 + values.len() * 4);
    frame.extend_from_slice(&WRITE_WORD_TEMPLATE);
    push_target(&mut frame, device, points * 2);
    for value in values {
        frame.extend_from_slice(&value.to_le_bytes());
    }
    patch_data_length(&mut frame);
    Ok(frame)
}

/// Returns the number of payload bytes a read response is expected to carry
/// after the 11-byte header.
///
/// Word reads carry 2 bytes per word point; bit reads carry two bit points
/// per byte (nibble encoding), rounded up. Callers pass word points for
/// double-word reads (already doubled).
pub fn expected_data_len(operation: Operation, points: u16) -> usize {
    match operation {
        Operation::ReadWord | Operation::ReadDword => points as usize * 2,
        Operation::ReadBit => (points as usize + 1) / 2,
        _ => 0,
    }
}

/// Checks the response header and end code.
///
/// # Errors
///
/// Returns an I/O error if fewer than 11 bytes arrived, or a `Protocol`
/// error carrying the end code if it is nonzero.
pub fn decode_end_code(response: &[u8]) -> Result<()> {
    if response.len() < RESPONSE_HEADER_SIZE {
        return Err(McError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "incomplete PLC response header",
        )));
    }
    let end_code =
        u16::from_le_bytes([response[END_CODE_OFFSET], response[END_CODE_OFFSET + 1]]);
    if end_code != 0 {
        return Err(McError::protocol(end_code));
    }
    Ok(())
}

/// Decodes a word-read response into signed 16-bit values (little-endian).
///
/// A payload shorter than `count` words is zero-padded, not an error.
///
/// # Errors
///
/// Returns a `Protocol` error for a nonzero end code.
pub fn decode_words(response: &[u8], count: usize) -> Result<Vec<i16>> {
    decode_end_code(response)?;
    let data = &response[RESPONSE_HEADER_SIZE..];
    let mut values = Vec::with_capacity(count);
    for i in 0..count {
        let offset = i * 2;
        if offset + 2 <= data.len() {
            values.push(i16::from_le_bytes([data[offset], data[offset + 1]]));
        } else {
            values.push(0);
        }
    }
    Ok(values)
}

/// Decodes a double-word read response into signed 32-bit values.
///
/// Each value is assembled from two consecutive word slots (4 bytes
/// little-endian). Short payloads are zero-padded.
///
/// # Errors
///
/// Returns a `Protocol` error for a nonzero end code.
pub fn decode_dwords(response: &[u8], count: usize) -> Result<Vec<i32>> {
    decode_end_code(response)?;
    let data = &response[RESPONSE_HEADER_SIZE..];
    let mut values = Vec::with_capacity(count);
    for i in 0..count {
        let offset = i * 4;
        if offset + 4 <= data.len() {
            values.push(i32::from_le_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ]));
        } else {
            values.push(0);
        }
    }
    Ok(values)
}

/// Decodes a bit-read response into 0/1 values.
///
/// **Known defect, kept on purpose.** The deployed behavior this crate is
/// compatible with does not unpack the nibble-encoded payload. It renders
/// the payload as Python byte-literal text (`b'\x10...'`) and collects the
/// literal `0` and `1` characters of that text as the bit values, which
/// double-counts hex digits as binary digits. Downstream consumers depend
/// on exactly this output, so it is reproduced here rather than corrected.
/// Results short of `count` are zero-padded.
///
/// # Errors
///
/// Returns a `Protocol` error for a nonzero end code.
pub fn decode_bits(response: &[u8], count: usize) -> Result<Vec<u8>> {
    decode_end_code(response)?;
    let data = &response[RESPONSE_HEADER_SIZE..];

    let mut text = String::with_capacity(3 + data.len() * 4);
    text.push_str("b'");
    for byte in data {
        text.push_str(&format!("\\x{byte:02x}"));
    }
    text.push('\'');

    let mut values: Vec<u8> = text
        .chars()
        .filter_map(|c| match c {
            '0' => Some(0),
            '1' => Some(1),
            _ => None,
        })
        .take(count)
        .collect();
    values.resize(count, 0);
    Ok(values)
}

/// Decodes a write acknowledgement (11-byte header, end code only).
///
/// # Errors
///
/// Returns a `Protocol` error for a nonzero end code.
pub fn decode_write_ack(response: &[u8]) -> Result<()> {
    decode_end_code(response)
}
