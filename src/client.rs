//! Single-connection 3E-frame client.
//!
//! [`McClient`] ties the pure frame codec to one TCP transport: each data
//! operation validates its arguments, sends exactly one request, and parses
//! exactly one response. No retries, caching, or reconnection happen at this
//! layer; the connection lifecycle belongs to
//! [`PlcManager`](crate::PlcManager).
//!
//! Head devices are passed as text (`"D0"`, `"Y1"`, `"WFF"`); the address
//! is decoded in the device letter's base — see [`crate::device`].
//!
//! # Example
//!
//! ```no_run
//! use melsec_mc::McClient;
//!
//! let mut client = McClient::new();
//! client.connect("192.168.0.10", 5007)?;
//!
//! let words = client.read_words("D100", 4)?;
//! client.write_words("D200", &[1, -2, 3])?;
//! client.write_bits("Y1", &[1])?;
//! # Ok::<(), melsec_mc::McError>(())
//! ```

use crate::device::Device;
use crate::error::{McError, Result};
use crate::frame::{self, Operation, RESPONSE_HEADER_SIZE};
use crate::transport::TcpTransport;

/// Synchronous MC protocol client over one TCP connection.
///
/// Created disconnected; [`McClient::connect`] opens the link and
/// [`McClient::disconnect`] drops it. Any data operation issued while
/// disconnected fails immediately with [`McError::NotConnected`].
#[derive(Debug, Default)]
pub struct McClient {
    transport: Option<TcpTransport>,
}

impl McClient {
    /// Creates a new, disconnected client.
    pub fn new() -> Self {
        Self { transport: None }
    }

    /// Opens a TCP connection to the PLC, dropping any previous connection
    /// first.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the connection cannot be established.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        self.transport = None;
        self.transport = Some(TcpTransport::connect(host, port)?);
        Ok(())
    }

    /// Closes the connection if one is open.
    pub fn disconnect(&mut self) {
        self.transport = None;
    }

    /// Returns whether a connection is currently open.
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    fn transport_mut(&mut self) -> Result<&mut TcpTransport> {
        self.transport.as_mut().ok_or(McError::NotConnected)
    }

    /// Sends one request and collects the response: the 11-byte header must
    /// arrive, then up to `data_len` payload bytes best-effort.
    fn exchange(&mut self, request: &[u8], data_len: usize) -> Result<Vec<u8>> {
        let transport = self.transport_mut()?;
        transport.send(request)?;

        let mut response = Vec::with_capacity(RESPONSE_HEADER_SIZE + data_len);
        transport.recv_at_least(&mut response, RESPONSE_HEADER_SIZE)?;
        frame::decode_end_code(&response)?;
        if data_len > 0 {
            transport.recv_until(&mut response, RESPONSE_HEADER_SIZE + data_len);
        }
        Ok(response)
    }

    /// Reads `count` signed 16-bit words starting at `device`.
    ///
    /// # Errors
    ///
    /// `Config` for a bad device or count, `NotConnected`/`Timeout`/`Io`
    /// for transport failures, `Protocol` for a nonzero end code.
    pub fn read_words(&mut self, device: &str, count: u16) -> Result<Vec<i16>> {
        let device = Device::parse(device)?;
        Operation::ReadWord.validate_count(count)?;
        let request = frame::encode_read_words(&device, count)?;
        let data_len = frame::expected_data_len(Operation::ReadWord, count);
        let response = self.exchange(&request, data_len)?;
        frame::decode_words(&response, count as usize)
    }

    /// Reads `count` signed 32-bit double-words starting at `device`.
    ///
    /// Each double-word occupies two consecutive word slots, so the wire
    /// request asks for `count * 2` word points.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`McClient::read_words`]; the count limit is 480.
    pub fn read_dwords(&mut self, device: &str, count: u16) -> Result<Vec<i32>> {
        let device = Device::parse(device)?;
        Operation::ReadDword.validate_count(count)?;
        let request = frame::encode_read_words(&device, count * 2)?;
        let data_len = frame::expected_data_len(Operation::ReadDword, count * 2);
        let response = self.exchange(&request, data_len)?;
        frame::decode_dwords(&response, count as usize)
    }

    /// Reads `count` bit points starting at `device`, as 0/1 values.
    ///
    /// See [`frame::decode_bits`] for the deliberately preserved decoding
    /// quirk.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`McClient::read_words`]; the count limit is 3584.
    pub fn read_bits(&mut self, device: &str, count: u16) -> Result<Vec<u8>> {
        let device = Device::parse(device)?;
        Operation::ReadBit.validate_count(count)?;
        let request = frame::encode_read_bits(&device, count)?;
        let data_len = frame::expected_data_len(Operation::ReadBit, count);
        let response = self.exchange(&request, data_len)?;
        frame::decode_bits(&response, count as usize)
    }

    /// Writes bit values (nonzero = 1) starting at `device`.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`McClient::read_words`]; the count limit is 3584.
    pub fn write_bits(&mut self, device: &str, bits: &[u8]) -> Result<()> {
        let device = Device::parse(device)?;
        let request = frame::encode_write_bits(&device, bits)?;
        let response = self.exchange(&request, 0)?;
        frame::decode_write_ack(&response)
    }

    /// Writes signed 16-bit words starting at `device`.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`McClient::read_words`]; the count limit is 960.
    pub fn write_words(&mut self, device: &str, values: &[i16]) -> Result<()> {
        let device = Device::parse(device)?;
        let request = frame::encode_write_words(&device, values)?;
        let response = self.exchange(&request, 0)?;
        frame::decode_write_ack(&response)
    }

    /// Writes signed 32-bit double-words starting at `device`.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`McClient::read_words`]; the count limit is 480.
    pub fn write_dwords(&mut self, device: &str, values: &[i32]) -> Result<()> {
        let device = Device::parse(device)?;
        let request = frame::encode_write_dwords(&device, values)?;
        let response = self.exchange(&request, 0)?;
        frame::decode_write_ack(&response)
    }
}
