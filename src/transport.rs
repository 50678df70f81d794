//! TCP transport layer for MC protocol communication.
//!
//! This module provides the [`TcpTransport`] struct which handles low-level
//! TCP communication with the PLC. The transport layer is completely
//! separated from the protocol layer: it only knows about sockets and bytes.
//!
//! # Design
//!
//! - **Protocol agnostic** - handles only byte transmission, no frame
//!   knowledge
//! - **Synchronous** - blocking send/receive with a fixed timeout
//! - **Single link** - one stream, one remote address, no pooling
//!
//! Receive is split in two primitives to match the protocol's two-phase
//! reads: [`TcpTransport::recv_at_least`] must deliver a minimum byte count
//! (the response header) or fail, while [`TcpTransport::recv_until`] tops
//! the buffer up best-effort and tolerates the far end stopping early.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{McError, Result};

/// Send/receive timeout applied to the stream.
pub const IO_TIMEOUT: Duration = Duration::from_secs(6);

const CHUNK_SIZE: usize = 4096;

/// TCP transport for MC protocol communication.
///
/// One live connection to one PLC. Dropping the transport closes the
/// connection.
pub struct TcpTransport {
    stream: TcpStream,
    peer: String,
}

impl TcpTransport {
    /// Opens a TCP connection to the PLC and applies send/receive timeouts.
    ///
    /// The connect itself uses the OS default timeout; send and receive are
    /// bounded by [`IO_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the address does not resolve or the
    /// connection is refused.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let mut addrs = (host, port).to_socket_addrs()?;
        let addr = addrs.next().ok_or_else(|| {
            McError::Io(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                format!("no address for {host}:{port}"),
            ))
        })?;

        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;

        Ok(Self {
            stream,
            peer: format!("{host}:{port}"),
        })
    }

    /// Sends a complete frame.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if the send deadline elapses, or the underlying
    /// I/O error otherwise.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data).map_err(map_io)
    }

    /// Appends received bytes to `buf` until it holds at least `min_len`
    /// bytes.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` on a receive deadline, or an I/O error if the far
    /// end closes the connection before enough bytes arrive.
    pub fn recv_at_least(&mut self, buf: &mut Vec<u8>, min_len: usize) -> Result<()> {
        let mut chunk = [0u8; CHUNK_SIZE];
        while buf.len() < min_len {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    return Err(McError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection closed by PLC",
                    )));
                }
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(e) => return Err(map_io(e)),
            }
        }
        Ok(())
    }

    /// Appends received bytes to `buf` until it holds `total` bytes, the
    /// far end stops sending, or the receive deadline elapses.
    ///
    /// Short data is not an error here; the frame decoder zero-pads.
    pub fn recv_until(&mut self, buf: &mut Vec<u8>, total: usize) {
        let mut chunk = [0u8; CHUNK_SIZE];
        while buf.len() < total {
            match self.stream.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
    }

    /// Returns the remote address this transport was opened against.
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("peer", &self.peer)
            .field("local_addr", &self.stream.local_addr().ok())
            .finish()
    }
}

fn map_io(e: std::io::Error) -> McError {
    match e.kind() {
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => McError::Timeout,
        _ => McError::Io(e),
    }
}
