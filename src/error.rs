//! Error types for MC protocol communication.

use std::io;
use thiserror::Error;

/// Result type alias for MC protocol operations.
pub type Result<T> = std::result::Result<T, McError>;

/// Errors that can occur during MC protocol communication.
///
/// The variants fall into three groups:
///
/// - **Configuration** — [`McError::Config`]: bad device letter, bad address
///   text, address out of range, point count zero or over the operation
///   limit. Always raised synchronously to the immediate caller.
/// - **Protocol** — [`McError::Protocol`]: the PLC answered with a nonzero
///   end code.
/// - **Transport** — [`McError::NotConnected`], [`McError::Timeout`],
///   [`McError::Io`]: connect/send/recv failures and calls made with no live
///   connection.
#[derive(Debug, Error)]
pub enum McError {
    /// Invalid device, address, or point count.
    #[error("invalid request: {reason}")]
    Config {
        /// Description of what was invalid.
        reason: String,
    },

    /// Nonzero end code returned by the PLC.
    ///
    /// The Display form renders the end code the way MELSEC documentation
    /// and engineering tools report it: a 3-digit uppercase hex value
    /// prefixed with `C` (end code 0x51 → `C051`).
    #[error("PLC error: C{end_code:03X}")]
    Protocol {
        /// End code from the response header (bytes 9-10, little-endian).
        end_code: u16,
    },

    /// Operation attempted with no live connection.
    #[error("not connected to PLC")]
    NotConnected,

    /// Send or receive timed out.
    #[error("communication timeout")]
    Timeout,

    /// I/O error during communication.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl McError {
    /// Creates a new `Config` error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Creates a new `Protocol` error from a response end code.
    pub fn protocol(end_code: u16) -> Self {
        Self::Protocol { end_code }
    }

    /// Returns whether this error is a transport-level failure
    /// (as opposed to a configuration or protocol error).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            McError::NotConnected | McError::Timeout | McError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_display() {
        let err = McError::config("length must be > 0");
        assert_eq!(err.to_string(), "invalid request: length must be > 0");
    }

    #[test]
    fn test_protocol_display_pads_to_three_digits() {
        let err = McError::protocol(0x51);
        assert_eq!(err.to_string(), "PLC error: C051");
    }

    #[test]
    fn test_protocol_display_wide_code() {
        let err = McError::protocol(0xC059);
        assert_eq!(err.to_string(), "PLC error: CC059");
    }

    #[test]
    fn test_not_connected_display() {
        assert_eq!(McError::NotConnected.to_string(), "not connected to PLC");
    }

    #[test]
    fn test_is_transport() {
        assert!(McError::NotConnected.is_transport());
        assert!(McError::Timeout.is_transport());
        assert!(!McError::protocol(0x51).is_transport());
        assert!(!McError::config("bad").is_transport());
    }
}
