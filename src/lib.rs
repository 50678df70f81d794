//! # MELSEC MC Protocol Library
//!
//! A Rust library for communicating with Mitsubishi PLCs using the MC
//! protocol binary "3E frame" format over TCP, plus a managed connection
//! lifecycle for long-running supervisory applications.
//!
//! Two layers are exposed:
//!
//! - [`McClient`] — **protocol-only**: one TCP connection, one request and
//!   one response per call, no retries or reconnection.
//! - [`PlcManager`] — **lifecycle**: a background worker that keeps the
//!   connection alive, polls a status register, reconnects with a fixed
//!   backoff, and serializes foreground reads/writes with its own polling
//!   on a single lock.
//!
//! [`CaptureBridge`] is a small companion: a bounded-wait rendezvous for
//! requesting an image capture from an external acquisition loop.
//!
//! ## Quick Start
//!
//! ```no_run
//! use melsec_mc::{ManagerConfig, PlcManager};
//!
//! fn main() -> melsec_mc::Result<()> {
//!     let manager = PlcManager::new(ManagerConfig::default());
//!
//!     // Asynchronous: the worker connects (and reconnects) on its own.
//!     manager.connect("192.168.0.10", 5007);
//!
//!     // Non-blocking status, fed by the worker's 500 ms poll of D0.
//!     println!("connected: {}", manager.is_connected());
//!     println!("status: {}", manager.last_polled_value());
//!
//!     // Foreground operations ride the managed connection.
//!     let words = manager.read_words("D100", 4)?;
//!     manager.write_bits("Y1", &[1])?;
//!
//!     manager.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Device addressing
//!
//! Head devices are written as a letter plus an address in the letter's
//! native base:
//!
//! | Devices | Base | Max address |
//! |---------|------|-------------|
//! | X, Y | octal | 1024 |
//! | M, L, F, R | decimal | 32768 |
//! | D | decimal | 8000 |
//! | B, W | hexadecimal | 32768 |
//!
//! So `"Y17"` is output 0o17 and `"WFF"` is link register 0xFF. See
//! [`Device`] for the parsing rules.
//!
//! ## Operations and limits
//!
//! | Operation | Unit | Max points |
//! |-----------|------|-----------:|
//! | `read_words` / `write_words` | signed 16-bit word | 960 |
//! | `read_dwords` / `write_dwords` | signed 32-bit double-word | 480 |
//! | `read_bits` / `write_bits` | bit | 3584 |
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, McError>`](Result). Configuration
//! problems (bad device, bad count) are always synchronous; protocol errors
//! carry the PLC's end code (`C051`-style); transport errors cover
//! timeouts, I/O failures, and calls made while disconnected. The manager's
//! own poll failures are absorbed and logged — they surface only as
//! [`PlcManager::is_connected`] turning false.
//!
//! ## Logging
//!
//! Connection lifecycle events (connect attempts, forced disconnects, poll
//! failures, capture timeouts) are emitted through the [`log`] facade;
//! bring your own logger implementation.

#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod capture;
mod client;
mod device;
mod error;
pub mod frame;
mod manager;
mod transport;

// Public re-exports
pub use capture::{CaptureBridge, DEFAULT_CAPTURE_TIMEOUT};
pub use client::McClient;
pub use device::{Device, DeviceType};
pub use error::{McError, Result};
pub use frame::{Operation, MAX_BIT_POINTS, MAX_DWORD_POINTS, MAX_WORD_POINTS};
pub use manager::{ManagerConfig, PlcManager, RetryPolicy};
pub use transport::{TcpTransport, IO_TIMEOUT};
