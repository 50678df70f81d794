//! Single-slot capture rendezvous between a trigger caller and an
//! acquisition loop.
//!
//! The camera subsystem (device enumeration, frame grabbing, image
//! encoding) lives outside this crate. What it needs from here is a bounded
//! handshake: a synchronous caller asks for "one capture saved under this
//! filename" and waits up to a deadline, while the acquisition loop — which
//! owns the frame buffer — services the request whenever it next produces a
//! frame.
//!
//! [`CaptureBridge`] is that handshake: an explicit one-slot
//! request/acknowledge channel built on a mutex and condition variable.
//!
//! # Acquisition-side contract
//!
//! The acquisition loop calls [`CaptureBridge::set_active`] with `true` when
//! it starts and `false` when it stops. On each frame it checks
//! [`CaptureBridge::take_request`]; when that returns a filename it saves
//! the current frame under it and calls [`CaptureBridge::complete`] to wake
//! the waiting trigger.
//!
//! # Known limitation
//!
//! Only one request may be outstanding. A second trigger while one is
//! pending overwrites the filename and resets the completion flag — there
//! is no queue, and the first waiter may then be completed by the second
//! request's capture.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use melsec_mc::CaptureBridge;
//!
//! let bridge = Arc::new(CaptureBridge::new());
//!
//! // Acquisition loop (normally owned by the camera subsystem).
//! bridge.set_active(true);
//! let worker = {
//!     let bridge = Arc::clone(&bridge);
//!     std::thread::spawn(move || {
//!         let filename = loop {
//!             if let Some(name) = bridge.take_request() {
//!                 break name;
//!             }
//!             std::thread::sleep(Duration::from_millis(1));
//!         };
//!         // ... save the current frame buffer under `filename` ...
//!         bridge.complete();
//!     })
//! };
//!
//! assert!(bridge.trigger("shot.bmp", Duration::from_secs(5)));
//! worker.join().unwrap();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, warn};

/// Default wait applied by callers that do not pick their own deadline.
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Slot {
    /// Pending request, if any. `take_request` claims it.
    filename: Option<String>,
    /// Set by `complete`, cleared when a new request is posted.
    done: bool,
}

/// One-slot request/acknowledge channel for capture triggers.
///
/// See the [module documentation](self) for the protocol between the two
/// sides.
#[derive(Default)]
pub struct CaptureBridge {
    slot: Mutex<Slot>,
    completed: Condvar,
    active: AtomicBool,
}

impl CaptureBridge {
    /// Creates a bridge with no acquisition loop attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the acquisition loop as running or stopped.
    ///
    /// While inactive, [`CaptureBridge::trigger`] fails fast without
    /// waiting.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    /// Returns whether an acquisition loop is currently active.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Requests one capture under `filename` and waits up to `timeout` for
    /// the acquisition loop to acknowledge it.
    ///
    /// Returns `false` immediately (no wait) when no acquisition loop is
    /// active, and `false` after the full timeout when the loop never
    /// completes the request. A trigger issued while another is pending
    /// overwrites it — see the module docs.
    pub fn trigger(&self, filename: &str, timeout: Duration) -> bool {
        if !self.is_active() {
            debug!("capture trigger rejected: acquisition loop not active");
            return false;
        }

        let mut slot = self.lock_slot();
        if slot.filename.is_some() {
            warn!("capture trigger while one is pending: overwriting request");
        }
        slot.filename = Some(filename.to_string());
        slot.done = false;

        let (slot, wait) = self
            .completed
            .wait_timeout_while(slot, timeout, |slot| !slot.done)
            .unwrap_or_else(PoisonError::into_inner);

        if wait.timed_out() && !slot.done {
            warn!("capture of '{filename}' timed out after {timeout:?}");
            return false;
        }
        true
    }

    /// Claims the pending request, if any, clearing the request slot.
    ///
    /// Called by the acquisition loop once per frame.
    pub fn take_request(&self) -> Option<String> {
        self.lock_slot().filename.take()
    }

    /// Marks the claimed request as completed and wakes waiting triggers.
    pub fn complete(&self) {
        self.lock_slot().done = true;
        self.completed.notify_all();
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CaptureBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureBridge")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_trigger_fails_fast_when_inactive() {
        let bridge = CaptureBridge::new();
        let start = Instant::now();
        assert!(!bridge.trigger("shot.bmp", Duration::from_secs(5)));
        // No wait at all: well under the requested timeout.
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_trigger_completes_when_serviced() {
        let bridge = Arc::new(CaptureBridge::new());
        bridge.set_active(true);

        let worker = {
            let bridge = Arc::clone(&bridge);
            std::thread::spawn(move || loop {
                if let Some(filename) = bridge.take_request() {
                    assert_eq!(filename, "shot.bmp");
                    bridge.complete();
                    break;
                }
                std::thread::sleep(Duration::from_millis(1));
            })
        };

        assert!(bridge.trigger("shot.bmp", Duration::from_secs(5)));
        worker.join().unwrap();
    }

    #[test]
    fn test_trigger_times_out_when_never_completed() {
        let bridge = CaptureBridge::new();
        bridge.set_active(true);

        let timeout = Duration::from_millis(50);
        let start = Instant::now();
        assert!(!bridge.trigger("shot.bmp", timeout));
        // Returns false only after the full timeout elapses.
        assert!(start.elapsed() >= timeout);
    }

    #[test]
    fn test_second_trigger_overwrites_pending_request() {
        let bridge = CaptureBridge::new();
        bridge.set_active(true);

        // Post without waiting by timing out instantly.
        assert!(!bridge.trigger("first.bmp", Duration::from_millis(1)));
        assert!(!bridge.trigger("second.bmp", Duration::from_millis(1)));

        // Only the latest filename is in the slot.
        assert_eq!(bridge.take_request().as_deref(), Some("second.bmp"));
        assert_eq!(bridge.take_request(), None);
    }

    #[test]
    fn test_take_request_empty_when_no_trigger() {
        let bridge = CaptureBridge::new();
        bridge.set_active(true);
        assert_eq!(bridge.take_request(), None);
    }
}
