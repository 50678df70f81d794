//! Self-healing connection lifecycle for one PLC link.
//!
//! [`PlcManager`] owns a single [`McClient`] and a background worker thread
//! that keeps the connection alive: it connects to the recorded target,
//! polls a status register while the link is up, and falls back to a
//! bounded-retry reconnect loop when anything fails. Foreground read/write
//! calls share the same connection lock as the worker, so only one request
//! is ever in flight on the TCP stream.
//!
//! # State machine
//!
//! - Target cleared ([`PlcManager::disconnect`]): the worker force-closes
//!   any live socket and idles.
//! - No live socket: one connect attempt per retry interval; success falls
//!   straight through to polling with no extra delay.
//! - Live socket: one status-register read per poll interval; any failure
//!   (protocol or transport) is logged, the socket is closed, and the next
//!   iteration re-enters the connect branch immediately.
//!
//! Poll failures never surface to callers — they only show up as
//! [`PlcManager::is_connected`] turning false. Foreground calls made while
//! disconnected fail immediately with
//! [`McError::NotConnected`](crate::McError::NotConnected) instead of
//! queuing for a reconnect.
//!
//! # Example
//!
//! ```no_run
//! use melsec_mc::{ManagerConfig, PlcManager};
//!
//! let manager = PlcManager::new(ManagerConfig::default());
//! manager.connect("192.168.0.10", 5007);
//!
//! // The worker connects in the background; status is non-blocking.
//! if manager.is_connected() {
//!     println!("status register = {}", manager.last_polled_value());
//!     let values = manager.read_words("D100", 4)?;
//! }
//!
//! manager.shutdown();
//! # Ok::<(), melsec_mc::McError>(())
//! ```

use std::sync::atomic::{AtomicBool, AtomicI16, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info, warn};

use crate::client::McClient;
use crate::error::Result;

/// Timing knobs for the manager's worker loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay between status polls while connected.
    pub poll_interval: Duration,
    /// Delay after a failed connect attempt.
    pub retry_delay: Duration,
    /// Delay per idle iteration while no target is desired.
    pub idle_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            retry_delay: Duration::from_secs(5),
            idle_delay: Duration::from_millis(200),
        }
    }
}

/// Configuration for creating a [`PlcManager`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Head device polled for the status value (one signed word).
    pub status_device: String,
    /// Worker loop timing.
    pub retry: RetryPolicy,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            status_device: "D0".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ManagerConfig {
    /// Sets the status device polled by the worker (default `"D0"`).
    pub fn with_status_device(mut self, device: impl Into<String>) -> Self {
        self.status_device = device.into();
        self
    }

    /// Sets custom loop timing (mainly for tests).
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// State guarded by the connection lock: the client (and through it the
/// socket) plus the desired target.
struct Shared {
    client: McClient,
    target: Option<(String, u16)>,
}

struct Inner {
    shared: Mutex<Shared>,
    /// Lock-free readable connectivity flag; mutated only around operations
    /// performed under the connection lock.
    connected: AtomicBool,
    /// Whether a connection is desired at all.
    should_run: AtomicBool,
    /// Last value read from the status register.
    last_poll: AtomicI16,
    status_device: String,
    policy: RetryPolicy,
    /// Shutdown signal; all worker sleeps wait on this so shutdown is
    /// prompt.
    stop: Mutex<bool>,
    stop_cv: Condvar,
}

impl Inner {
    fn lock_shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps up to `duration`, waking early on shutdown. Returns whether
    /// the manager is shutting down.
    fn sleep(&self, duration: Duration) -> bool {
        let stop = self.stop.lock().unwrap_or_else(PoisonError::into_inner);
        let (stop, _) = self
            .stop_cv
            .wait_timeout_while(stop, duration, |stopping| !*stopping)
            .unwrap_or_else(PoisonError::into_inner);
        *stop
    }

    fn stopping(&self) -> bool {
        *self.stop.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Managed PLC connection: one background worker, one shared link.
///
/// Constructed once at process start and injected into callers. The worker
/// thread starts lazily on the first [`PlcManager::connect`] and runs until
/// [`PlcManager::shutdown`] (or drop).
pub struct PlcManager {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PlcManager {
    /// Creates a new manager. No thread is spawned until the first
    /// [`PlcManager::connect`].
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                shared: Mutex::new(Shared {
                    client: McClient::new(),
                    target: None,
                }),
                connected: AtomicBool::new(false),
                should_run: AtomicBool::new(false),
                last_poll: AtomicI16::new(0),
                status_device: config.status_device,
                policy: config.retry,
                stop: Mutex::new(false),
                stop_cv: Condvar::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Records the target and lets the worker establish the connection.
    ///
    /// Always accepted: connection establishment is asynchronous, observed
    /// through [`PlcManager::is_connected`]. Changing the target while a
    /// connection is live force-closes the old connection first. The worker
    /// thread is started on the first call and reused afterwards; after a
    /// [`PlcManager::shutdown`] a fresh worker is spawned.
    pub fn connect(&self, host: &str, port: u16) {
        let target = (host.to_string(), port);
        {
            let mut shared = self.inner.lock_shared();
            if shared.target.as_ref() != Some(&target) && shared.client.is_connected() {
                info!("target changed, closing connection to previous target");
                shared.client.disconnect();
                self.inner.connected.store(false, Ordering::SeqCst);
            }
            shared.target = Some(target);
        }
        self.inner.should_run.store(true, Ordering::SeqCst);
        self.ensure_started();
    }

    /// Requests disconnection. The worker closes the socket on its next
    /// iteration; the worker itself keeps running and a later
    /// [`PlcManager::connect`] reuses it.
    pub fn disconnect(&self) {
        self.inner.should_run.store(false, Ordering::SeqCst);
    }

    /// Returns the last observed connectivity state without blocking.
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Returns the last value polled from the status register without
    /// blocking.
    pub fn last_polled_value(&self) -> i16 {
        self.inner.last_poll.load(Ordering::SeqCst)
    }

    /// Reads signed 16-bit words over the managed connection.
    ///
    /// # Errors
    ///
    /// Fails with [`McError::NotConnected`](crate::McError::NotConnected)
    /// immediately if no connection is live; otherwise the
    /// [`McClient::read_words`] taxonomy applies.
    pub fn read_words(&self, device: &str, count: u16) -> Result<Vec<i16>> {
        self.inner.lock_shared().client.read_words(device, count)
    }

    /// Reads signed 32-bit double-words over the managed connection.
    ///
    /// # Errors
    ///
    /// Same behavior as [`PlcManager::read_words`].
    pub fn read_dwords(&self, device: &str, count: u16) -> Result<Vec<i32>> {
        self.inner.lock_shared().client.read_dwords(device, count)
    }

    /// Reads bit points over the managed connection.
    ///
    /// # Errors
    ///
    /// Same behavior as [`PlcManager::read_words`].
    pub fn read_bits(&self, device: &str, count: u16) -> Result<Vec<u8>> {
        self.inner.lock_shared().client.read_bits(device, count)
    }

    /// Writes bit values over the managed connection.
    ///
    /// # Errors
    ///
    /// Same behavior as [`PlcManager::read_words`].
    pub fn write_bits(&self, device: &str, bits: &[u8]) -> Result<()> {
        self.inner.lock_shared().client.write_bits(device, bits)
    }

    /// Writes signed 16-bit words over the managed connection.
    ///
    /// # Errors
    ///
    /// Same behavior as [`PlcManager::read_words`].
    pub fn write_words(&self, device: &str, values: &[i16]) -> Result<()> {
        self.inner.lock_shared().client.write_words(device, values)
    }

    /// Writes signed 32-bit double-words over the managed connection.
    ///
    /// # Errors
    ///
    /// Same behavior as [`PlcManager::read_words`].
    pub fn write_dwords(&self, device: &str, values: &[i32]) -> Result<()> {
        self.inner.lock_shared().client.write_dwords(device, values)
    }

    /// Pulses an output bit: writes 1, holds for `width`, writes 0.
    ///
    /// Blocks the caller for the pulse width. Write failures (including
    /// being disconnected) are logged and absorbed, matching the
    /// fire-and-forget semantics of a scan trigger; the connection lock is
    /// released during the hold so polling continues.
    pub fn pulse_bit(&self, device: &str, width: Duration) {
        if let Err(e) = self.inner.lock_shared().client.write_bits(device, &[1]) {
            warn!("pulse {device}: set failed: {e}");
            return;
        }
        self.inner.sleep(width);
        if let Err(e) = self.inner.lock_shared().client.write_bits(device, &[0]) {
            warn!("pulse {device}: clear failed: {e}");
        }
    }

    /// Stops the worker thread and closes any live connection. Blocks until
    /// the worker has exited. Safe to call more than once; a later
    /// [`PlcManager::connect`] restarts the worker.
    pub fn shutdown(&self) {
        self.inner.should_run.store(false, Ordering::SeqCst);
        // The stop latch is flipped under the worker-handle lock so it
        // cannot interleave with a concurrent restart in `ensure_started`.
        let handle = {
            let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
            *self
                .inner
                .stop
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = true;
            self.inner.stop_cv.notify_all();
            worker.take()
        };
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    /// Starts the worker if none is running, clearing any stop latch left
    /// by a previous [`PlcManager::shutdown`] so the manager restarts.
    fn ensure_started(&self) {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_none() {
            *self
                .inner
                .stop
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = false;
            let inner = Arc::clone(&self.inner);
            *worker = Some(std::thread::spawn(move || run_loop(&inner)));
        }
    }
}

impl Drop for PlcManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for PlcManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlcManager")
            .field("connected", &self.is_connected())
            .field("last_polled_value", &self.last_polled_value())
            .finish()
    }
}

fn run_loop(inner: &Inner) {
    info!("connection manager started");
    loop {
        if inner.stopping() {
            break;
        }

        // Target cleared: force-close and idle.
        if !inner.should_run.load(Ordering::SeqCst) {
            let was_connected = {
                let mut shared = inner.lock_shared();
                if shared.client.is_connected() {
                    shared.client.disconnect();
                    true
                } else {
                    false
                }
            };
            if was_connected {
                inner.connected.store(false, Ordering::SeqCst);
                info!("forced disconnect (no target desired)");
            }
            if inner.sleep(inner.policy.idle_delay) {
                break;
            }
            continue;
        }

        let live = inner.lock_shared().client.is_connected();
        inner.connected.store(live, Ordering::SeqCst);

        if live {
            // Polling phase: one status read per interval. The lock is held
            // for the whole round-trip so foreground calls never interleave.
            let poll = inner
                .lock_shared()
                .client
                .read_words(&inner.status_device, 1);
            match poll {
                Ok(values) => {
                    if let Some(value) = values.first() {
                        inner.last_poll.store(*value, Ordering::SeqCst);
                    }
                    if inner.sleep(inner.policy.poll_interval) {
                        break;
                    }
                }
                Err(e) => {
                    // Absorbed, not surfaced: the reconnect branch runs on
                    // the very next iteration.
                    warn!("status poll failed: {e}");
                    inner.connected.store(false, Ordering::SeqCst);
                    inner.lock_shared().client.disconnect();
                }
            }
        } else {
            // Reconnection phase. The target is read and dialed under one
            // lock hold, so a target change landing mid-attempt can never
            // leave the worker attached to a stale peer: it either runs
            // before the read or hits the force-disconnect in `connect`.
            let attempt = {
                let mut shared = inner.lock_shared();
                shared.target.clone().map(|(host, port)| {
                    debug!("connecting to {host}:{port}");
                    let result = shared.client.connect(&host, port);
                    (host, port, result)
                })
            };
            match attempt {
                Some((host, port, Ok(()))) => {
                    inner.connected.store(true, Ordering::SeqCst);
                    info!("connected to {host}:{port}");
                    // Fall through to polling next iteration, no delay.
                }
                Some((host, port, Err(e))) => {
                    warn!("connect to {host}:{port} failed: {e}");
                    if inner.sleep(inner.policy.retry_delay) {
                        break;
                    }
                }
                None => {
                    if inner.sleep(inner.policy.poll_interval) {
                        break;
                    }
                }
            }
        }
    }

    inner.lock_shared().client.disconnect();
    inner.connected.store(false, Ordering::SeqCst);
    info!("connection manager stopped");
}
