//! Connection-manager behavior against a scripted in-process PLC.
//!
//! The mock PLC speaks just enough of the 3E frame format to answer batch
//! reads and writes: it parses the request header's data-length field to
//! frame requests, then replies with a success header and a canned payload.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use melsec_mc::{ManagerConfig, McError, PlcManager, RetryPolicy};

/// Loop timing fast enough for tests but with the same shape as production.
fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        poll_interval: Duration::from_millis(30),
        retry_delay: Duration::from_millis(100),
        idle_delay: Duration::from_millis(20),
    }
}

fn fast_config() -> ManagerConfig {
    ManagerConfig::default().with_retry(fast_policy())
}

/// Polls `predicate` until it holds or `deadline` elapses.
fn wait_until(deadline: Duration, predicate: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    predicate()
}

/// Reads one 3E request frame: the 9 bytes through the data-length field,
/// then exactly that many more. Returns `None` on a closed connection.
fn read_request(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut head = [0u8; 9];
    stream.read_exact(&mut head).ok()?;
    let data_len = u16::from_le_bytes([head[7], head[8]]) as usize;
    let mut rest = vec![0u8; data_len];
    stream.read_exact(&mut rest).ok()?;
    let mut request = head.to_vec();
    request.extend_from_slice(&rest);
    Some(request)
}

fn write_response(stream: &mut TcpStream, payload: &[u8]) -> std::io::Result<()> {
    let mut response = vec![
        0xD0, 0x00, 0x00, 0xFF, 0xFF, 0x03, 0x00, 0x00, 0x00, // header
        0x00, 0x00, // end code = 0
    ];
    let data_len = (2 + payload.len()) as u16;
    response[7..9].copy_from_slice(&data_len.to_le_bytes());
    response.extend_from_slice(payload);
    stream.write_all(&response)
}

/// Every request frame seen by the mock, in arrival order.
type RequestLog = Arc<Mutex<Vec<Vec<u8>>>>;

/// Answers requests on one connection with `word_value` for every word
/// point, closing after `max_requests` if given. Each frame is recorded
/// in `log` before it is answered.
fn serve_connection(
    stream: &mut TcpStream,
    word_value: i16,
    max_requests: Option<usize>,
    log: &RequestLog,
) {
    let mut served = 0;
    while let Some(request) = read_request(stream) {
        log.lock().unwrap().push(request.clone());
        let command = u16::from_le_bytes([request[11], request[12]]);
        let points = u16::from_le_bytes([request[19], request[20]]) as usize;

        let payload: Vec<u8> = match command {
            // Batch read: word unit fills 2 bytes per point, bit unit one
            // byte per point pair.
            0x0401 => {
                let subcommand = u16::from_le_bytes([request[13], request[14]]);
                if subcommand == 0x0001 {
                    vec![0x11; points.div_ceil(2)]
                } else {
                    word_value
                        .to_le_bytes()
                        .iter()
                        .copied()
                        .cycle()
                        .take(points * 2)
                        .collect()
                }
            }
            // Batch write: acknowledgement only.
            _ => Vec::new(),
        };

        if write_response(stream, &payload).is_err() {
            break;
        }

        served += 1;
        if max_requests.is_some_and(|max| served >= max) {
            break;
        }
    }
}

/// Mock PLC accepting any number of connections, each answering with a
/// per-connection word value from `values` (last value repeats).
struct MockPlc {
    port: u16,
    accepts: Arc<AtomicUsize>,
    requests: RequestLog,
}

fn spawn_mock_plc(values: Vec<i16>, requests_per_connection: Option<usize>) -> MockPlc {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let accepts = Arc::new(AtomicUsize::new(0));
    let requests: RequestLog = Arc::default();

    let accepts_counter = Arc::clone(&accepts);
    let log = Arc::clone(&requests);
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let index = accepts_counter.fetch_add(1, Ordering::SeqCst);
            let value = *values.get(index).or(values.last()).unwrap_or(&0);
            let log = Arc::clone(&log);
            std::thread::spawn(move || {
                serve_connection(&mut stream, value, requests_per_connection, &log)
            });
        }
    });

    MockPlc {
        port,
        accepts,
        requests,
    }
}

#[test]
fn manager_connects_and_polls_status_register() {
    let plc = spawn_mock_plc(vec![42], None);
    let manager = PlcManager::new(fast_config());

    manager.connect("127.0.0.1", plc.port);

    assert!(wait_until(Duration::from_secs(2), || manager.is_connected()));
    assert!(wait_until(Duration::from_secs(2), || manager
        .last_polled_value()
        == 42));

    manager.shutdown();
    assert!(!manager.is_connected());
}

#[test]
fn foreground_calls_ride_the_managed_connection() {
    let plc = spawn_mock_plc(vec![7], None);
    let manager = PlcManager::new(fast_config());

    manager.connect("127.0.0.1", plc.port);
    assert!(wait_until(Duration::from_secs(2), || manager.is_connected()));

    let words = manager.read_words("D100", 3).unwrap();
    assert_eq!(words, vec![7, 7, 7]);

    manager.write_words("D200", &[1, 2]).unwrap();
    manager.write_bits("Y1", &[1]).unwrap();

    manager.shutdown();
}

#[test]
fn poll_failure_disconnects_and_self_heals() {
    // Each connection answers two requests, then the mock hangs up; the
    // manager's next poll hits EOF and must reconnect on its own.
    let plc = spawn_mock_plc(vec![10, 20], Some(2));
    let manager = PlcManager::new(fast_config());

    manager.connect("127.0.0.1", plc.port);

    assert!(wait_until(Duration::from_secs(2), || manager
        .last_polled_value()
        == 10));
    // Second connection proves the disconnect/reconnect cycle ran.
    assert!(wait_until(Duration::from_secs(3), || manager
        .last_polled_value()
        == 20));
    assert!(plc.accepts.load(Ordering::SeqCst) >= 2);

    manager.shutdown();
}

#[test]
fn disconnect_forces_close_and_fails_foreground_calls() {
    let plc = spawn_mock_plc(vec![1], None);
    let manager = PlcManager::new(fast_config());

    manager.connect("127.0.0.1", plc.port);
    assert!(wait_until(Duration::from_secs(2), || manager.is_connected()));

    manager.disconnect();
    assert!(wait_until(Duration::from_secs(2), || !manager.is_connected()));

    let err = manager.read_words("D0", 1).unwrap_err();
    assert!(matches!(err, McError::NotConnected));

    manager.shutdown();
}

#[test]
fn unreachable_target_stays_disconnected() {
    // Reserve a port, then close it so nothing is listening.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let manager = PlcManager::new(fast_config());
    manager.connect("127.0.0.1", port);

    std::thread::sleep(Duration::from_millis(300));
    assert!(!manager.is_connected());

    manager.shutdown();
}

#[test]
fn failed_connect_waits_full_retry_delay() {
    let retry_delay = Duration::from_millis(400);
    let policy = RetryPolicy {
        retry_delay,
        ..fast_policy()
    };

    // Reserve a port and close it so the first connect attempt is refused.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let manager = PlcManager::new(ManagerConfig::default().with_retry(policy));
    let start = Instant::now();
    manager.connect("127.0.0.1", port);

    // Let the first attempt fail, then start listening on the same port.
    std::thread::sleep(Duration::from_millis(150));
    assert!(!manager.is_connected());
    let listener = TcpListener::bind(("127.0.0.1", port)).unwrap();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            std::thread::spawn(move || {
                serve_connection(&mut stream, 5, None, &RequestLog::default())
            });
        }
    });

    assert!(wait_until(Duration::from_secs(3), || manager.is_connected()));
    // The successful attempt can only be a retry, so at least one full
    // retry delay must have passed (generous slack for scheduling).
    assert!(start.elapsed() >= retry_delay - Duration::from_millis(50));

    manager.shutdown();
}

#[test]
fn shutdown_interrupts_long_retry_sleep() {
    // Default policy retries every 5 s; shutdown must not wait for that.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let manager = PlcManager::new(ManagerConfig::default());
    manager.connect("127.0.0.1", port);
    std::thread::sleep(Duration::from_millis(100));

    let start = Instant::now();
    manager.shutdown();
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn pulse_bit_writes_set_then_clear() {
    let plc = spawn_mock_plc(vec![0], None);
    let manager = PlcManager::new(fast_config());

    manager.connect("127.0.0.1", plc.port);
    assert!(wait_until(Duration::from_secs(2), || manager.is_connected()));

    manager.pulse_bit("Y1", Duration::from_millis(40));

    // Pick the bit-unit write frames out of the poll traffic: command
    // 0x1401, subcommand 0x0001, then device code / address / first
    // payload byte at fixed offsets.
    let requests = plc.requests.lock().unwrap();
    let pulses: Vec<(u8, u8, u8)> = requests
        .iter()
        .filter(|r| {
            u16::from_le_bytes([r[11], r[12]]) == 0x1401
                && u16::from_le_bytes([r[13], r[14]]) == 0x0001
        })
        .map(|r| (r[18], r[15], r[21]))
        .collect();
    // Y (code 0x9D) address 1: set (high nibble 1), then clear.
    assert_eq!(pulses, vec![(0x9D, 1, 0x10), (0x9D, 1, 0x00)]);

    drop(requests);
    manager.shutdown();
}

#[test]
fn connect_after_shutdown_restarts_the_worker() {
    let plc = spawn_mock_plc(vec![9], None);
    let manager = PlcManager::new(fast_config());

    manager.connect("127.0.0.1", plc.port);
    assert!(wait_until(Duration::from_secs(2), || manager.is_connected()));

    manager.shutdown();
    assert!(!manager.is_connected());

    manager.connect("127.0.0.1", plc.port);
    assert!(wait_until(Duration::from_secs(2), || manager.is_connected()));

    manager.shutdown();
}

#[test]
fn target_change_during_retry_attaches_to_new_target() {
    // First target refuses connections; the switch lands while the worker
    // is inside its reconnect/retry cycle.
    let dead_port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let plc = spawn_mock_plc(vec![33], None);
    let manager = PlcManager::new(fast_config());

    manager.connect("127.0.0.1", dead_port);
    std::thread::sleep(Duration::from_millis(60));
    assert!(!manager.is_connected());

    manager.connect("127.0.0.1", plc.port);
    assert!(wait_until(Duration::from_secs(2), || manager
        .last_polled_value()
        == 33));

    manager.shutdown();
}

#[test]
fn changing_target_reconnects_to_new_plc() {
    let first = spawn_mock_plc(vec![11], None);
    let second = spawn_mock_plc(vec![22], None);
    let manager = PlcManager::new(fast_config());

    manager.connect("127.0.0.1", first.port);
    assert!(wait_until(Duration::from_secs(2), || manager
        .last_polled_value()
        == 11));

    manager.connect("127.0.0.1", second.port);
    assert!(wait_until(Duration::from_secs(2), || manager
        .last_polled_value()
        == 22));
    assert!(second.accepts.load(Ordering::SeqCst) >= 1);

    manager.shutdown();
}
