//! Connect to a PLC, watch the managed status poll, and read a few words.
//!
//! Usage: `cargo run --example simple_read -- <host> [port]`

use std::time::Duration;

use melsec_mc::{ManagerConfig, PlcManager};

fn main() -> melsec_mc::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "192.168.0.10".to_string());
    let port: u16 = args
        .next()
        .and_then(|p| p.parse().ok())
        .unwrap_or(5007);

    let manager = PlcManager::new(ManagerConfig::default());
    manager.connect(&host, port);

    println!("Waiting for connection to {host}:{port}...");
    for _ in 0..20 {
        if manager.is_connected() {
            break;
        }
        std::thread::sleep(Duration::from_millis(500));
    }

    if !manager.is_connected() {
        println!("Could not connect (manager keeps retrying in the background).");
        manager.shutdown();
        return Ok(());
    }

    println!("Connected. Status register D0 = {}", manager.last_polled_value());

    let words = manager.read_words("D100", 4)?;
    println!("D100-D103 = {words:?}");

    let bits = manager.read_bits("X0", 8)?;
    println!("X0-X7 = {bits:?}");

    manager.shutdown();
    Ok(())
}
