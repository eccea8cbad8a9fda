//! Integration test for signal-driven shutdown.
//!
//! Lives in its own test binary: the handler can only be installed once per
//! process, and a signal without a handler would kill the test runner.

#![cfg(unix)]

use std::process::Command;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_sigterm_sets_shutdown_flag() {
    let shutdown = server::signal::install_signal_handler().expect("failed to install handler");
    assert!(!shutdown.load(Ordering::SeqCst));

    let status = Command::new("kill")
        .arg("-TERM")
        .arg(std::process::id().to_string())
        .status()
        .expect("failed to run kill");
    assert!(status.success());

    let start = Instant::now();
    while !shutdown.load(Ordering::SeqCst) {
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "SIGTERM did not set the shutdown flag"
        );
        thread::sleep(Duration::from_millis(10));
    }
}
