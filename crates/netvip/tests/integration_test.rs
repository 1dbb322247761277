//! End-to-end tests against the running kernel.
//!
//! These require CAP_NET_ADMIN. Run with:
//!   sudo -E NETVIP_TEST_ENABLED=1 cargo test --test integration_test
//!
//! Tests cover:
//! - Address add/query/delete round trip on the loopback interface
//! - "Already exists" and "not available" rejections
//! - GARP transmission
//! - Watch-loop cancellation latency

use std::env;
use std::net::Ipv4Addr;
use std::thread;
use std::time::{Duration, Instant};

use common::Error;
use netvip::{AddressPrefix, Interface};
use tokio_util::sync::CancellationToken;

fn integration_tests_enabled() -> bool {
    env::var("NETVIP_TEST_ENABLED").is_ok()
}

#[test]
fn test_add_has_delete_roundtrip() {
    if !integration_tests_enabled() {
        eprintln!("Skipping integration test (set NETVIP_TEST_ENABLED=1 to run)");
        return;
    }

    let lo = Interface::by_name("lo").unwrap();
    let vip: AddressPrefix = "127.0.9.9/32".parse().unwrap();

    netvip::add_address(lo.index, &vip, Some("lo:vip")).unwrap();
    assert!(lo.has_prefix(&vip).unwrap());

    // Adding again must surface EEXIST, untouched by the client.
    let err = netvip::add_address(lo.index, &vip, Some("lo:vip")).unwrap_err();
    assert!(err.is_exist(), "expected EEXIST, got {err}");

    netvip::delete_address(lo.index, &vip).unwrap();
    assert!(!lo.has_prefix(&vip).unwrap());

    // Deleting again must surface EADDRNOTAVAIL.
    let err = netvip::delete_address(lo.index, &vip).unwrap_err();
    assert!(err.is_addr_not_avail(), "expected EADDRNOTAVAIL, got {err}");
}

#[test]
fn test_send_garp() {
    if !integration_tests_enabled() {
        eprintln!("Skipping integration test (set NETVIP_TEST_ENABLED=1 to run)");
        return;
    }

    let lo = Interface::by_name("lo").unwrap();
    let addr: Ipv4Addr = "127.0.9.9".parse().unwrap();
    netvip::send_garp(&lo, addr).unwrap();
}

#[test]
fn test_watch_cancellation_is_bounded() {
    if !integration_tests_enabled() {
        eprintln!("Skipping integration test (set NETVIP_TEST_ENABLED=1 to run)");
        return;
    }

    let lo = Interface::by_name("lo").unwrap();
    let addr: Ipv4Addr = "127.0.9.9".parse().unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        trigger.cancel();
    });

    let start = Instant::now();
    let result = netvip::watch_garp(&cancel, &lo, addr, |_| Ok(()));
    match result {
        Err(Error::Cancelled) => {}
        other => panic!("expected cancellation, got {other:?}"),
    }
    // The receive timeout bounds how late the poll can be.
    assert!(start.elapsed() < Duration::from_secs(3));
}
