// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HSMS connection lifecycle over a loopback TCP session.

use hgem::hsms::{HsmsConfig, HsmsMessage, HsmsProtocol};
use hgem::secs2::Item;
use hgem::ConnectionState;
use std::net::TcpListener;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("bind probe socket")
        .local_addr()
        .unwrap()
        .port()
}

fn wait_until(timeout: Duration, mut probe: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if probe() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    probe()
}

fn pair(port: u16) -> (HsmsProtocol, HsmsProtocol) {
    let passive = HsmsProtocol::new(HsmsConfig::passive("127.0.0.1", port, 0x0100));
    let active = HsmsProtocol::new(HsmsConfig::active("127.0.0.1", port, 0x0100));
    (active, passive)
}

#[test]
fn select_handshake_reaches_selected_on_both_sides() {
    let port = free_port();
    let (active, passive) = pair(port);

    passive.enable();
    active.enable();

    assert!(wait_until(Duration::from_secs(10), || {
        active.current_state() == ConnectionState::ConnectedSelected
            && passive.current_state() == ConnectionState::ConnectedSelected
    }));

    active.disable();
    passive.disable();

    assert!(wait_until(Duration::from_secs(5), || {
        active.current_state() == ConnectionState::NotConnected
    }));
}

#[test]
fn send_and_wait_reply_reuses_correlation() {
    let port = free_port();
    let (active, passive) = pair(port);

    // Equipment-style echo: replies to S1F1 with S1F2.
    passive.register_handler(
        1,
        1,
        Arc::new(|_msg| {
            Ok(Some(HsmsMessage::data(
                1,
                2,
                Some(Item::list(vec![Item::empty()])),
            )))
        }),
    );

    passive.enable();
    active.enable();
    assert!(wait_until(Duration::from_secs(10), || {
        active.current_state() == ConnectionState::ConnectedSelected
    }));

    let reply = active
        .send_and_wait(HsmsMessage::data(1, 1, None))
        .expect("S1F2 reply");
    assert_eq!(reply.stream(), 1);
    assert_eq!(reply.function(), 2);
    assert_eq!(reply.header.session_id, 0x0100);
    assert!(!reply.wait_bit());

    active.disable();
    passive.disable();
}

#[test]
fn unknown_function_returns_s9f5_with_function_code() {
    let port = free_port();
    let (active, passive) = pair(port);

    passive.enable();
    active.enable();
    assert!(wait_until(Duration::from_secs(10), || {
        active.current_state() == ConnectionState::ConnectedSelected
    }));

    // Stream 1 is known on the peer but function 99 has no handler. The
    // synthesized S9F5 reuses the request's system bytes, so it arrives as
    // the "reply" of the transaction.
    let reply = active
        .send_and_wait(HsmsMessage::data(1, 99, None))
        .expect("S9F5 reply");
    assert_eq!(reply.sf_code(), "S9F5");
    assert_eq!(reply.body.as_ref().unwrap().first_byte(), Some(99));

    active.disable();
    passive.disable();
}

#[test]
fn unknown_stream_returns_s9f3_with_stream_code() {
    let port = free_port();
    let (active, passive) = pair(port);

    passive.enable();
    active.enable();
    assert!(wait_until(Duration::from_secs(10), || {
        active.current_state() == ConnectionState::ConnectedSelected
    }));

    let reply = active
        .send_and_wait(HsmsMessage::data(99, 1, None))
        .expect("S9F3 reply");
    assert_eq!(reply.sf_code(), "S9F3");
    assert_eq!(reply.body.as_ref().unwrap().first_byte(), Some(99));

    active.disable();
    passive.disable();
}

#[test]
fn sends_fail_after_disable() {
    let port = free_port();
    let (active, passive) = pair(port);

    passive.enable();
    active.enable();
    assert!(wait_until(Duration::from_secs(10), || {
        active.current_state() == ConnectionState::ConnectedSelected
    }));

    active.disable();
    assert!(active
        .send_data_message(HsmsMessage::data(1, 1, None))
        .is_err());

    passive.disable();
}

#[test]
fn extra_connection_is_refused_while_session_active() {
    let port = free_port();
    let (active, passive) = pair(port);

    passive.enable();
    active.enable();
    assert!(wait_until(Duration::from_secs(10), || {
        passive.current_state() == ConnectionState::ConnectedSelected
    }));

    // A second raw connection is accepted at TCP level and closed right
    // away: reading from it yields EOF.
    let mut extra =
        std::net::TcpStream::connect(("127.0.0.1", port)).expect("second connection");
    extra
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut buf = [0u8; 1];
    use std::io::Read;
    match extra.read(&mut buf) {
        Ok(0) => {}
        other => panic!("expected EOF on extra connection, got {:?}", other),
    }

    active.disable();
    passive.disable();
}

#[test]
fn default_handler_sees_unrouted_messages() {
    let port = free_port();
    let (active, passive) = pair(port);

    let hits = Arc::new(AtomicU32::new(0));
    let counter = hits.clone();
    passive.register_default_handler(Arc::new(move |msg| {
        counter.fetch_add(1, Ordering::SeqCst);
        assert_eq!(msg.stream(), 64);
        Ok(None)
    }));

    passive.enable();
    active.enable();
    assert!(wait_until(Duration::from_secs(10), || {
        active.current_state() == ConnectionState::ConnectedSelected
    }));

    active
        .send_data_message(HsmsMessage::data(64, 1, None))
        .expect("send");
    assert!(wait_until(Duration::from_secs(5), || {
        hits.load(Ordering::SeqCst) == 1
    }));

    active.disable();
    passive.disable();
}
