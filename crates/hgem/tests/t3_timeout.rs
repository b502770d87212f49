// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! T3 expiry: the initiator fails with a timeout and the peer observes
//! one S9F9 carrying the original 10-byte header.

use hgem::hsms::frame::{write_message, FrameReader};
use hgem::hsms::{ControlStatus, HsmsConfig, HsmsMessage, HsmsProtocol, SType};
use hgem::{ConnectionState, Error};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// A minimal peer: accepts one session, answers the Select handshake, then
/// swallows data messages and forwards them to the test thread.
fn spawn_silent_peer(listener: TcpListener, captured: mpsc::Sender<HsmsMessage>) {
    thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        let mut writer = stream.try_clone().expect("clone");
        let mut reader = FrameReader::new(stream, Duration::from_secs(60));

        while let Ok(msg) = reader.read_message() {
            match msg.control_type() {
                Some(SType::SelectReq) => {
                    let rsp = HsmsMessage::select_rsp(&msg, ControlStatus::Accepted);
                    write_message(&mut writer, &rsp).expect("select.rsp");
                }
                Some(SType::LinktestReq) => {
                    let rsp = HsmsMessage::linktest_rsp(&msg);
                    write_message(&mut writer, &rsp).expect("linktest.rsp");
                }
                Some(SType::DeselectReq) => {
                    let rsp = HsmsMessage::deselect_rsp(&msg, ControlStatus::Accepted);
                    write_message(&mut writer, &rsp).expect("deselect.rsp");
                }
                Some(SType::SeparateReq) => return,
                Some(_) => {}
                None => {
                    // Data message: never reply, just record it.
                    let _ = captured.send(msg);
                }
            }
        }
    });
}

#[test]
fn t3_expiry_fails_the_sender_and_emits_s9f9() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();

    let (captured_tx, captured_rx) = mpsc::channel();
    spawn_silent_peer(listener, captured_tx);

    let mut config = HsmsConfig::active("127.0.0.1", port, 0x0100);
    config.timeouts.t3 = Duration::from_secs(2);
    let protocol = HsmsProtocol::new(config);
    protocol.enable();

    let deadline = Instant::now() + Duration::from_secs(10);
    while protocol.current_state() != ConnectionState::ConnectedSelected {
        assert!(Instant::now() < deadline, "selection never completed");
        thread::sleep(Duration::from_millis(20));
    }

    let started = Instant::now();
    let result = protocol.send_and_wait(HsmsMessage::data(1, 1, None));
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(Error::T3Timeout)));
    assert!(
        elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(10),
        "T3 should bound the wait, took {:?}",
        elapsed
    );

    // The peer saw the original S1F1 and then one S9F9 whose body equals
    // the S1F1 header bytes.
    let original = captured_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("original S1F1");
    assert_eq!(original.sf_code(), "S1F1");
    assert!(original.wait_bit());

    let s9 = captured_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("S9F9");
    assert_eq!(s9.sf_code(), "S9F9");
    assert!(!s9.wait_bit());
    match &s9.body {
        Some(hgem::secs2::Item::Binary(bytes)) => {
            assert_eq!(bytes.as_slice(), original.header.encode().as_slice());
        }
        other => panic!("unexpected S9F9 body {:?}", other),
    }

    protocol.disable();
}

#[test]
fn reply_correlation_matches_request() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();

    // Peer echoes every data message back as SxF(y+1) with the same
    // system bytes.
    thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        let mut writer = stream.try_clone().expect("clone");
        let mut reader = FrameReader::new(stream, Duration::from_secs(60));

        while let Ok(msg) = reader.read_message() {
            match msg.control_type() {
                Some(SType::SelectReq) => {
                    let rsp = HsmsMessage::select_rsp(&msg, ControlStatus::Accepted);
                    write_message(&mut writer, &rsp).expect("select.rsp");
                }
                Some(SType::LinktestReq) => {
                    let rsp = HsmsMessage::linktest_rsp(&msg);
                    write_message(&mut writer, &rsp).expect("linktest.rsp");
                }
                Some(SType::DeselectReq) => {
                    let rsp = HsmsMessage::deselect_rsp(&msg, ControlStatus::Accepted);
                    write_message(&mut writer, &rsp).expect("deselect.rsp");
                }
                Some(SType::SeparateReq) => return,
                Some(_) => {}
                None => {
                    let mut reply =
                        HsmsMessage::data(msg.stream(), msg.function() + 1, msg.body.clone());
                    reply.header.session_id = msg.header.session_id;
                    reply.header.system_bytes = msg.header.system_bytes;
                    write_message(&mut writer, &reply).expect("reply");
                }
            }
        }
    });

    let protocol = HsmsProtocol::new(HsmsConfig::active("127.0.0.1", port, 0x0100));
    protocol.enable();

    let deadline = Instant::now() + Duration::from_secs(10);
    while protocol.current_state() != ConnectionState::ConnectedSelected {
        assert!(Instant::now() < deadline, "selection never completed");
        thread::sleep(Duration::from_millis(20));
    }

    for function in [1u8, 3, 11] {
        let request = HsmsMessage::data(1, function, None);
        let reply = protocol.send_and_wait(request).expect("reply");
        assert_eq!(reply.function(), function + 1);
        assert_eq!(reply.header.session_id, 0x0100);
    }

    protocol.disable();
}
