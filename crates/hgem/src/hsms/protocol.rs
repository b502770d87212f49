// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The HSMS connection engine.
//!
//! Owns the socket and its receive loop, the connection state machine, the
//! transaction registry and the timer set. One instance serves one session:
//! active engines dial with capped exponential backoff, passive engines
//! accept a single session and refuse extras.
//!
//! Data traffic requires the SELECTED state; control traffic (the Select /
//! Deselect / Linktest / Separate handshakes) is handled inside the engine
//! and never reaches registered handlers.

use super::config::HsmsConfig;
use super::frame::{self, FrameError, FrameReader};
use super::message::{
    ControlStatus, HsmsMessage, RejectReason, SType, WILDCARD_SESSION,
};
use super::s9;
use super::state::{ConnectionState, ConnectionStateMachine};
use super::timer::OneshotTimer;
use super::transaction::TransactionRegistry;
use super::wirelog::{WireLogConfig, WireLogger};
use crate::error::{Error, Result};
use crate::{debug, error, info, warn};

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Callback invoked for inbound data messages.
///
/// Returning `Ok(Some(reply))` sends the reply with the request's system
/// bytes and W cleared. Errors are logged and suppress any reply.
pub type DataMessageHandler =
    Arc<dyn Fn(&HsmsMessage) -> Result<Option<HsmsMessage>> + Send + Sync>;

/// HSMS protocol engine handle.
///
/// Cheap to clone; all clones drive the same engine.
#[derive(Clone)]
pub struct HsmsProtocol {
    inner: Arc<ProtocolInner>,
}

struct ProtocolInner {
    config: HsmsConfig,

    /// Effective session id; may be adopted from the peer on Select.req.
    session_id: AtomicU16,

    enabled: AtomicBool,
    connected: AtomicBool,
    auto_reconnect: AtomicBool,
    connect_thread_running: AtomicBool,

    system_counter: AtomicU32,

    state: ConnectionStateMachine,
    transactions: TransactionRegistry,

    handlers: DashMap<(u8, u8), DataMessageHandler>,
    default_handler: RwLock<Option<DataMessageHandler>>,

    /// Write half of the session socket. Doubles as the send mutex: frames
    /// written to one socket are serialized here.
    socket: Mutex<Option<TcpStream>>,

    wirelog: WireLogger,
    t7_timer: OneshotTimer,
    linktest_stop: Mutex<Option<Sender<()>>>,

    /// Dropped by the session owner when its receive loop finishes;
    /// `disable` waits on it.
    recv_done: Mutex<Option<Receiver<()>>>,
}

impl HsmsProtocol {
    /// Create a disabled engine from its configuration.
    pub fn new(config: HsmsConfig) -> HsmsProtocol {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(1);
        let auto_reconnect = config.auto_reconnect;
        let session_id = config.session_id;

        HsmsProtocol {
            inner: Arc::new(ProtocolInner {
                config,
                session_id: AtomicU16::new(session_id),
                enabled: AtomicBool::new(false),
                connected: AtomicBool::new(false),
                auto_reconnect: AtomicBool::new(auto_reconnect),
                connect_thread_running: AtomicBool::new(false),
                system_counter: AtomicU32::new(seed),
                state: ConnectionStateMachine::new(),
                transactions: TransactionRegistry::new(),
                handlers: DashMap::new(),
                default_handler: RwLock::new(None),
                socket: Mutex::new(None),
                wirelog: WireLogger::new(),
                t7_timer: OneshotTimer::new(),
                linktest_stop: Mutex::new(None),
                recv_done: Mutex::new(None),
            }),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start the connection manager (dial or listen).
    pub fn enable(&self) {
        if self.inner.enabled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.spawn_connect_thread();
    }

    /// Tear the engine down: best-effort Deselect/Separate on an active
    /// selected session, socket close, receive loop join (bounded).
    pub fn disable(&self) {
        let inner = &self.inner;
        if !inner.enabled.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("hsms disable requested active={}", inner.config.active);

        inner.t7_timer.stop();
        inner.stop_linktest();

        if inner.config.active && inner.socket.lock().is_some() {
            if inner.state.current() == ConnectionState::ConnectedSelected {
                let session = inner.session_id();
                if let Err(e) =
                    inner.send_control_and_wait(|sid| HsmsMessage::deselect_req(session, sid))
                {
                    debug!("deselect on disable err={}", e);
                }
            }
            let separate =
                HsmsMessage::separate_req(inner.session_id(), inner.next_system_id());
            if let Err(e) = inner.send_control(&separate) {
                debug!("separate on disable err={}", e);
            }
            // Give the peer a moment to observe the separation.
            thread::sleep(Duration::from_millis(200));
        }

        inner.shutdown_socket();
        inner.connected.store(false, Ordering::SeqCst);

        // The session owner never sends on this channel; its disconnection
        // signals that the receive loop has finished.
        let done = inner.recv_done.lock().take();
        if let Some(done) = done {
            let _ = done.recv_timeout(Duration::from_secs(2));
        }
    }

    /// True while `enable` is in effect.
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// True while a TCP session is established.
    pub fn connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Current connection state.
    pub fn current_state(&self) -> ConnectionState {
        self.inner.state.current()
    }

    /// Effective session id (after any adoption).
    pub fn session_id(&self) -> u16 {
        self.inner.session_id()
    }

    /// The configured timer set.
    pub fn timeouts(&self) -> super::timeout::SecsTimeouts {
        self.inner.config.timeouts
    }

    /// Toggle reconnection at runtime. Clearing it stops the dial loop after
    /// the current attempt.
    pub fn set_auto_reconnect(&self, enabled: bool) {
        self.inner.auto_reconnect.store(enabled, Ordering::SeqCst);
    }

    // ========================================================================
    // Handlers and logging
    // ========================================================================

    /// Register a handler for a (stream, function) pair.
    pub fn register_handler(&self, stream: u8, function: u8, handler: DataMessageHandler) {
        self.inner.handlers.insert((stream, function), handler);
    }

    /// Remove a previously registered handler.
    pub fn unregister_handler(&self, stream: u8, function: u8) {
        self.inner.handlers.remove(&(stream, function));
    }

    /// Install a fallback handler for messages without a specific handler.
    pub fn register_default_handler(&self, handler: DataMessageHandler) {
        *self.inner.default_handler.write() = Some(handler);
    }

    /// Reconfigure wire-level message logging.
    pub fn configure_logging(&self, config: WireLogConfig) {
        self.inner.wirelog.configure(config);
    }

    // ========================================================================
    // Send primitives
    // ========================================================================

    /// Send a data message without waiting for a reply (W cleared).
    pub fn send_data_message(&self, msg: HsmsMessage) -> Result<()> {
        self.inner.send_data(msg)
    }

    /// Send a data message with W set and wait up to T3 for the correlated
    /// reply. Emits S9F9 toward the peer on T3 expiry.
    pub fn send_and_wait(&self, msg: HsmsMessage) -> Result<HsmsMessage> {
        self.inner.send_and_wait(msg)
    }

    /// Send a reply reusing the request's system bytes (W cleared).
    pub fn send_response(&self, msg: HsmsMessage, system_bytes: u32) -> Result<()> {
        self.inner.send_response(msg, system_bytes)
    }
}

// ============================================================================
// Engine internals
// ============================================================================

impl ProtocolInner {
    fn session_id(&self) -> u16 {
        self.session_id.load(Ordering::SeqCst)
    }

    fn next_system_id(&self) -> u32 {
        self.system_counter
            .fetch_add(1, Ordering::SeqCst)
            .wrapping_add(1)
    }

    fn spawn_connect_thread(self: &Arc<Self>) {
        if self.connect_thread_running.swap(true, Ordering::SeqCst) {
            return;
        }
        let inner = Arc::clone(self);
        let _ = thread::Builder::new()
            .name("hgem-hsms-connect".into())
            .spawn(move || inner.connect_loop());
    }

    // ------------------------------------------------------------------
    // Connect / accept
    // ------------------------------------------------------------------

    fn connect_loop(self: Arc<Self>) {
        while self.enabled.load(Ordering::SeqCst) {
            if self.config.active {
                if !self.run_active_dialer() {
                    break;
                }
            } else {
                match self.run_passive_listener() {
                    Ok(()) => break,
                    Err(e) => {
                        if !self.enabled.load(Ordering::SeqCst) {
                            break;
                        }
                        error!("listen error err={}", e);
                        self.sleep_interruptible(Duration::from_secs(1), false);
                    }
                }
            }
        }
        self.connect_thread_running.store(false, Ordering::SeqCst);
    }

    /// One full dial campaign. Returns false when the loop must stop
    /// (disabled, reconnection exhausted or switched off).
    fn run_active_dialer(self: &Arc<Self>) -> bool {
        let addr = match self.config.socket_addr() {
            Ok(addr) => addr,
            Err(e) => {
                error!("bad endpoint address err={}", e);
                return false;
            }
        };

        let mut attempts: u32 = 0;
        loop {
            if !self.enabled.load(Ordering::SeqCst) {
                return false;
            }
            match TcpStream::connect_timeout(&addr, self.config.timeouts.t6) {
                Ok(stream) => {
                    attempts = 0;
                    self.handle_session(stream);
                    if !self.enabled.load(Ordering::SeqCst) {
                        return false;
                    }
                    self.sleep_interruptible(self.config.timeouts.t5, false);
                }
                Err(e) => {
                    attempts += 1;
                    warn!(
                        "connect failed addr={} attempt={} err={}",
                        addr, attempts, e
                    );
                    if !self.auto_reconnect.load(Ordering::SeqCst) {
                        return false;
                    }
                    if self.config.max_reconnect_attempts != 0
                        && attempts >= self.config.max_reconnect_attempts
                    {
                        error!("reconnect attempts exhausted attempts={}", attempts);
                        return false;
                    }
                    self.sleep_interruptible(self.config.backoff_delay(attempts), true);
                    if !self.auto_reconnect.load(Ordering::SeqCst) {
                        return false;
                    }
                }
            }
        }
    }

    /// Accept loop for the passive role. Serves one session at a time;
    /// extra connections are closed on arrival.
    fn run_passive_listener(self: &Arc<Self>) -> Result<()> {
        let addr = self.config.socket_addr()?;
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(8)?;
        let listener: TcpListener = socket.into();
        listener.set_nonblocking(true)?;
        info!("listening addr={}", addr);

        loop {
            if !self.enabled.load(Ordering::SeqCst) {
                return Ok(());
            }
            match listener.accept() {
                Ok((stream, peer)) => {
                    if self.connected.load(Ordering::SeqCst) {
                        info!("extra connection refused peer={}", peer);
                        drop(stream);
                        continue;
                    }
                    if stream.set_nonblocking(false).is_err() {
                        continue;
                    }
                    self.handle_session(stream);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(100));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn sleep_interruptible(&self, total: Duration, heed_auto_reconnect: bool) {
        let deadline = std::time::Instant::now() + total;
        while std::time::Instant::now() < deadline {
            if !self.enabled.load(Ordering::SeqCst) {
                return;
            }
            if heed_auto_reconnect && !self.auto_reconnect.load(Ordering::SeqCst) {
                return;
            }
            thread::sleep(Duration::from_millis(100));
        }
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Run one TCP session to completion: install the socket, drive the
    /// connection state machine, block in the receive loop, tear down.
    fn handle_session(self: &Arc<Self>, stream: TcpStream) {
        let _ = stream.set_nodelay(true);
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "?".into());

        let reader_stream = match stream.try_clone() {
            Ok(clone) => clone,
            Err(e) => {
                error!("socket clone failed err={}", e);
                return;
            }
        };

        let (done_tx, done_rx) = bounded::<()>(1);
        *self.recv_done.lock() = Some(done_rx);
        *self.socket.lock() = Some(stream);
        self.connected.store(true, Ordering::SeqCst);
        info!("connection established peer={}", peer);

        if let Err(e) = self.state.connect() {
            warn!("connect transition err={}", e);
        }
        self.enter_not_selected();

        if self.config.active {
            let inner = Arc::clone(self);
            let _ = thread::Builder::new()
                .name("hgem-hsms-select".into())
                .spawn(move || inner.run_select_handshake());
        }

        self.receive_loop(FrameReader::new(reader_stream, self.config.timeouts.t8));

        // Teardown; reconnection is the caller's loop.
        self.connected.store(false, Ordering::SeqCst);
        self.stop_linktest();
        self.t7_timer.stop();
        if self.state.current() != ConnectionState::NotConnected {
            let _ = self.state.disconnect();
        }
        *self.socket.lock() = None;
        info!("connection closed peer={}", peer);
        drop(done_tx);
    }

    fn receive_loop(self: &Arc<Self>, mut reader: FrameReader) {
        while self.enabled.load(Ordering::SeqCst) {
            match reader.read_message() {
                Ok(msg) if msg.is_data() => self.on_data_message(msg),
                Ok(msg) => {
                    let separate = msg.control_type() == Some(SType::SeparateReq);
                    self.on_control_message(msg);
                    if separate {
                        break;
                    }
                }
                Err(FrameError::TooLong { header, declared }) => {
                    warn!(
                        "oversize frame declared={} system={:08X} -> S9F11",
                        declared, header.system_bytes
                    );
                    let _ = self.send_s9(s9::data_too_long(), header.system_bytes);
                }
                Err(FrameError::Malformed { header, reason }) => {
                    error!("malformed frame reason={}", reason);
                    if let Some(header) = header {
                        let _ = self.send_s9(s9::illegal_data(), header.system_bytes);
                    }
                    self.shutdown_socket();
                    break;
                }
                Err(FrameError::Timeout) => {
                    warn!("receive error: T8 timeout t8={:?}", self.config.timeouts.t8);
                    break;
                }
                Err(FrameError::Closed) => {
                    info!("peer closed connection");
                    break;
                }
                Err(FrameError::Io(e)) => {
                    if self.enabled.load(Ordering::SeqCst) {
                        error!("receive error err={}", e);
                    }
                    break;
                }
            }
        }
    }

    fn shutdown_socket(&self) {
        if let Some(stream) = self.socket.lock().as_ref() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    // ------------------------------------------------------------------
    // State entry side effects
    // ------------------------------------------------------------------

    fn enter_not_selected(self: &Arc<Self>) {
        let t7 = self.config.timeouts.t7;
        if t7.is_zero() {
            return;
        }
        let weak = Arc::downgrade(self);
        self.t7_timer.start(t7, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.state.current() != ConnectionState::ConnectedNotSelected {
                return;
            }
            warn!("T7 expired without selection t7={:?}", t7);
            inner.connected.store(false, Ordering::SeqCst);
            if let Err(e) = inner.state.timeout_t7() {
                debug!("timeoutT7 transition err={}", e);
            }
            inner.shutdown_socket();
        });
    }

    fn on_selected(self: &Arc<Self>) {
        info!("state: CONNECTED-SELECTED session=0x{:04X}", self.session_id());
        self.t7_timer.stop();
        self.start_linktest();
    }

    fn on_deselected(self: &Arc<Self>) {
        info!("state: CONNECTED-NOT-SELECTED");
        self.stop_linktest();
        self.enter_not_selected();
    }

    // ------------------------------------------------------------------
    // Linktest
    // ------------------------------------------------------------------

    fn start_linktest(self: &Arc<Self>) {
        let period = self.config.timeouts.linktest;
        if period.is_zero() {
            return;
        }
        let (stop_tx, stop_rx) = bounded::<()>(1);
        {
            let mut guard = self.linktest_stop.lock();
            if guard.is_some() {
                return;
            }
            *guard = Some(stop_tx);
        }

        let inner = Arc::clone(self);
        let _ = thread::Builder::new()
            .name("hgem-hsms-linktest".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => inner.run_linktest(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                }
            });
    }

    fn stop_linktest(&self) {
        self.linktest_stop.lock().take();
    }

    fn run_linktest(&self) {
        match self.send_control_and_wait(HsmsMessage::linktest_req) {
            Ok(_) => debug!("linktest.rsp received"),
            Err(e) => warn!("linktest failed err={}", e),
        }
    }

    // ------------------------------------------------------------------
    // Control messages
    // ------------------------------------------------------------------

    /// Send a control request and await its response under T6.
    fn send_control_and_wait(
        &self,
        build: impl FnOnce(u32) -> HsmsMessage,
    ) -> Result<HsmsMessage> {
        let system_id = self.next_system_id();
        let mailbox = self.transactions.create(system_id)?;
        let msg = build(system_id);

        if let Err(e) = self.send_control(&msg) {
            self.transactions.remove(system_id);
            return Err(e);
        }

        let reply = mailbox.wait(self.config.timeouts.t6);
        self.transactions.remove(system_id);

        match reply {
            Some(reply) => match reply.control_type() {
                Some(SType::RejectReq) => Err(Error::Rejected(RejectReason::from_byte(
                    reply.control_status(),
                ))),
                _ => Ok(reply),
            },
            None => Err(Error::T6Timeout),
        }
    }

    fn send_control(&self, msg: &HsmsMessage) -> Result<()> {
        self.wirelog.log_control("TX", msg);
        self.write_frame(msg)
    }

    fn run_select_handshake(self: Arc<Self>) {
        let session = self.session_id();
        match self.send_control_and_wait(|sid| HsmsMessage::select_req(session, sid)) {
            Ok(rsp) => {
                if rsp.control_status() != ControlStatus::Accepted.code() {
                    warn!("select.rsp status={}", rsp.control_status());
                }
            }
            Err(e) => warn!("select.req failed err={}", e),
        }
    }

    fn on_control_message(self: &Arc<Self>, msg: HsmsMessage) {
        self.wirelog.log_control("RX", &msg);
        let system_id = msg.header.system_bytes;

        match msg.control_type() {
            Some(SType::SelectReq) => self.on_select_req(msg),

            Some(SType::SelectRsp) => {
                let status = msg.control_status();
                self.transactions.deliver(system_id, msg);
                if status != ControlStatus::Accepted.code() {
                    warn!("select.rsp denied status={}", status);
                    self.connected.store(false, Ordering::SeqCst);
                    if self.state.current() != ConnectionState::NotConnected {
                        let _ = self.state.disconnect();
                    }
                    self.shutdown_socket();
                } else {
                    match self.state.select() {
                        Ok(_) => self.on_selected(),
                        Err(e) => debug!("select transition err={}", e),
                    }
                }
            }

            Some(SType::DeselectReq) => {
                if !self.connected.load(Ordering::SeqCst) {
                    let _ =
                        self.send_control(&HsmsMessage::reject_req(&msg, RejectReason::NotReady));
                    return;
                }
                let _ = self
                    .send_control(&HsmsMessage::deselect_rsp(&msg, ControlStatus::Accepted));
                match self.state.deselect() {
                    Ok(_) => self.on_deselected(),
                    Err(e) => debug!("deselect transition err={}", e),
                }
            }

            Some(SType::DeselectRsp) => {
                match self.state.deselect() {
                    Ok(_) => self.on_deselected(),
                    Err(e) => debug!("deselect transition err={}", e),
                }
                self.transactions.deliver(system_id, msg);
            }

            Some(SType::LinktestReq) => {
                if !self.connected.load(Ordering::SeqCst) {
                    let _ =
                        self.send_control(&HsmsMessage::reject_req(&msg, RejectReason::NotReady));
                    return;
                }
                let _ = self.send_control(&HsmsMessage::linktest_rsp(&msg));
            }

            Some(SType::LinktestRsp) => {
                self.transactions.deliver(system_id, msg);
            }

            Some(SType::RejectReq) => {
                warn!(
                    "reject.req received reason={}",
                    RejectReason::from_byte(msg.control_status())
                );
                self.transactions.deliver(system_id, msg);
            }

            Some(SType::SeparateReq) => {
                info!("separate.req received; closing session");
                self.stop_linktest();
                self.connected.store(false, Ordering::SeqCst);
                if self.state.current() != ConnectionState::NotConnected {
                    let _ = self.state.disconnect();
                }
                self.shutdown_socket();
            }

            None => {
                self.transactions.deliver(system_id, msg);
            }
        }
    }

    fn on_select_req(self: &Arc<Self>, msg: HsmsMessage) {
        let received = msg.header.session_id;
        let expected = self.session_id();

        if received != expected {
            let mut accept = false;
            if self.config.accept_wildcard_session {
                if received == WILDCARD_SESSION {
                    info!(
                        "select.req wildcard session accepted expected=0x{:04X}",
                        expected
                    );
                    accept = true;
                } else if expected == 0 || expected == WILDCARD_SESSION {
                    info!(
                        "select.req adopting peer session 0x{:04X} in place of 0x{:04X}",
                        received, expected
                    );
                    self.session_id.store(received, Ordering::SeqCst);
                    accept = true;
                }
            }
            if !accept {
                warn!(
                    "select.req session mismatch got=0x{:04X} expected=0x{:04X}",
                    received, expected
                );
                let _ = self.send_control(&HsmsMessage::select_rsp(&msg, ControlStatus::Denied));
                self.connected.store(false, Ordering::SeqCst);
                if self.state.current() != ConnectionState::NotConnected {
                    let _ = self.state.disconnect();
                }
                self.shutdown_socket();
                return;
            }
        }

        if !self.connected.load(Ordering::SeqCst) {
            let _ = self.send_control(&HsmsMessage::reject_req(&msg, RejectReason::NotReady));
            return;
        }

        let _ = self.send_control(&HsmsMessage::select_rsp(&msg, ControlStatus::Accepted));
        match self.state.select() {
            Ok(_) => self.on_selected(),
            Err(e) => debug!("select transition err={}", e),
        }
    }

    // ------------------------------------------------------------------
    // Data messages
    // ------------------------------------------------------------------

    fn on_data_message(self: &Arc<Self>, msg: HsmsMessage) {
        self.wirelog.log_data("RX", &msg);

        if self.state.current() != ConnectionState::ConnectedSelected {
            warn!("data message while not selected sf={}", msg.sf_code());
            let _ = self.send_control(&HsmsMessage::reject_req(&msg, RejectReason::NotReady));
            return;
        }

        let system_id = msg.header.system_bytes;
        let msg = match self.transactions.deliver(system_id, msg) {
            None => return, // consumed by a waiting transaction
            Some(msg) => msg,
        };

        self.dispatch_data(msg);
    }

    fn dispatch_data(&self, msg: HsmsMessage) {
        let key = (msg.stream(), msg.function());
        let handler = self.handlers.get(&key).map(|entry| Arc::clone(entry.value()));
        if let Some(handler) = handler {
            self.invoke_handler(&handler, &msg);
            return;
        }

        let fallback = self.default_handler.read().clone();
        if let Some(handler) = fallback {
            self.invoke_handler(&handler, &msg);
            return;
        }

        // Stream 9 never provokes another Stream 9.
        if msg.stream() == 9 {
            debug!("unhandled stream 9 message {}", msg.sf_code());
            return;
        }
        if !s9::known_stream(msg.stream()) {
            info!("unrecognized stream {} -> S9F3", msg.sf_code());
            let _ = self.send_s9(s9::unrecognized_stream(msg.stream()), msg.header.system_bytes);
        } else {
            info!("unrecognized function {} -> S9F5", msg.sf_code());
            let _ = self.send_s9(
                s9::unrecognized_function(msg.function()),
                msg.header.system_bytes,
            );
        }
    }

    fn invoke_handler(&self, handler: &DataMessageHandler, msg: &HsmsMessage) {
        match handler(msg) {
            Ok(Some(reply)) => {
                if let Err(e) = self.send_response(reply, msg.header.system_bytes) {
                    warn!("response send failed sf={} err={}", msg.sf_code(), e);
                }
            }
            Ok(None) => {}
            Err(e) => error!("handler error sf={} err={}", msg.sf_code(), e),
        }
    }

    // ------------------------------------------------------------------
    // Send paths
    // ------------------------------------------------------------------

    fn ensure_selected(&self) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) || self.socket.lock().is_none() {
            return Err(Error::NotConnected);
        }
        if self.state.current() != ConnectionState::ConnectedSelected {
            return Err(Error::NotSelected);
        }
        Ok(())
    }

    fn write_frame(&self, msg: &HsmsMessage) -> Result<()> {
        let mut guard = self.socket.lock();
        match guard.as_mut() {
            Some(stream) => frame::write_message(stream, msg).map_err(Error::Io),
            None => Err(Error::NotConnected),
        }
    }

    fn send_data_frame(&self, msg: &HsmsMessage) -> Result<()> {
        self.wirelog.log_data("TX", msg);
        self.write_frame(msg)
    }

    fn send_data(&self, mut msg: HsmsMessage) -> Result<()> {
        self.ensure_selected()?;
        msg.header.session_id = self.session_id();
        msg.header.system_bytes = self.next_system_id();
        msg.set_wait_bit(false);
        self.send_data_frame(&msg)
    }

    fn send_and_wait(&self, mut msg: HsmsMessage) -> Result<HsmsMessage> {
        self.ensure_selected()?;

        let system_id = self.next_system_id();
        msg.header.session_id = self.session_id();
        msg.header.system_bytes = system_id;
        msg.set_wait_bit(true);

        let mailbox = self.transactions.create(system_id)?;
        if let Err(e) = self.send_data_frame(&msg) {
            self.transactions.remove(system_id);
            return Err(e);
        }

        let reply = mailbox.wait(self.config.timeouts.t3);
        self.transactions.remove(system_id);

        match reply {
            Some(reply) if reply.is_data() => Ok(reply),
            Some(reply) => Err(Error::Rejected(RejectReason::from_byte(
                reply.control_status(),
            ))),
            None => {
                info!("T3 expired sf={} -> S9F9", msg.sf_code());
                let mut s9_msg = s9::transaction_timeout(&msg.header);
                s9_msg.header.session_id = self.session_id();
                s9_msg.header.system_bytes = self.next_system_id();
                let _ = self.send_data_frame(&s9_msg);
                Err(Error::T3Timeout)
            }
        }
    }

    fn send_response(&self, mut msg: HsmsMessage, system_bytes: u32) -> Result<()> {
        self.ensure_selected()?;
        msg.header.session_id = self.session_id();
        msg.header.system_bytes = system_bytes;
        msg.set_wait_bit(false);
        self.send_data_frame(&msg)
    }

    /// Stream 9 synthesis reusing the offending message's system bytes.
    fn send_s9(&self, mut msg: HsmsMessage, system_bytes: u32) -> Result<()> {
        msg.header.session_id = self.session_id();
        msg.header.system_bytes = system_bytes;
        msg.set_wait_bit(false);
        self.send_data_frame(&msg)
    }
}

impl Drop for ProtocolInner {
    fn drop(&mut self) {
        self.t7_timer.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secs2::Item;

    fn test_config() -> HsmsConfig {
        HsmsConfig::active("127.0.0.1", 1, 0x0100)
    }

    #[test]
    fn sends_require_connection() {
        let protocol = HsmsProtocol::new(test_config());
        let msg = HsmsMessage::data(1, 1, Some(Item::empty()));
        assert!(matches!(
            protocol.send_data_message(msg.clone()),
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            protocol.send_and_wait(msg.clone()),
            Err(Error::NotConnected)
        ));
        assert!(matches!(
            protocol.send_response(msg, 1),
            Err(Error::NotConnected)
        ));
    }

    #[test]
    fn disable_without_enable_is_noop() {
        let protocol = HsmsProtocol::new(test_config());
        protocol.disable();
        assert!(!protocol.is_enabled());
        assert_eq!(protocol.current_state(), ConnectionState::NotConnected);
    }

    #[test]
    fn system_ids_are_unique() {
        let protocol = HsmsProtocol::new(test_config());
        let a = protocol.inner.next_system_id();
        let b = protocol.inner.next_system_id();
        let c = protocol.inner.next_system_id();
        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn handler_registry_replaces_and_removes() {
        let protocol = HsmsProtocol::new(test_config());
        let handler: DataMessageHandler = Arc::new(|_msg| Ok(None));
        protocol.register_handler(1, 1, handler.clone());
        assert!(protocol.inner.handlers.contains_key(&(1, 1)));

        protocol.unregister_handler(1, 1);
        assert!(!protocol.inner.handlers.contains_key(&(1, 1)));

        protocol.register_default_handler(handler);
        assert!(protocol.inner.default_handler.read().is_some());
    }

    #[test]
    fn session_id_adoption_flag() {
        let protocol = HsmsProtocol::new(test_config());
        assert_eq!(protocol.session_id(), 0x0100);
        protocol.inner.session_id.store(0x0200, Ordering::SeqCst);
        assert_eq!(protocol.session_id(), 0x0200);
    }
}
