// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The GEM handler: wiring, lifecycle, and the communication handshake.
//!
//! A [`GemHandler`] owns one [`HsmsProtocol`] and registers the message
//! handlers for its role. Hosts drive the S1F13 establish-communication
//! handshake from a 500 ms observer; equipment answers it and runs the
//! control model.

use super::alarms::Alarm;
use super::callback::Event;
use super::clock::ClockManager;
use super::collection::{CollectionRegistry, EventReport};
use super::communication::{CommunicationState, CommunicationStateMachine};
use super::config::{DeviceType, GemOptions};
use super::constants::EquipmentConstant;
use super::control::{ControlState, ControlStateChange, ControlStateMachine, OnlineMode};
use super::messages;
use super::process_programs::{
    ProcessProgramRequestHandler, ProcessProgramStore, ProcessProgramUploadHandler,
};
use super::remote_commands::{RemoteCommandHandler, RemoteCommandRequest};
use super::variables::{DataVariable, StatusVariable, VariableRegistry};
use crate::error::{Error, Result};
use crate::hsms::{ConnectionState, DataMessageHandler, HsmsConfig, HsmsMessage, HsmsProtocol};
use crate::secs2::Item;
use crate::{debug, info, warn};

use crossbeam::channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

/// COMMACK code accepting an establish-communication request.
const COMMACK_ACCEPTED: u8 = 0;

/// Period of the communication observer.
const OBSERVER_PERIOD: Duration = Duration::from_millis(500);

/// A Stream 9 error notification received from the peer.
#[derive(Debug, Clone)]
pub struct S9Error {
    /// Stream 9 function code (3, 5, 7, 9, 11, ...).
    pub function: u8,
    pub system_bytes: u32,
    pub body: Option<Item>,
}

/// GEM event channels. Callbacks are fire-and-forget and must not block
/// indefinitely.
pub struct Events {
    /// COMMUNICATING entered.
    pub handler_communicating: Event<()>,
    /// S6F11 received (host side).
    pub event_report_received: Event<EventReport>,
    /// S5F1 received (host side).
    pub alarm_received: Event<super::alarms::AlarmEvent>,
    /// S5F2 received, carrying the ACKC5 byte.
    pub alarm_ack_received: Event<u8>,
    /// S2F41 received (equipment side).
    pub remote_command_received: Event<RemoteCommandRequest>,
    /// Any Stream 9 message received.
    pub s9_error_received: Event<S9Error>,
}

impl Events {
    fn new() -> Events {
        Events {
            handler_communicating: Event::new(),
            event_report_received: Event::new(),
            alarm_received: Event::new(),
            alarm_ack_received: Event::new(),
            remote_command_received: Event::new(),
            s9_error_received: Event::new(),
        }
    }
}

/// GEM handler handle. Cheap to clone; all clones drive the same handler.
#[derive(Clone)]
pub struct GemHandler {
    pub(crate) inner: Arc<GemInner>,
}

pub(crate) struct GemInner {
    pub(crate) protocol: HsmsProtocol,
    pub(crate) device_type: DeviceType,
    pub(crate) device_id: u16,
    pub(crate) mdln: String,
    pub(crate) softrev: String,
    pub(crate) establish_wait: Duration,

    pub(crate) comm: CommunicationStateMachine,
    pub(crate) control: ControlStateMachine,

    pub(crate) enabled: AtomicBool,
    pub(crate) handshake_in_progress: AtomicBool,

    pub(crate) events: Events,

    pub(crate) status_vars: RwLock<VariableRegistry<StatusVariable>>,
    pub(crate) data_vars: RwLock<VariableRegistry<DataVariable>>,
    pub(crate) constants: RwLock<VariableRegistry<EquipmentConstant>>,
    pub(crate) collection: RwLock<CollectionRegistry>,
    pub(crate) alarms: RwLock<BTreeMap<u64, Alarm>>,
    pub(crate) clock: ClockManager,
    pub(crate) programs: ProcessProgramStore,

    pub(crate) remote_command_handler: RwLock<Option<RemoteCommandHandler>>,
    pub(crate) pp_upload_handler: RwLock<Option<ProcessProgramUploadHandler>>,
    pub(crate) pp_request_handler: RwLock<Option<ProcessProgramRequestHandler>>,

    observer_stop: Mutex<Option<Sender<()>>>,
}

impl GemHandler {
    /// Create a handler and its HSMS engine from configuration.
    pub fn new(hsms: HsmsConfig, options: GemOptions) -> Result<GemHandler> {
        GemHandler::with_protocol(HsmsProtocol::new(hsms), options)
    }

    /// Create a handler on an existing HSMS engine.
    pub fn with_protocol(protocol: HsmsProtocol, mut options: GemOptions) -> Result<GemHandler> {
        options.apply_defaults();
        protocol.configure_logging(options.logging.clone());

        let inner = Arc::new(GemInner {
            protocol,
            device_type: options.device_type,
            device_id: options.device_id,
            mdln: options.mdln,
            softrev: options.softrev,
            establish_wait: options.establish_communication_wait,
            comm: CommunicationStateMachine::new(),
            control: ControlStateMachine::new(
                options.initial_control_state,
                options.initial_online_mode,
            ),
            enabled: AtomicBool::new(false),
            handshake_in_progress: AtomicBool::new(false),
            events: Events::new(),
            status_vars: RwLock::new(VariableRegistry::new()),
            data_vars: RwLock::new(VariableRegistry::new()),
            constants: RwLock::new(VariableRegistry::new()),
            collection: RwLock::new(CollectionRegistry::new()),
            alarms: RwLock::new(BTreeMap::new()),
            clock: ClockManager::new(),
            programs: ProcessProgramStore::new(),
            remote_command_handler: RwLock::new(None),
            pp_upload_handler: RwLock::new(None),
            pp_request_handler: RwLock::new(None),
            observer_stop: Mutex::new(None),
        });

        inner.register_handlers(&Arc::downgrade(&inner));
        Ok(GemHandler { inner })
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Enable the HSMS engine, start the control model and the
    /// communication observer.
    pub fn enable(&self) {
        let inner = &self.inner;
        if inner.enabled.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("gem enable device_type={}", inner.device_type);

        inner.comm.set_state(CommunicationState::NotCommunicating);
        inner.protocol.enable();

        if inner.device_type == DeviceType::Equipment {
            inner.control.start();
            inner.resolve_attempt_online();
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        *inner.observer_stop.lock() = Some(stop_tx);
        let weak = Arc::downgrade(inner);
        let _ = thread::Builder::new()
            .name("hgem-gem-observer".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(OBSERVER_PERIOD) {
                    Err(RecvTimeoutError::Timeout) => match weak.upgrade() {
                        Some(inner) => inner.observe(),
                        None => return,
                    },
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                }
            });
    }

    /// Stop the observer and timers, drop to NOT-COMMUNICATING and disable
    /// the HSMS engine.
    pub fn disable(&self) {
        let inner = &self.inner;
        if !inner.enabled.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("gem disable device_type={}", inner.device_type);

        inner.observer_stop.lock().take();
        inner.comm.stop_timers();
        inner.comm.set_state(CommunicationState::NotCommunicating);
        inner.protocol.disable();
    }

    // ------------------------------------------------------------------
    // State accessors
    // ------------------------------------------------------------------

    /// This handler's role.
    pub fn device_type(&self) -> DeviceType {
        self.inner.device_type
    }

    /// Configured device id.
    pub fn device_id(&self) -> u16 {
        self.inner.device_id
    }

    /// Current communication state.
    pub fn communication_state(&self) -> CommunicationState {
        self.inner.comm.state()
    }

    /// Current control state.
    pub fn control_state(&self) -> ControlState {
        self.inner.control.state()
    }

    /// ONLINE sub-mode preference.
    pub fn online_mode(&self) -> OnlineMode {
        self.inner.control.online_mode()
    }

    /// Block until COMMUNICATING or the timeout elapses (zero waits
    /// indefinitely).
    pub fn wait_for_communicating(&self, timeout: Duration) -> bool {
        self.inner.comm.wait_for_communicating(timeout)
    }

    /// Event channels.
    pub fn events(&self) -> &Events {
        &self.inner.events
    }

    /// Register a control-state-change callback.
    pub fn on_control_state_change(
        &self,
        callback: impl Fn(&ControlStateChange) + Send + Sync + 'static,
    ) {
        self.inner.control.changed.add_callback(callback);
    }

    /// The underlying HSMS engine.
    pub fn protocol(&self) -> &HsmsProtocol {
        &self.inner.protocol
    }

    // ------------------------------------------------------------------
    // Operator control transitions (equipment side)
    // ------------------------------------------------------------------

    /// Operator request to go online (EQUIPMENT-OFFLINE -> ATTEMPT-ONLINE).
    pub fn switch_control_online(&self) -> Result<()> {
        self.inner.ensure_equipment()?;
        self.inner.control.switch_online()?;
        self.inner.resolve_attempt_online();
        Ok(())
    }

    /// Operator request to go offline.
    pub fn switch_control_offline(&self) -> Result<()> {
        self.inner.ensure_equipment()?;
        self.inner.control.switch_offline()
    }

    /// Switch the ONLINE sub-mode to LOCAL.
    pub fn switch_online_local(&self) -> Result<()> {
        self.inner.ensure_equipment()?;
        self.inner.control.switch_online_local()
    }

    /// Switch the ONLINE sub-mode to REMOTE.
    pub fn switch_online_remote(&self) -> Result<()> {
        self.inner.ensure_equipment()?;
        self.inner.control.switch_online_remote()
    }

    /// Install the equipment-side S2F41 command executor.
    pub fn set_remote_command_handler(&self, handler: RemoteCommandHandler) {
        *self.inner.remote_command_handler.write() = Some(handler);
    }
}

// ============================================================================
// Wiring and handshake
// ============================================================================

/// Adapt a `GemInner` method into an HSMS data-message handler. The weak
/// reference keeps dropped handlers from pinning the GEM state alive.
fn wrap<F>(weak: &Weak<GemInner>, f: F) -> DataMessageHandler
where
    F: Fn(&Arc<GemInner>, &HsmsMessage) -> Result<Option<HsmsMessage>> + Send + Sync + 'static,
{
    let weak = weak.clone();
    Arc::new(move |msg| match weak.upgrade() {
        Some(inner) => f(&inner, msg),
        None => Ok(None),
    })
}

impl GemInner {
    fn register_handlers(&self, weak: &Weak<GemInner>) {
        let p = &self.protocol;

        // Common to both roles.
        p.register_handler(1, 1, wrap(weak, |inner, msg| inner.on_s1f1(msg)));
        p.register_handler(1, 13, wrap(weak, |inner, msg| inner.on_s1f13(msg)));
        p.register_handler(1, 14, wrap(weak, |inner, msg| inner.on_s1f14(msg)));
        p.register_handler(5, 2, wrap(weak, |inner, msg| inner.on_s5f2(msg)));

        match self.device_type {
            DeviceType::Host => {
                p.register_handler(5, 1, wrap(weak, |inner, msg| inner.on_s5f1(msg)));
                p.register_handler(6, 11, wrap(weak, |inner, msg| inner.on_s6f11(msg)));
                for function in [1u8, 3, 5, 7, 9, 11, 13] {
                    p.register_handler(9, function, wrap(weak, |inner, msg| {
                        inner.on_s9(msg);
                        Ok(None)
                    }));
                }
            }
            DeviceType::Equipment => {
                p.register_handler(1, 3, wrap(weak, |inner, msg| inner.on_s1f3(msg)));
                p.register_handler(1, 11, wrap(weak, |inner, msg| inner.on_s1f11(msg)));
                p.register_handler(1, 15, wrap(weak, |inner, msg| inner.on_s1f15(msg)));
                p.register_handler(1, 17, wrap(weak, |inner, msg| inner.on_s1f17(msg)));
                p.register_handler(2, 13, wrap(weak, |inner, msg| inner.on_s2f13(msg)));
                p.register_handler(2, 15, wrap(weak, |inner, msg| inner.on_s2f15(msg)));
                p.register_handler(2, 17, wrap(weak, |inner, msg| inner.on_s2f17(msg)));
                p.register_handler(2, 29, wrap(weak, |inner, msg| inner.on_s2f29(msg)));
                p.register_handler(2, 31, wrap(weak, |inner, msg| inner.on_s2f31(msg)));
                p.register_handler(2, 33, wrap(weak, |inner, msg| inner.on_s2f33(msg)));
                p.register_handler(2, 35, wrap(weak, |inner, msg| inner.on_s2f35(msg)));
                p.register_handler(2, 37, wrap(weak, |inner, msg| inner.on_s2f37(msg)));
                p.register_handler(2, 41, wrap(weak, |inner, msg| inner.on_s2f41(msg)));
                p.register_handler(5, 3, wrap(weak, |inner, msg| inner.on_s5f3(msg)));
                p.register_handler(5, 5, wrap(weak, |inner, msg| inner.on_s5f5(msg)));
                p.register_handler(5, 7, wrap(weak, |inner, msg| inner.on_s5f7(msg)));
                p.register_handler(6, 15, wrap(weak, |inner, msg| inner.on_s6f15(msg)));
                p.register_handler(7, 3, wrap(weak, |inner, msg| inner.on_s7f3(msg)));
                p.register_handler(7, 5, wrap(weak, |inner, msg| inner.on_s7f5(msg)));
            }
        }
    }

    pub(crate) fn ensure_communicating(&self) -> Result<()> {
        if self.comm.state() != CommunicationState::Communicating {
            return Err(Error::NotCommunicating);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Observer
    // ------------------------------------------------------------------

    fn observe(self: &Arc<Self>) {
        if !self.enabled.load(Ordering::SeqCst) {
            return;
        }

        if !self.protocol.connected() {
            self.handshake_in_progress.store(false, Ordering::SeqCst);
            self.comm.set_state(CommunicationState::NotCommunicating);
            return;
        }

        if self.device_type == DeviceType::Host
            && self.protocol.current_state() == ConnectionState::ConnectedSelected
            && self.comm.state() != CommunicationState::Communicating
            && !self.handshake_in_progress.load(Ordering::SeqCst)
        {
            self.initiate_handshake();
        }
    }

    // ------------------------------------------------------------------
    // Establish-communication handshake
    // ------------------------------------------------------------------

    fn initiate_handshake(self: &Arc<Self>) {
        if !self.enabled.load(Ordering::SeqCst) {
            return;
        }
        if self.handshake_in_progress.swap(true, Ordering::SeqCst) {
            return;
        }

        let inner = Arc::clone(self);
        let _ = thread::Builder::new()
            .name("hgem-gem-handshake".into())
            .spawn(move || {
                let wait_cra = inner.protocol.timeouts().t3;
                let weak = Arc::downgrade(&inner);
                inner.comm.set_wait_cra(wait_cra, move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_wait_cra_timeout();
                    }
                });

                let result = inner.protocol.send_and_wait(messages::s1f13());
                inner.handshake_in_progress.store(false, Ordering::SeqCst);

                match result.and_then(|reply| messages::ack_byte(&reply)) {
                    Ok(COMMACK_ACCEPTED) => inner.set_communicating(),
                    Ok(commack) => {
                        warn!("establish communication denied commack={}", commack);
                        inner.schedule_retry();
                    }
                    Err(e) => {
                        warn!("establish communication request failed err={}", e);
                        inner.schedule_retry();
                    }
                }
            });
    }

    fn on_wait_cra_timeout(self: &Arc<Self>) {
        if !self.enabled.load(Ordering::SeqCst) {
            return;
        }
        if self.comm.state() != CommunicationState::WaitCra {
            return;
        }
        warn!("WAIT-CRA timed out");
        self.schedule_retry();
    }

    fn schedule_retry(self: &Arc<Self>) {
        if !self.enabled.load(Ordering::SeqCst) {
            return;
        }
        let weak = Arc::downgrade(self);
        self.comm.set_wait_delay(self.establish_wait, move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_wait_delay_timeout();
            }
        });
    }

    fn on_wait_delay_timeout(self: &Arc<Self>) {
        if !self.enabled.load(Ordering::SeqCst) {
            return;
        }
        if self.comm.state() != CommunicationState::WaitDelay {
            return;
        }

        if self.device_type == DeviceType::Host
            && self.protocol.connected()
            && self.protocol.current_state() == ConnectionState::ConnectedSelected
        {
            self.initiate_handshake();
            return;
        }
        self.comm.set_state(CommunicationState::NotCommunicating);
    }

    pub(crate) fn set_communicating(&self) {
        let previous = self.comm.set_state(CommunicationState::Communicating);
        if previous == CommunicationState::Communicating {
            return;
        }
        info!("communication established previous={}", previous);
        self.events.handler_communicating.fire(&());

        // A pending online attempt succeeds once communication is up.
        if self.device_type == DeviceType::Equipment
            && self.control.state() == ControlState::AttemptOnline
        {
            let _ = self.control.attempt_online_success();
        }
    }

    /// Resolve a pending ATTEMPT-ONLINE: success when communication is
    /// already (or shortly) established, HOST-OFFLINE otherwise.
    pub(crate) fn resolve_attempt_online(self: &Arc<Self>) {
        if self.control.state() != ControlState::AttemptOnline {
            return;
        }
        let inner = Arc::clone(self);
        let _ = thread::Builder::new()
            .name("hgem-gem-online".into())
            .spawn(move || {
                if inner.control.state() != ControlState::AttemptOnline {
                    return;
                }
                if inner.comm.wait_for_communicating(Duration::from_millis(100)) {
                    let _ = inner.control.attempt_online_success();
                } else {
                    debug!("attempt online without communication -> HOST-OFFLINE");
                    let _ = inner.control.attempt_online_fail_host_offline();
                }
            });
    }

    // ------------------------------------------------------------------
    // Common handlers
    // ------------------------------------------------------------------

    /// S1F1 Are You There.
    fn on_s1f1(&self, _msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        let reply = match self.device_type {
            DeviceType::Host => messages::s1f2_host(),
            DeviceType::Equipment => messages::s1f2_equipment(&self.mdln, &self.softrev),
        };
        Ok(Some(reply))
    }

    /// S1F13 Establish Communication Request from the peer.
    fn on_s1f13(&self, _msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        self.set_communicating();
        let identity = match self.device_type {
            DeviceType::Equipment => Some((self.mdln.as_str(), self.softrev.as_str())),
            DeviceType::Host => None,
        };
        Ok(Some(messages::s1f14(COMMACK_ACCEPTED, identity)))
    }

    /// Unsolicited S1F14 (the solicited one is consumed by the handshake
    /// transaction).
    fn on_s1f14(self: &Arc<Self>, msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        match messages::ack_byte(msg) {
            Ok(COMMACK_ACCEPTED) => self.set_communicating(),
            Ok(commack) => {
                warn!("received S1F14 commack={}", commack);
                self.schedule_retry();
            }
            Err(e) => warn!("failed to parse S1F14 err={}", e),
        }
        Ok(None)
    }

    /// Any Stream 9 error report.
    fn on_s9(&self, msg: &HsmsMessage) {
        warn!(
            "stream 9 error received {} system={:08X}",
            msg.sf_code(),
            msg.header.system_bytes
        );
        self.events.s9_error_received.fire(&S9Error {
            function: msg.function(),
            system_bytes: msg.header.system_bytes,
            body: msg.body.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equipment() -> GemHandler {
        GemHandler::new(
            HsmsConfig::passive("127.0.0.1", 0, 0x0100),
            GemOptions::equipment(0x0100),
        )
        .expect("handler")
    }

    fn host() -> GemHandler {
        GemHandler::new(
            HsmsConfig::active("127.0.0.1", 1, 0x0100),
            GemOptions::host(0x0100),
        )
        .expect("handler")
    }

    #[test]
    fn roles_reject_foreign_operations() {
        let host = host();
        assert!(matches!(
            host.switch_control_online(),
            Err(Error::OperationNotSupported)
        ));

        let equipment = equipment();
        assert!(matches!(
            equipment.request_status_variables(&[1u32.into()]),
            Err(Error::OperationNotSupported)
        ));
    }

    #[test]
    fn s1f13_reply_carries_equipment_identity() {
        let equipment = equipment();
        let reply = equipment
            .inner
            .on_s1f13(&messages::s1f13())
            .unwrap()
            .unwrap();
        assert_eq!(reply.sf_code(), "S1F14");
        assert_eq!(messages::ack_byte(&reply).unwrap(), 0);

        let body = reply.body.as_ref().unwrap();
        let identity = body.get(1).unwrap().as_list().unwrap();
        assert_eq!(identity[0].as_ascii(), Some("hgem"));

        // Answering S1F13 is itself a communication establishment.
        assert_eq!(
            equipment.communication_state(),
            CommunicationState::Communicating
        );
    }

    #[test]
    fn s1f15_s1f17_drive_the_control_model() {
        let equipment = equipment();
        equipment.inner.control.start();
        equipment.inner.control.attempt_online_success().unwrap();
        assert_eq!(equipment.control_state(), ControlState::OnlineRemote);

        // Request OFF-LINE.
        let reply = equipment.inner.on_s1f15(&messages::s1f15()).unwrap().unwrap();
        assert_eq!(messages::ack_byte(&reply).unwrap(), 0);
        assert_eq!(equipment.control_state(), ControlState::HostOffline);

        // Replaying yields OFLACK=2.
        let reply = equipment.inner.on_s1f15(&messages::s1f15()).unwrap().unwrap();
        assert_eq!(messages::ack_byte(&reply).unwrap(), 2);

        // Request ON-LINE.
        let reply = equipment.inner.on_s1f17(&messages::s1f17()).unwrap().unwrap();
        assert_eq!(messages::ack_byte(&reply).unwrap(), 0);
        assert_eq!(equipment.control_state(), ControlState::OnlineRemote);

        // Replaying yields ONLACK=2 and leaves the state alone.
        let reply = equipment.inner.on_s1f17(&messages::s1f17()).unwrap().unwrap();
        assert_eq!(messages::ack_byte(&reply).unwrap(), 2);
        assert_eq!(equipment.control_state(), ControlState::OnlineRemote);
    }

    #[test]
    fn host_operations_require_communicating() {
        let host = host();
        assert!(matches!(
            host.request_status_variables(&[1101u32.into()]),
            Err(Error::NotCommunicating)
        ));
    }

    #[test]
    fn s9_reception_fires_the_event_channel() {
        use std::sync::atomic::AtomicU32;
        let host = host();
        let seen = Arc::new(AtomicU32::new(0));
        let sink = seen.clone();
        host.events().s9_error_received.add_callback(move |error| {
            assert_eq!(error.function, 9);
            sink.fetch_add(1, Ordering::SeqCst);
        });

        let mut msg = crate::hsms::s9::transaction_timeout(&HsmsMessage::data(1, 1, None).header);
        msg.header.system_bytes = 5;
        host.inner.on_s9(&msg);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
