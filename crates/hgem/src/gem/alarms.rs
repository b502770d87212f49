// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Alarm subservice (Stream 5).
//!
//! Equipment keeps an alarm registry `{id, text, set, enabled}`. Raising or
//! clearing an alarm sends S5F1 (fire-and-forget) for enabled alarms; the
//! host can toggle reporting through S5F3 and fetch the registry through
//! S5F5/S5F7.

use super::handler::GemInner;
use super::messages;
use crate::error::Result;
use crate::hsms::HsmsMessage;
use crate::{debug, warn};

// S5F4 ACKC5 codes.
pub(crate) const ACKC5_ACCEPTED: u8 = 0;
pub(crate) const ACKC5_ERROR: u8 = 1;

/// An equipment alarm definition.
#[derive(Debug, Clone)]
pub struct Alarm {
    pub id: u64,
    pub text: String,
    /// Current alarm condition.
    pub set: bool,
    /// Disabled alarms keep state but are not reported via S5F1.
    pub enabled: bool,
}

impl Alarm {
    pub fn new(id: u64, text: impl Into<String>) -> Alarm {
        Alarm {
            id,
            text: text.into(),
            set: false,
            enabled: true,
        }
    }
}

/// An alarm notification received from the peer (S5F1).
#[derive(Debug, Clone)]
pub struct AlarmEvent {
    pub id: u64,
    pub text: String,
    pub set: bool,
}

/// One entry of an S5F6/S5F8 alarm list.
#[derive(Debug, Clone)]
pub struct AlarmInfo {
    pub id: u64,
    pub text: String,
    pub set: bool,
    pub enabled: bool,
}

impl GemInner {
    /// Host side: inbound S5F1 alarm report.
    pub(crate) fn on_s5f1(&self, msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        match messages::parse_alarm_event(msg) {
            Ok(event) => self.events.alarm_received.fire(&event),
            Err(e) => warn!("failed to parse S5F1 err={}", e),
        }
        Ok(Some(messages::s5f2(ACKC5_ACCEPTED)))
    }

    /// Either side: S5F2 alarm acknowledge, possibly unsolicited. Logged
    /// and surfaced; the ack code is not interpreted further.
    pub(crate) fn on_s5f2(&self, msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        match messages::ack_byte(msg) {
            Ok(ack) => {
                if ack != 0 {
                    warn!("alarm acknowledge returned code={}", ack);
                } else {
                    debug!("alarm acknowledge received");
                }
                self.events.alarm_ack_received.fire(&ack);
            }
            Err(e) => warn!("failed to parse S5F2 err={}", e),
        }
        Ok(None)
    }

    /// Equipment side: S5F3 Enable/Disable Alarm Send.
    pub(crate) fn on_s5f3(&self, msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        let body = match &msg.body {
            Some(body) => body,
            None => return Ok(Some(messages::s5f4(ACKC5_ERROR))),
        };

        let Some(aled) = body.get(0).and_then(|item| item.first_byte()) else {
            return Ok(Some(messages::s5f4(ACKC5_ERROR)));
        };
        let enable = aled == 128;

        let Some(alid_items) = body.get(1).and_then(|item| item.as_list()) else {
            return Ok(Some(messages::s5f4(ACKC5_ERROR)));
        };

        let mut ids = Vec::with_capacity(alid_items.len());
        for item in alid_items {
            match item.first_uint() {
                Some(id) => ids.push(id),
                None => return Ok(Some(messages::s5f4(ACKC5_ERROR))),
            }
        }

        let mut alarms = self.alarms.write();
        if ids.iter().any(|id| !alarms.contains_key(id)) {
            return Ok(Some(messages::s5f4(ACKC5_ERROR)));
        }
        for id in ids {
            if let Some(alarm) = alarms.get_mut(&id) {
                alarm.enabled = enable;
            }
        }

        Ok(Some(messages::s5f4(ACKC5_ACCEPTED)))
    }

    /// Equipment side: S5F5 List Alarms Request.
    pub(crate) fn on_s5f5(&self, _msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        let alarms = self.alarm_list(|_| true);
        Ok(Some(messages::s5f6(&alarms)))
    }

    /// Equipment side: S5F7 List Enabled Alarms Request.
    pub(crate) fn on_s5f7(&self, _msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        let alarms = self.alarm_list(|alarm| alarm.enabled);
        Ok(Some(messages::s5f8(&alarms)))
    }

    pub(crate) fn alarm_list(&self, keep: impl Fn(&Alarm) -> bool) -> Vec<AlarmInfo> {
        self.alarms
            .read()
            .values()
            .filter(|alarm| keep(alarm))
            .map(|alarm| AlarmInfo {
                id: alarm.id,
                text: alarm.text.clone(),
                set: alarm.set,
                enabled: alarm.enabled,
            })
            .collect()
    }

    fn send_alarm(&self, id: u64, set: bool) -> Result<()> {
        self.ensure_equipment()?;
        self.ensure_communicating()?;

        let (alarm, report) = {
            let mut alarms = self.alarms.write();
            let alarm = alarms.get_mut(&id).ok_or_else(|| {
                crate::error::Error::InvalidArgument(format!("unknown alarm {}", id))
            })?;
            alarm.set = set;
            (alarm.clone(), alarm.enabled)
        };

        if !report {
            debug!("alarm {} is disabled; state change not reported", id);
            return Ok(());
        }
        self.protocol.send_data_message(messages::s5f1(&alarm, set))
    }
}

// ============================================================================
// Equipment alarm API
// ============================================================================

impl super::handler::GemHandler {
    /// Register an alarm definition (equipment only). Alarms report via
    /// S5F1 until the host disables them through S5F3.
    pub fn register_alarm(&self, id: u64, text: impl Into<String>) -> Result<()> {
        self.inner.ensure_equipment()?;
        let mut alarms = self.inner.alarms.write();
        if alarms.contains_key(&id) {
            return Err(crate::error::Error::InvalidArgument(format!(
                "alarm {} already registered",
                id
            )));
        }
        alarms.insert(id, Alarm::new(id, text));
        Ok(())
    }

    /// Raise an alarm: records the set condition and notifies the host
    /// via S5F1 when the alarm is enabled (fire-and-forget).
    pub fn raise_alarm(&self, id: u64) -> Result<()> {
        self.inner.send_alarm(id, true)
    }

    /// Clear a previously raised alarm.
    pub fn clear_alarm(&self, id: u64) -> Result<()> {
        self.inner.send_alarm(id, false)
    }

    /// Enable reporting for one alarm (equipment-local toggle).
    pub fn enable_alarm(&self, id: u64) -> Result<()> {
        self.set_alarm_enabled(id, true)
    }

    /// Disable reporting for one alarm (equipment-local toggle).
    pub fn disable_alarm(&self, id: u64) -> Result<()> {
        self.set_alarm_enabled(id, false)
    }

    fn set_alarm_enabled(&self, id: u64, enabled: bool) -> Result<()> {
        self.inner.ensure_equipment()?;
        let mut alarms = self.inner.alarms.write();
        match alarms.get_mut(&id) {
            Some(alarm) => {
                alarm.enabled = enabled;
                Ok(())
            }
            None => Err(crate::error::Error::InvalidArgument(format!(
                "unknown alarm {}",
                id
            ))),
        }
    }

    /// Snapshot of the alarm registry (equipment only).
    pub fn alarms(&self) -> Result<Vec<AlarmInfo>> {
        self.inner.ensure_equipment()?;
        Ok(self.inner.alarm_list(|_| true))
    }
}
