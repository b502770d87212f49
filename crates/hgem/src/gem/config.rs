// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! GEM handler configuration.

use super::control::{ControlState, OnlineMode};
use crate::hsms::WireLogConfig;
use std::fmt;
use std::time::Duration;

/// Which side of the link this handler models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    /// Factory host: initiates the communication handshake and the
    /// request API.
    Host,
    /// Production equipment: owns the registries and answers the canonical
    /// message set.
    Equipment,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Host => write!(f, "Host"),
            DeviceType::Equipment => write!(f, "Equipment"),
        }
    }
}

/// Configurable parameters for a [`GemHandler`](super::GemHandler).
#[derive(Debug, Clone)]
pub struct GemOptions {
    pub device_type: DeviceType,
    pub device_id: u16,

    /// Equipment model name reported in S1F2/S1F14.
    pub mdln: String,

    /// Software revision reported in S1F2/S1F14.
    pub softrev: String,

    /// Delay between establish-communication retries (WAIT-DELAY).
    pub establish_communication_wait: Duration,

    /// Control state entered from INIT on `enable` (equipment side).
    pub initial_control_state: ControlState,

    /// ONLINE sub-mode used when the control model goes online.
    pub initial_online_mode: OnlineMode,

    /// Wire-level message logging for the underlying HSMS engine.
    pub logging: WireLogConfig,
}

impl GemOptions {
    /// Defaults for a host-side handler.
    pub fn host(device_id: u16) -> GemOptions {
        GemOptions {
            device_type: DeviceType::Host,
            device_id,
            mdln: String::new(),
            softrev: String::new(),
            establish_communication_wait: Duration::from_secs(10),
            initial_control_state: ControlState::AttemptOnline,
            initial_online_mode: OnlineMode::Remote,
            logging: WireLogConfig::default(),
        }
    }

    /// Defaults for an equipment-side handler.
    pub fn equipment(device_id: u16) -> GemOptions {
        GemOptions {
            device_type: DeviceType::Equipment,
            ..GemOptions::host(device_id)
        }
    }

    pub(crate) fn apply_defaults(&mut self) {
        if self.mdln.is_empty() {
            self.mdln = match self.device_type {
                DeviceType::Equipment => "hgem".into(),
                DeviceType::Host => "host".into(),
            };
        }
        if self.softrev.is_empty() {
            self.softrev = env!("CARGO_PKG_VERSION").into();
        }
        if self.establish_communication_wait.is_zero() {
            self.establish_communication_wait = Duration::from_secs(10);
        }
        if self.initial_control_state == ControlState::Init {
            self.initial_control_state = ControlState::AttemptOnline;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_identity_fields() {
        let mut options = GemOptions::equipment(0x0100);
        options.apply_defaults();
        assert_eq!(options.mdln, "hgem");
        assert!(!options.softrev.is_empty());
        assert_eq!(options.establish_communication_wait.as_secs(), 10);
        assert_eq!(options.initial_control_state, ControlState::AttemptOnline);
    }

    #[test]
    fn init_is_not_a_valid_initial_state() {
        let mut options = GemOptions::equipment(1);
        options.initial_control_state = ControlState::Init;
        options.apply_defaults();
        assert_eq!(options.initial_control_state, ControlState::AttemptOnline);
    }
}
