// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SEMI E30 control state model (equipment side).
//!
//! # State Machine
//!
//! ```text
//!              INIT
//!               | start (configured initial)
//!               v
//!   +--------------------+   switch_online    +----------------+
//!   | EQUIPMENT-OFFLINE  |------------------->| ATTEMPT-ONLINE |
//!   +--------------------+                    +-------+--------+
//!        ^    ^      fail_equipment_offline           |
//!        |    +---------------------------------------+
//!        |                  fail_host_offline         | success
//!        | switch_offline       |                     v
//!   +----+---------------+      v            +-----------------+
//!   | ONLINE LOCAL/REMOTE|<---------------- -| (enter ONLINE)  |
//!   +----+---------------+  remote_online    +-----------------+
//!        | remote_offline       ^
//!        v                      |
//!   +--------------+           |
//!   | HOST-OFFLINE |-----------+
//!   +--------------+
//! ```
//!
//! The host drives `remote_offline`/`remote_online` over the wire through
//! S1F15 (Request OFF-LINE, OFLACK) and S1F17 (Request ON-LINE, ONLACK).

use super::callback::Event;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::fmt;

/// Control model states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// Before `start`.
    Init,
    /// Operator keeps the equipment offline.
    EquipmentOffline,
    /// Trying to go online (needs an established communication link).
    AttemptOnline,
    /// The host sent the equipment offline.
    HostOffline,
    /// Online, operator console has control.
    OnlineLocal,
    /// Online, host has control.
    OnlineRemote,
}

impl ControlState {
    /// Canonical state name.
    pub fn as_str(self) -> &'static str {
        match self {
            ControlState::Init => "INIT",
            ControlState::EquipmentOffline => "EQUIPMENT-OFFLINE",
            ControlState::AttemptOnline => "ATTEMPT-ONLINE",
            ControlState::HostOffline => "HOST-OFFLINE",
            ControlState::OnlineLocal => "ONLINE-LOCAL",
            ControlState::OnlineRemote => "ONLINE-REMOTE",
        }
    }

    /// True in either ONLINE sub-state.
    pub fn is_online(self) -> bool {
        matches!(self, ControlState::OnlineLocal | ControlState::OnlineRemote)
    }
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ONLINE sub-mode preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnlineMode {
    Local,
    Remote,
}

impl OnlineMode {
    fn online_state(self) -> ControlState {
        match self {
            OnlineMode::Local => ControlState::OnlineLocal,
            OnlineMode::Remote => ControlState::OnlineRemote,
        }
    }
}

/// Payload of the `ControlStateChanged` event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlStateChange {
    pub previous: ControlState,
    pub next: ControlState,
}

/// The control state machine. Transitions are serialized; observers are
/// notified through [`ControlStateMachine::changed`] after the lock is
/// released.
pub struct ControlStateMachine {
    state: Mutex<Inner>,
    initial: ControlState,
    /// Fired with `(previous, next)` after every state change.
    pub changed: Event<ControlStateChange>,
}

struct Inner {
    state: ControlState,
    mode: OnlineMode,
}

impl ControlStateMachine {
    /// Build a machine in INIT with the configured target initial state
    /// and online mode.
    pub fn new(initial: ControlState, mode: OnlineMode) -> ControlStateMachine {
        let initial = if initial == ControlState::Init {
            ControlState::AttemptOnline
        } else {
            initial
        };
        ControlStateMachine {
            state: Mutex::new(Inner {
                state: ControlState::Init,
                mode,
            }),
            initial,
            changed: Event::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> ControlState {
        self.state.lock().state
    }

    /// ONLINE sub-mode preference.
    pub fn online_mode(&self) -> OnlineMode {
        self.state.lock().mode
    }

    fn fire(&self, previous: ControlState, next: ControlState) {
        if previous != next {
            self.changed.fire(&ControlStateChange { previous, next });
        }
    }

    /// Perform the initial transition out of INIT. No-op once started.
    pub fn start(&self) {
        let change = {
            let mut inner = self.state.lock();
            if inner.state != ControlState::Init {
                return;
            }
            let next = match self.initial {
                ControlState::OnlineLocal | ControlState::OnlineRemote => {
                    inner.mode.online_state()
                }
                other => other,
            };
            inner.state = next;
            (ControlState::Init, next)
        };
        self.fire(change.0, change.1);
    }

    fn transition(
        &self,
        action: &'static str,
        allowed: impl Fn(ControlState) -> bool,
        next: impl Fn(&mut Inner) -> ControlState,
    ) -> Result<()> {
        let change = {
            let mut inner = self.state.lock();
            if !allowed(inner.state) {
                return Err(Error::InvalidControlTransition {
                    action,
                    state: inner.state.as_str(),
                });
            }
            let previous = inner.state;
            let target = next(&mut inner);
            inner.state = target;
            (previous, target)
        };
        self.fire(change.0, change.1);
        Ok(())
    }

    /// Operator: EQUIPMENT-OFFLINE -> ATTEMPT-ONLINE.
    pub fn switch_online(&self) -> Result<()> {
        if self.state() == ControlState::AttemptOnline {
            return Ok(());
        }
        self.transition(
            "switch_online",
            |s| s == ControlState::EquipmentOffline,
            |_| ControlState::AttemptOnline,
        )
    }

    /// Operator: ONLINE-* -> EQUIPMENT-OFFLINE.
    pub fn switch_offline(&self) -> Result<()> {
        self.transition(
            "switch_offline",
            |s| s.is_online(),
            |_| ControlState::EquipmentOffline,
        )
    }

    /// Operator: ONLINE-REMOTE -> ONLINE-LOCAL.
    pub fn switch_online_local(&self) -> Result<()> {
        if self.state() == ControlState::OnlineLocal {
            return Ok(());
        }
        self.transition(
            "switch_online_local",
            |s| s == ControlState::OnlineRemote,
            |inner| {
                inner.mode = OnlineMode::Local;
                ControlState::OnlineLocal
            },
        )
    }

    /// Operator: ONLINE-LOCAL -> ONLINE-REMOTE.
    pub fn switch_online_remote(&self) -> Result<()> {
        if self.state() == ControlState::OnlineRemote {
            return Ok(());
        }
        self.transition(
            "switch_online_remote",
            |s| s == ControlState::OnlineLocal,
            |inner| {
                inner.mode = OnlineMode::Remote;
                ControlState::OnlineRemote
            },
        )
    }

    /// ATTEMPT-ONLINE -> ONLINE-(mode).
    pub fn attempt_online_success(&self) -> Result<()> {
        if self.state().is_online() {
            return Ok(());
        }
        self.transition(
            "attempt_online_success",
            |s| s == ControlState::AttemptOnline,
            |inner| inner.mode.online_state(),
        )
    }

    /// ATTEMPT-ONLINE -> EQUIPMENT-OFFLINE.
    pub fn attempt_online_fail_equipment_offline(&self) -> Result<()> {
        if self.state() == ControlState::EquipmentOffline {
            return Ok(());
        }
        self.transition(
            "attempt_online_fail_equipment_offline",
            |s| s == ControlState::AttemptOnline,
            |_| ControlState::EquipmentOffline,
        )
    }

    /// ATTEMPT-ONLINE -> HOST-OFFLINE.
    pub fn attempt_online_fail_host_offline(&self) -> Result<()> {
        if self.state() == ControlState::HostOffline {
            return Ok(());
        }
        self.transition(
            "attempt_online_fail_host_offline",
            |s| s == ControlState::AttemptOnline,
            |_| ControlState::HostOffline,
        )
    }

    /// Host request: ONLINE-* -> HOST-OFFLINE.
    pub fn remote_offline(&self) -> Result<()> {
        self.transition(
            "remote_offline",
            |s| s.is_online(),
            |_| ControlState::HostOffline,
        )
    }

    /// Host request: HOST-OFFLINE -> ONLINE-(mode).
    pub fn remote_online(&self) -> Result<()> {
        self.transition(
            "remote_online",
            |s| s == ControlState::HostOffline,
            |inner| inner.mode.online_state(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn start_enters_configured_initial_state() {
        let sm = ControlStateMachine::new(ControlState::AttemptOnline, OnlineMode::Remote);
        assert_eq!(sm.state(), ControlState::Init);
        sm.start();
        assert_eq!(sm.state(), ControlState::AttemptOnline);

        // A second start is inert.
        sm.start();
        assert_eq!(sm.state(), ControlState::AttemptOnline);
    }

    #[test]
    fn start_fires_change_event() {
        let sm = ControlStateMachine::new(ControlState::EquipmentOffline, OnlineMode::Remote);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        sm.changed.add_callback(move |change| {
            assert_eq!(change.previous, ControlState::Init);
            assert_eq!(change.next, ControlState::EquipmentOffline);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        sm.start();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn online_round_trip() {
        let sm = ControlStateMachine::new(ControlState::EquipmentOffline, OnlineMode::Remote);
        sm.start();

        sm.switch_online().unwrap();
        sm.attempt_online_success().unwrap();
        assert_eq!(sm.state(), ControlState::OnlineRemote);

        sm.switch_online_local().unwrap();
        assert_eq!(sm.state(), ControlState::OnlineLocal);
        sm.switch_online_remote().unwrap();
        assert_eq!(sm.state(), ControlState::OnlineRemote);

        sm.remote_offline().unwrap();
        assert_eq!(sm.state(), ControlState::HostOffline);
        sm.remote_online().unwrap();
        assert_eq!(sm.state(), ControlState::OnlineRemote);

        sm.switch_offline().unwrap();
        assert_eq!(sm.state(), ControlState::EquipmentOffline);
    }

    #[test]
    fn invalid_transitions_leave_state_unchanged() {
        let sm = ControlStateMachine::new(ControlState::EquipmentOffline, OnlineMode::Remote);
        sm.start();

        assert!(sm.remote_online().is_err());
        assert!(sm.switch_offline().is_err());
        assert_eq!(sm.state(), ControlState::EquipmentOffline);
    }

    #[test]
    fn attempt_failures() {
        let sm = ControlStateMachine::new(ControlState::EquipmentOffline, OnlineMode::Local);
        sm.start();
        sm.switch_online().unwrap();
        sm.attempt_online_fail_host_offline().unwrap();
        assert_eq!(sm.state(), ControlState::HostOffline);

        sm.remote_online().unwrap();
        assert_eq!(sm.state(), ControlState::OnlineLocal);
    }
}
