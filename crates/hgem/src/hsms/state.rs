// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HSMS connection state machine.
//!
//! # State Machine
//!
//! ```text
//!        +----------------+
//!        | NOT-CONNECTED  |<--------------------+
//!        +-------+--------+                     |
//!                | connect            disconnect|/ timeoutT7
//!                v                              |
//!        +----------------+                     |
//!   +--->| CONNECTED-     |---------------------+
//!   |    | NOT-SELECTED   |
//!   |    +-------+--------+
//!   |            | select
//!   | deselect   v
//!   |    +----------------+       disconnect
//!   +----| CONNECTED-     |------------------> NOT-CONNECTED
//!        | SELECTED       |
//!        +----------------+
//! ```
//!
//! Side effects (timers, linktest, reconnect scheduling) live in the engine;
//! the machine only validates and records transitions.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::fmt;

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No TCP session.
    NotConnected,
    /// TCP session up, Select handshake pending (T7 running).
    ConnectedNotSelected,
    /// Select handshake completed; data traffic allowed.
    ConnectedSelected,
}

impl ConnectionState {
    /// Canonical state name.
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::NotConnected => "NOT-CONNECTED",
            ConnectionState::ConnectedNotSelected => "CONNECTED-NOT-SELECTED",
            ConnectionState::ConnectedSelected => "CONNECTED-SELECTED",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialized transition guard for the connection lifecycle.
pub struct ConnectionStateMachine {
    state: Mutex<ConnectionState>,
}

impl ConnectionStateMachine {
    pub fn new() -> ConnectionStateMachine {
        ConnectionStateMachine {
            state: Mutex::new(ConnectionState::NotConnected),
        }
    }

    /// Current state.
    pub fn current(&self) -> ConnectionState {
        *self.state.lock()
    }

    fn transition(
        &self,
        action: &'static str,
        from: &[ConnectionState],
        to: ConnectionState,
    ) -> Result<ConnectionState> {
        let mut state = self.state.lock();
        if !from.contains(&state) {
            return Err(Error::InvalidControlTransition {
                action,
                state: state.as_str(),
            });
        }
        let previous = *state;
        *state = to;
        Ok(previous)
    }

    /// TCP session established.
    pub fn connect(&self) -> Result<ConnectionState> {
        self.transition(
            "connect",
            &[ConnectionState::NotConnected],
            ConnectionState::ConnectedNotSelected,
        )
    }

    /// Select handshake completed.
    pub fn select(&self) -> Result<ConnectionState> {
        self.transition(
            "select",
            &[ConnectionState::ConnectedNotSelected],
            ConnectionState::ConnectedSelected,
        )
    }

    /// Deselect handshake completed.
    pub fn deselect(&self) -> Result<ConnectionState> {
        self.transition(
            "deselect",
            &[ConnectionState::ConnectedSelected],
            ConnectionState::ConnectedNotSelected,
        )
    }

    /// TCP session lost or torn down.
    pub fn disconnect(&self) -> Result<ConnectionState> {
        self.transition(
            "disconnect",
            &[
                ConnectionState::ConnectedNotSelected,
                ConnectionState::ConnectedSelected,
            ],
            ConnectionState::NotConnected,
        )
    }

    /// T7 expired while waiting for selection.
    pub fn timeout_t7(&self) -> Result<ConnectionState> {
        self.transition(
            "timeoutT7",
            &[ConnectionState::ConnectedNotSelected],
            ConnectionState::NotConnected,
        )
    }
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
