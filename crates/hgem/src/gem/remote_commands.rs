// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Remote command subservice: S2F41 Host Command Send / S2F42 acknowledge.

use super::handler::GemInner;
use super::id::VariableId;
use super::messages;
use crate::error::Result;
use crate::hsms::HsmsMessage;
use crate::secs2::Item;
use crate::warn;
use std::sync::Arc;

/// S2F42 HCACK codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hcack {
    Acknowledge,
    InvalidCommand,
    CannotPerformNow,
    ParameterInvalid,
    AcknowledgeLater,
    AlreadyInCondition,
    NoObject,
}

impl Hcack {
    /// Wire encoding.
    pub fn code(self) -> u8 {
        match self {
            Hcack::Acknowledge => 0,
            Hcack::InvalidCommand => 1,
            Hcack::CannotPerformNow => 2,
            Hcack::ParameterInvalid => 3,
            Hcack::AcknowledgeLater => 4,
            Hcack::AlreadyInCondition => 5,
            Hcack::NoObject => 6,
        }
    }

    /// Decode a received code; anything out of range reads as
    /// `InvalidCommand`.
    pub fn from_byte(code: u8) -> Hcack {
        match code {
            0 => Hcack::Acknowledge,
            1 => Hcack::InvalidCommand,
            2 => Hcack::CannotPerformNow,
            3 => Hcack::ParameterInvalid,
            4 => Hcack::AcknowledgeLater,
            5 => Hcack::AlreadyInCondition,
            6 => Hcack::NoObject,
            _ => Hcack::InvalidCommand,
        }
    }
}

// S2F42 per-parameter CPACK codes.
pub const CPACK_PARAMETER_UNKNOWN: u8 = 1;
pub const CPACK_VALUE_ILLEGAL: u8 = 2;
pub const CPACK_FORMAT_ILLEGAL: u8 = 3;

/// One CPNAME/CPVAL pair of an S2F41 request.
#[derive(Debug, Clone)]
pub struct RemoteCommandParameter {
    pub name: VariableId,
    pub value: Item,
}

/// A decoded S2F41 request.
#[derive(Debug, Clone)]
pub struct RemoteCommandRequest {
    /// RCMD rendered as text (commands are usually ASCII).
    pub command: String,
    /// RCMD as received.
    pub command_id: VariableId,
    pub parameters: Vec<RemoteCommandParameter>,
}

/// One per-parameter acknowledge of an S2F42 reply.
#[derive(Debug, Clone)]
pub struct RemoteCommandParameterAck {
    pub name: VariableId,
    pub cpack: u8,
}

/// The outcome of a remote command.
#[derive(Debug, Clone)]
pub struct RemoteCommandResult {
    pub hcack: Hcack,
    pub parameter_acks: Vec<RemoteCommandParameterAck>,
}

impl RemoteCommandResult {
    /// A plain acknowledge without parameter detail.
    pub fn ok() -> RemoteCommandResult {
        RemoteCommandResult {
            hcack: Hcack::Acknowledge,
            parameter_acks: Vec::new(),
        }
    }

    /// A failure with the given HCACK and no parameter detail.
    pub fn failed(hcack: Hcack) -> RemoteCommandResult {
        RemoteCommandResult {
            hcack,
            parameter_acks: Vec::new(),
        }
    }
}

/// Equipment-side callback executing a host command.
pub type RemoteCommandHandler =
    Arc<dyn Fn(&RemoteCommandRequest) -> RemoteCommandResult + Send + Sync>;

impl GemInner {
    /// Equipment side: S2F41 Host Command Send.
    pub(crate) fn on_s2f41(&self, msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        let request = match messages::parse_remote_command(msg) {
            Ok(request) => request,
            Err(e) => {
                warn!("failed to parse S2F41 err={}", e);
                return Ok(Some(messages::s2f42(&RemoteCommandResult::failed(
                    Hcack::InvalidCommand,
                ))));
            }
        };

        self.events.remote_command_received.fire(&request);

        let result = match self.remote_command_handler.read().clone() {
            Some(handler) => handler(&request),
            None => RemoteCommandResult::failed(Hcack::InvalidCommand),
        };

        Ok(Some(messages::s2f42(&result)))
    }
}
