// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! GEM service layer (SEMI E30) on top of an HSMS session.
//!
//! The [`GemHandler`] drives the establish-communication handshake
//! (S1F13/S1F14), the equipment control model (S1F15..S1F18), and the
//! canonical services: status/equipment-constant queries, report definition
//! and event delivery, alarms, clock sync, process programs and remote
//! commands.
//!
//! # Architecture
//!
//! ```text
//! +----------------------------------------------------------------+
//! |                          GemHandler                            |
//! |  +--------------------+  +---------------------------------+  |
//! |  | communication SM   |  | control SM                      |  |
//! |  | (WAIT-CRA/DELAY)   |  | (OFFLINE/ATTEMPT/HOST/ONLINE)   |  |
//! |  +--------------------+  +---------------------------------+  |
//! |  +--------------------+  +----------------+  +------------+  |
//! |  | SV / DV / EC       |  | CE / reports / |  | alarms /   |  |
//! |  | registries         |  | event links    |  | clock / PP |  |
//! |  +--------------------+  +----------------+  +------------+  |
//! |        host request API        |      equipment handlers       |
//! +----------------------------------------------------------------+
//!                          HsmsProtocol
//! ```
//!
//! A handler is either a [`DeviceType::Host`] or a [`DeviceType::Equipment`];
//! operations belonging to the other role fail with
//! [`Error::OperationNotSupported`](crate::Error::OperationNotSupported).

pub mod alarms;
pub mod callback;
pub mod clock;
pub mod collection;
pub mod communication;
pub mod config;
pub mod control;
pub mod constants;
mod equipment;
pub mod handler;
mod host;
pub(crate) mod messages;
pub mod process_programs;
pub mod remote_commands;
mod reports;
pub mod variables;

pub mod id;

pub use alarms::{Alarm, AlarmEvent, AlarmInfo};
pub use callback::Event;
pub use clock::{format_semi_time, parse_semi_time, ClockSyncHandler, TimeProvider};
pub use collection::{CollectionEvent, EventReport, ReportValue};
pub use communication::CommunicationState;
pub use config::{DeviceType, GemOptions};
pub use constants::{
    EquipmentConstant, EquipmentConstantInfo, EquipmentConstantUpdate, ValueUpdater,
    ValueValidator,
};
pub use control::{ControlState, ControlStateChange, ControlStateMachine, OnlineMode};
pub use handler::{Events, GemHandler, S9Error};
pub use id::VariableId;
pub use process_programs::{
    ProcessProgram, ProcessProgramRequestHandler, ProcessProgramUploadHandler,
};
pub use remote_commands::{
    Hcack, RemoteCommandHandler, RemoteCommandParameter, RemoteCommandParameterAck,
    RemoteCommandRequest, RemoteCommandResult,
};
pub use variables::{
    DataVariable, StatusValue, StatusVariable, StatusVariableInfo, ValueProvider,
};
