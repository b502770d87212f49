// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host-side request API.
//!
//! Every operation requires the handler to be a host in COMMUNICATING
//! state; replies are validated against the request (value counts, ack
//! formats) and surfaced as typed results.

use super::alarms::AlarmInfo;
use super::clock::format_semi_time;
use super::collection::EventReport;
use super::constants::{EquipmentConstantInfo, EquipmentConstantUpdate};
use super::handler::GemHandler;
use super::id::VariableId;
use super::messages;
use super::remote_commands::RemoteCommandResult;
use super::variables::{StatusValue, StatusVariableInfo};
use crate::error::{Error, Result};
use crate::secs2::Item;
use chrono::NaiveDateTime;

impl GemHandler {
    fn ensure_host_communicating(&self) -> Result<()> {
        self.inner.ensure_host()?;
        self.inner.ensure_communicating()
    }

    // ------------------------------------------------------------------
    // Stream 1: status
    // ------------------------------------------------------------------

    /// S1F1 Are You There. Equipment answers with its MDLN/SOFTREV pair;
    /// a host peer answers with an empty list.
    pub fn are_you_there(&self) -> Result<Option<(String, String)>> {
        self.ensure_host_communicating()?;
        let reply = self.inner.protocol.send_and_wait(messages::s1f1())?;

        let identity = reply
            .body
            .as_ref()
            .and_then(|body| body.get(0))
            .and_then(Item::as_list)
            .filter(|fields| fields.len() >= 2)
            .map(|fields| {
                (
                    fields[0].as_ascii().unwrap_or_default().to_string(),
                    fields[1].as_ascii().unwrap_or_default().to_string(),
                )
            });
        Ok(identity)
    }

    /// S1F3: request the current value of the given SVIDs. The reply must
    /// carry one value per requested id, in request order.
    pub fn request_status_variables(&self, ids: &[VariableId]) -> Result<Vec<StatusValue>> {
        self.ensure_host_communicating()?;
        if ids.is_empty() {
            return Err(Error::InvalidArgument("at least one SVID required".into()));
        }

        let reply = self.inner.protocol.send_and_wait(messages::s1f3(ids))?;
        let values = messages::parse_value_list(&reply, ids.len())?;

        Ok(ids
            .iter()
            .cloned()
            .zip(values)
            .map(|(id, value)| StatusValue { id, value })
            .collect())
    }

    /// S1F11: request SV name/unit metadata. An empty id list returns the
    /// complete namelist.
    pub fn request_status_variable_info(
        &self,
        ids: &[VariableId],
    ) -> Result<Vec<StatusVariableInfo>> {
        self.ensure_host_communicating()?;
        let reply = self.inner.protocol.send_and_wait(messages::s1f11(ids))?;
        messages::parse_sv_info_list(&reply)
    }

    /// S1F15 Request OFF-LINE; returns the OFLACK code.
    pub fn request_offline(&self) -> Result<u8> {
        self.ensure_host_communicating()?;
        let reply = self.inner.protocol.send_and_wait(messages::s1f15())?;
        messages::ack_byte(&reply)
    }

    /// S1F17 Request ON-LINE; returns the ONLACK code.
    pub fn request_online(&self) -> Result<u8> {
        self.ensure_host_communicating()?;
        let reply = self.inner.protocol.send_and_wait(messages::s1f17())?;
        messages::ack_byte(&reply)
    }

    // ------------------------------------------------------------------
    // Stream 2: equipment constants, clock, remote commands
    // ------------------------------------------------------------------

    /// S2F13: request equipment constant values in request order.
    pub fn request_equipment_constants(&self, ids: &[VariableId]) -> Result<Vec<StatusValue>> {
        self.ensure_host_communicating()?;
        if ids.is_empty() {
            return Err(Error::InvalidArgument("at least one ECID required".into()));
        }

        let reply = self.inner.protocol.send_and_wait(messages::s2f13(ids))?;
        let values = messages::parse_value_list(&reply, ids.len())?;

        Ok(ids
            .iter()
            .cloned()
            .zip(values)
            .map(|(id, value)| StatusValue { id, value })
            .collect())
    }

    /// S2F15: update equipment constants; returns the ECACK code.
    pub fn send_equipment_constant_values(
        &self,
        updates: &[EquipmentConstantUpdate],
    ) -> Result<u8> {
        self.ensure_host_communicating()?;
        if updates.is_empty() {
            return Ok(0);
        }

        let pairs: Vec<(VariableId, Item)> = updates
            .iter()
            .map(|update| (update.id.clone(), update.value.clone()))
            .collect();
        let reply = self.inner.protocol.send_and_wait(messages::s2f15(&pairs))?;
        messages::ack_byte(&reply)
    }

    /// S2F29: request EC metadata. An empty id list returns the namelist.
    pub fn request_equipment_constant_info(
        &self,
        ids: &[VariableId],
    ) -> Result<Vec<EquipmentConstantInfo>> {
        self.ensure_host_communicating()?;
        let reply = self.inner.protocol.send_and_wait(messages::s2f29(ids))?;
        messages::parse_ec_info_list(&reply)
    }

    /// S2F17: request the equipment date and time string.
    pub fn request_date_time(&self) -> Result<String> {
        self.ensure_host_communicating()?;
        let reply = self.inner.protocol.send_and_wait(messages::s2f17())?;
        messages::parse_ascii_body(&reply)
    }

    /// S2F31: set the equipment clock; returns the TIACK code.
    pub fn set_date_time(&self, time: NaiveDateTime) -> Result<u8> {
        self.ensure_host_communicating()?;
        let reply = self
            .inner
            .protocol
            .send_and_wait(messages::s2f31(&format_semi_time(&time)))?;
        messages::ack_byte(&reply)
    }

    /// S2F41: issue a remote command; returns HCACK plus any per-parameter
    /// acknowledges.
    pub fn send_remote_command(
        &self,
        command: impl Into<VariableId>,
        params: &[(VariableId, Item)],
    ) -> Result<RemoteCommandResult> {
        self.ensure_host_communicating()?;
        let reply = self
            .inner
            .protocol
            .send_and_wait(messages::s2f41(&command.into(), params))?;
        messages::parse_remote_command_ack(&reply)
    }

    // ------------------------------------------------------------------
    // Stream 2: reports and event links
    // ------------------------------------------------------------------

    /// S2F33: define (or, with empty VID lists, delete) reports; returns
    /// the DRACK code. An empty definition list clears all reports and
    /// links on the equipment.
    pub fn define_reports(&self, definitions: &[(VariableId, Vec<VariableId>)]) -> Result<u8> {
        self.ensure_host_communicating()?;
        let reply = self
            .inner
            .protocol
            .send_and_wait(messages::s2f33(definitions))?;
        messages::ack_byte(&reply)
    }

    /// S2F35: link collection events to reports; returns the LRACK code.
    pub fn link_event_reports(&self, links: &[(VariableId, Vec<VariableId>)]) -> Result<u8> {
        self.ensure_host_communicating()?;
        let reply = self.inner.protocol.send_and_wait(messages::s2f35(links))?;
        messages::ack_byte(&reply)
    }

    /// S2F37: enable or disable event reports; an empty CEID list applies
    /// to all links. Returns the ERACK code.
    pub fn enable_event_reports(&self, enable: bool, ceids: &[VariableId]) -> Result<u8> {
        self.ensure_host_communicating()?;
        let reply = self
            .inner
            .protocol
            .send_and_wait(messages::s2f37(enable, ceids))?;
        messages::ack_byte(&reply)
    }

    // ------------------------------------------------------------------
    // Stream 5: alarms
    // ------------------------------------------------------------------

    /// S5F3: enable or disable alarm reporting; returns the ACKC5 code.
    pub fn send_enable_alarm(&self, ids: &[u64], enable: bool) -> Result<u8> {
        self.ensure_host_communicating()?;
        let reply = self
            .inner
            .protocol
            .send_and_wait(messages::s5f3(enable, ids))?;
        messages::ack_byte(&reply)
    }

    /// S5F5: request the complete alarm list.
    pub fn request_alarm_list(&self) -> Result<Vec<AlarmInfo>> {
        self.ensure_host_communicating()?;
        let reply = self.inner.protocol.send_and_wait(messages::s5f5())?;
        messages::parse_alarm_list(&reply)
    }

    /// S5F7: request the enabled-alarm list.
    pub fn request_enabled_alarm_list(&self) -> Result<Vec<AlarmInfo>> {
        self.ensure_host_communicating()?;
        let reply = self.inner.protocol.send_and_wait(messages::s5f7())?;
        messages::parse_alarm_list(&reply)
    }

    // ------------------------------------------------------------------
    // Stream 6: event report snapshot
    // ------------------------------------------------------------------

    /// S6F15: request the current report data for one CEID.
    pub fn request_collection_event_report(&self, ceid: impl Into<VariableId>) -> Result<EventReport> {
        self.ensure_host_communicating()?;
        let reply = self
            .inner
            .protocol
            .send_and_wait(messages::s6f15(&ceid.into()))?;
        messages::parse_event_report(&reply)
    }

    // ------------------------------------------------------------------
    // Stream 7: process programs
    // ------------------------------------------------------------------

    /// S7F3: upload a process program to the equipment; returns PPACK.
    pub fn upload_process_program(
        &self,
        ppid: impl Into<VariableId>,
        body: &str,
    ) -> Result<u8> {
        self.ensure_host_communicating()?;
        let reply = self
            .inner
            .protocol
            .send_and_wait(messages::s7f3(&ppid.into(), body))?;
        messages::ack_byte(&reply)
    }

    /// S7F5: request a process program; returns `(body, PPACK)`.
    pub fn request_process_program(
        &self,
        ppid: impl Into<VariableId>,
    ) -> Result<(String, u8)> {
        self.ensure_host_communicating()?;
        let reply = self
            .inner
            .protocol
            .send_and_wait(messages::s7f5(&ppid.into()))?;
        messages::parse_process_program(&reply)
    }
}
