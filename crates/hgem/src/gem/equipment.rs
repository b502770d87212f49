// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Equipment-side handlers for status, constants and the control model,
//! plus the registration API for equipment definitions.

use super::config::DeviceType;
use super::collection::CollectionEvent;
use super::constants::{
    EquipmentConstant, ECACK_ACCEPTED, ECACK_DOES_NOT_EXIST, ECACK_INVALID_DATA,
    ECACK_VALIDATION_ERROR,
};
use super::handler::{GemHandler, GemInner};
use super::id::VariableId;
use super::messages;
use super::variables::{DataVariable, StatusVariable};
use crate::error::{Error, Result};
use crate::hsms::HsmsMessage;
use crate::secs2::Item;
use crate::warn;
use std::sync::Arc;

// S1F16 OFLACK codes.
const OFLACK_ACKNOWLEDGE: u8 = 0;
const OFLACK_REFUSED: u8 = 2;

// S1F18 ONLACK codes.
const ONLACK_ACKNOWLEDGE: u8 = 0;
const ONLACK_REFUSED: u8 = 1;
const ONLACK_ALREADY_ONLINE: u8 = 2;

impl GemInner {
    pub(crate) fn ensure_host(&self) -> Result<()> {
        if self.device_type != DeviceType::Host {
            return Err(Error::OperationNotSupported);
        }
        Ok(())
    }

    pub(crate) fn ensure_equipment(&self) -> Result<()> {
        if self.device_type != DeviceType::Equipment {
            return Err(Error::OperationNotSupported);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Status variables (S1F3/F4, S1F11/F12)
    // ------------------------------------------------------------------

    pub(crate) fn on_s1f3(&self, msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        let requests = match messages::parse_id_list(msg) {
            Ok(requests) => requests,
            Err(e) => {
                warn!("failed to parse S1F3 err={}", e);
                return Ok(Some(messages::s1f4(Vec::new())));
            }
        };
        Ok(Some(messages::s1f4(self.resolve_status_values(&requests))))
    }

    fn resolve_status_values(&self, requests: &[Option<VariableId>]) -> Vec<Item> {
        let registry = self.status_vars.read();

        if requests.is_empty() {
            return registry
                .iter_ordered()
                .map(|sv| sv.value_or_empty())
                .collect();
        }

        requests
            .iter()
            .map(|request| match request {
                Some(id) => registry
                    .get(&id.key())
                    .map(|sv| sv.value_or_empty())
                    .unwrap_or_else(Item::empty),
                None => Item::empty(),
            })
            .collect()
    }

    pub(crate) fn on_s1f11(&self, msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        let requests = match messages::parse_id_list(msg) {
            Ok(requests) => requests,
            Err(e) => {
                warn!("failed to parse S1F11 err={}", e);
                return Ok(Some(messages::s1f12(Vec::new())));
            }
        };

        let registry = self.status_vars.read();
        let info_node = |sv: &StatusVariable| {
            Item::list(vec![
                sv.id().to_item(),
                Item::ascii(sv.name.clone()),
                Item::ascii(sv.unit.clone()),
            ])
        };

        let entries = if requests.is_empty() {
            registry.iter_ordered().map(|sv| info_node(sv)).collect()
        } else {
            requests
                .iter()
                .map(|request| match request {
                    Some(id) => match registry.get(&id.key()) {
                        Some(sv) => info_node(sv),
                        None => Item::list(vec![id.to_item(), Item::ascii(""), Item::ascii("")]),
                    },
                    None => Item::list(vec![Item::empty(), Item::ascii(""), Item::ascii("")]),
                })
                .collect()
        };

        Ok(Some(messages::s1f12(entries)))
    }

    // ------------------------------------------------------------------
    // Equipment constants (S2F13/F14, S2F15/F16, S2F29/F30)
    // ------------------------------------------------------------------

    pub(crate) fn on_s2f13(&self, msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        let requests = match messages::parse_id_list(msg) {
            Ok(requests) => requests,
            Err(e) => {
                warn!("failed to parse S2F13 err={}", e);
                return Ok(Some(messages::s2f14(Vec::new())));
            }
        };

        let registry = self.constants.read();
        let values = if requests.is_empty() {
            registry
                .iter_ordered()
                .map(|ec| ec.value_or_empty())
                .collect()
        } else {
            requests
                .iter()
                .map(|request| match request {
                    Some(id) => registry
                        .get(&id.key())
                        .map(|ec| ec.value_or_empty())
                        .unwrap_or_else(Item::empty),
                    None => Item::empty(),
                })
                .collect()
        };

        Ok(Some(messages::s2f14(values)))
    }

    pub(crate) fn on_s2f15(&self, msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        let updates = match messages::parse_ec_updates(msg) {
            Ok(updates) => updates,
            Err(e) => {
                warn!("failed to parse S2F15 err={}", e);
                return Ok(Some(messages::s2f16(ECACK_INVALID_DATA)));
            }
        };
        Ok(Some(messages::s2f16(self.apply_ec_updates(&updates))))
    }

    fn apply_ec_updates(&self, updates: &[Option<(VariableId, Item)>]) -> u8 {
        if updates.is_empty() {
            return ECACK_ACCEPTED;
        }

        let registry = self.constants.read();
        for update in updates {
            match update {
                None => return ECACK_INVALID_DATA,
                Some((id, _)) => {
                    if !registry.contains(&id.key()) {
                        return ECACK_DOES_NOT_EXIST;
                    }
                }
            }
        }

        for (id, value) in updates.iter().flatten() {
            if let Some(constant) = registry.get(&id.key()) {
                if let Err(e) = constant.apply_value(value.clone()) {
                    warn!("equipment constant {} update rejected err={}", id, e);
                    return ECACK_VALIDATION_ERROR;
                }
            }
        }

        ECACK_ACCEPTED
    }

    pub(crate) fn on_s2f29(&self, msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        let requests = match messages::parse_id_list(msg) {
            Ok(requests) => requests,
            Err(e) => {
                warn!("failed to parse S2F29 err={}", e);
                return Ok(Some(messages::s2f30(Vec::new())));
            }
        };

        let registry = self.constants.read();
        let info_node = |ec: &EquipmentConstant| {
            Item::list(vec![
                ec.id().to_item(),
                Item::ascii(ec.name.clone()),
                ec.min.clone().unwrap_or_else(Item::empty),
                ec.max.clone().unwrap_or_else(Item::empty),
                ec.default.clone(),
                Item::ascii(ec.unit.clone()),
            ])
        };
        let missing_node = |id: Option<&VariableId>| {
            Item::list(vec![
                id.map(VariableId::to_item).unwrap_or_else(Item::empty),
                Item::ascii(""),
                Item::empty(),
                Item::empty(),
                Item::empty(),
                Item::ascii(""),
            ])
        };

        let entries = if requests.is_empty() {
            registry.iter_ordered().map(|ec| info_node(ec)).collect()
        } else {
            requests
                .iter()
                .map(|request| match request {
                    Some(id) => match registry.get(&id.key()) {
                        Some(ec) => info_node(ec),
                        None => missing_node(Some(id)),
                    },
                    None => missing_node(None),
                })
                .collect()
        };

        Ok(Some(messages::s2f30(entries)))
    }

    // ------------------------------------------------------------------
    // Control model (S1F15/F16, S1F17/F18)
    // ------------------------------------------------------------------

    pub(crate) fn on_s1f15(&self, _msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        let ack = match self.control.remote_offline() {
            Ok(()) => OFLACK_ACKNOWLEDGE,
            Err(_) => OFLACK_REFUSED,
        };
        Ok(Some(messages::s1f16(ack)))
    }

    pub(crate) fn on_s1f17(&self, _msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        let ack = if self.control.state().is_online() {
            ONLACK_ALREADY_ONLINE
        } else {
            match self.control.remote_online() {
                Ok(()) => ONLACK_ACKNOWLEDGE,
                Err(_) => ONLACK_REFUSED,
            }
        };
        Ok(Some(messages::s1f18(ack)))
    }
}

// ============================================================================
// Equipment registration API
// ============================================================================

impl GemHandler {
    /// Register a status variable definition (equipment only). The returned
    /// handle can update the value or provider later.
    pub fn register_status_variable(&self, variable: StatusVariable) -> Result<Arc<StatusVariable>> {
        self.inner.ensure_equipment()?;
        let variable = Arc::new(variable);
        self.inner.status_vars.write().insert(
            variable.key(),
            Arc::clone(&variable),
            "status variable",
        )?;
        Ok(variable)
    }

    /// Register a data variable definition (equipment only).
    pub fn register_data_variable(&self, variable: DataVariable) -> Result<Arc<DataVariable>> {
        self.inner.ensure_equipment()?;
        let variable = Arc::new(variable);
        self.inner.data_vars.write().insert(
            variable.key(),
            Arc::clone(&variable),
            "data variable",
        )?;
        Ok(variable)
    }

    /// Register an equipment constant definition (equipment only).
    pub fn register_equipment_constant(
        &self,
        constant: EquipmentConstant,
    ) -> Result<Arc<EquipmentConstant>> {
        self.inner.ensure_equipment()?;
        let constant = Arc::new(constant);
        self.inner.constants.write().insert(
            constant.key(),
            Arc::clone(&constant),
            "equipment constant",
        )?;
        Ok(constant)
    }

    /// Register a collection event definition (equipment only).
    pub fn register_collection_event(&self, event: CollectionEvent) -> Result<()> {
        self.inner.ensure_equipment()?;
        let key = event.key();
        if !self.inner.collection.write().register_event(event) {
            return Err(Error::InvalidArgument(format!(
                "collection event {} already registered",
                key
            )));
        }
        Ok(())
    }
}
