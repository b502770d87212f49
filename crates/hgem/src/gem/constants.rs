// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Equipment constants (ECID).

use super::id::VariableId;
use super::variables::ValueProvider;
use crate::error::Result;
use crate::secs2::Item;
use crate::warn;
use parking_lot::RwLock;
use std::sync::Arc;

/// Callback applying an updated value received via S2F15.
pub type ValueUpdater = Arc<dyn Fn(&Item) -> Result<()> + Send + Sync>;

/// Callback validating a value before it is applied.
pub type ValueValidator = Arc<dyn Fn(&Item) -> Result<()> + Send + Sync>;

// S2F16 ECACK codes.
pub(crate) const ECACK_ACCEPTED: u8 = 0;
pub(crate) const ECACK_DOES_NOT_EXIST: u8 = 1;
pub(crate) const ECACK_INVALID_DATA: u8 = 2;
pub(crate) const ECACK_VALIDATION_ERROR: u8 = 3;

/// A GEM equipment constant definition.
///
/// The default value is mandatory; `min`/`max` are reported in S2F30 and
/// are informational unless a validator enforces them.
pub struct EquipmentConstant {
    id: VariableId,
    pub name: String,
    pub unit: String,
    pub min: Option<Item>,
    pub max: Option<Item>,
    pub default: Item,

    current: RwLock<Item>,
    provider: RwLock<Option<ValueProvider>>,
    updater: RwLock<Option<ValueUpdater>>,
    validator: RwLock<Option<ValueValidator>>,
}

impl EquipmentConstant {
    /// Define an equipment constant. `default` seeds the current value.
    pub fn new(
        id: impl Into<VariableId>,
        name: impl Into<String>,
        default: Item,
    ) -> EquipmentConstant {
        EquipmentConstant {
            id: id.into(),
            name: name.into(),
            unit: String::new(),
            min: None,
            max: None,
            current: RwLock::new(default.clone()),
            default,
            provider: RwLock::new(None),
            updater: RwLock::new(None),
            validator: RwLock::new(None),
        }
    }

    /// Set the engineering unit string.
    pub fn with_unit(mut self, unit: impl Into<String>) -> EquipmentConstant {
        self.unit = unit.into();
        self
    }

    /// Record the minimum permitted value.
    pub fn with_min(mut self, min: Item) -> EquipmentConstant {
        self.min = Some(min);
        self
    }

    /// Record the maximum permitted value.
    pub fn with_max(mut self, max: Item) -> EquipmentConstant {
        self.max = Some(max);
        self
    }

    /// Install a dynamic read callback; it supersedes the stored value.
    pub fn with_provider(self, provider: ValueProvider) -> EquipmentConstant {
        *self.provider.write() = Some(provider);
        self
    }

    /// Install a callback invoked for host updates instead of storing.
    pub fn with_updater(self, updater: ValueUpdater) -> EquipmentConstant {
        *self.updater.write() = Some(updater);
        self
    }

    /// Install validation invoked before any update is applied.
    pub fn with_validator(self, validator: ValueValidator) -> EquipmentConstant {
        *self.validator.write() = Some(validator);
        self
    }

    /// The identifier.
    pub fn id(&self) -> &VariableId {
        &self.id
    }

    pub(crate) fn key(&self) -> String {
        self.id.key()
    }

    /// Resolve the current value, preferring the provider.
    pub fn value(&self) -> Result<Item> {
        let provider = self.provider.read().clone();
        match provider {
            Some(provider) => provider(),
            None => Ok(self.current.read().clone()),
        }
    }

    /// Resolve the current value; failures become the empty item.
    pub(crate) fn value_or_empty(&self) -> Item {
        match self.value() {
            Ok(item) => item,
            Err(e) => {
                warn!("equipment constant {} value error err={}", self.id, e);
                Item::empty()
            }
        }
    }

    /// Apply a new value: validator first, then the updater; without an
    /// updater the stored value is replaced.
    pub fn apply_value(&self, item: Item) -> Result<()> {
        if let Some(validator) = self.validator.read().clone() {
            validator(&item)?;
        }
        match self.updater.read().clone() {
            Some(updater) => updater(&item),
            None => {
                *self.current.write() = item;
                Ok(())
            }
        }
    }
}

/// Metadata tuple returned by S2F30.
#[derive(Debug, Clone)]
pub struct EquipmentConstantInfo {
    pub id: VariableId,
    pub name: String,
    pub unit: String,
    pub min: Option<Item>,
    pub max: Option<Item>,
    pub default: Option<Item>,
}

/// One outbound ECID update for S2F15.
#[derive(Debug, Clone)]
pub struct EquipmentConstantUpdate {
    pub id: VariableId,
    pub value: Item,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn default_seeds_current_value() {
        let ec = EquipmentConstant::new(200u32, "MaxSpeed", Item::u4(50));
        assert_eq!(ec.value().unwrap(), Item::u4(50));
    }

    #[test]
    fn apply_without_updater_stores() {
        let ec = EquipmentConstant::new(200u32, "MaxSpeed", Item::u4(50));
        ec.apply_value(Item::u4(75)).unwrap();
        assert_eq!(ec.value().unwrap(), Item::u4(75));
        assert_eq!(ec.default, Item::u4(50));
    }

    #[test]
    fn validator_gates_updates() {
        let ec = EquipmentConstant::new(201u32, "Bounded", Item::u4(10)).with_validator(Arc::new(
            |item| match item.first_uint() {
                Some(v) if v <= 100 => Ok(()),
                _ => Err(Error::InvalidArgument("out of range".into())),
            },
        ));

        assert!(ec.apply_value(Item::u4(101)).is_err());
        assert_eq!(ec.value().unwrap(), Item::u4(10));

        ec.apply_value(Item::u4(99)).unwrap();
        assert_eq!(ec.value().unwrap(), Item::u4(99));
    }

    #[test]
    fn updater_supersedes_storage() {
        use std::sync::atomic::{AtomicU64, Ordering};
        let seen = Arc::new(AtomicU64::new(0));
        let sink = seen.clone();
        let ec = EquipmentConstant::new(202u32, "Forwarded", Item::u4(1)).with_updater(Arc::new(
            move |item| {
                sink.store(item.first_uint().unwrap_or(0), Ordering::SeqCst);
                Ok(())
            },
        ));

        ec.apply_value(Item::u4(33)).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 33);
        // Stored value untouched when an updater owns the write path.
        assert_eq!(ec.value().unwrap(), Item::u4(1));
    }

    #[test]
    fn provider_wins_reads() {
        let ec = EquipmentConstant::new(203u32, "Live", Item::u4(1))
            .with_provider(Arc::new(|| Ok(Item::u4(42))));
        assert_eq!(ec.value().unwrap(), Item::u4(42));
    }
}
