// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Status variables (SVID) and data variables (DVID).

use super::id::VariableId;
use crate::error::{Error, Result};
use crate::secs2::Item;
use crate::warn;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Dynamic value callback for SV/DV/EC reads.
pub type ValueProvider = Arc<dyn Fn() -> Result<Item> + Send + Sync>;

/// Either a fixed item or a provider callback.
enum ValueSource {
    Unset,
    Static(Item),
    Provider(ValueProvider),
}

/// A GEM status variable definition.
pub struct StatusVariable {
    id: VariableId,
    pub name: String,
    pub unit: String,
    value: RwLock<ValueSource>,
}

impl StatusVariable {
    /// Define a status variable without a value source yet.
    pub fn new(id: impl Into<VariableId>, name: impl Into<String>, unit: impl Into<String>) -> StatusVariable {
        StatusVariable {
            id: id.into(),
            name: name.into(),
            unit: unit.into(),
            value: RwLock::new(ValueSource::Unset),
        }
    }

    /// Attach a static value.
    pub fn with_value(self, item: Item) -> StatusVariable {
        *self.value.write() = ValueSource::Static(item);
        self
    }

    /// Attach a provider callback.
    pub fn with_provider(self, provider: ValueProvider) -> StatusVariable {
        *self.value.write() = ValueSource::Provider(provider);
        self
    }

    /// The identifier.
    pub fn id(&self) -> &VariableId {
        &self.id
    }

    pub(crate) fn key(&self) -> String {
        self.id.key()
    }

    /// Replace the stored static value.
    pub fn set_value(&self, item: Item) {
        *self.value.write() = ValueSource::Static(item);
    }

    /// Install or replace the provider callback.
    pub fn set_provider(&self, provider: ValueProvider) {
        *self.value.write() = ValueSource::Provider(provider);
    }

    /// Resolve the current value.
    pub fn value(&self) -> Result<Item> {
        // Clone the provider handle so the callback runs outside the lock.
        let provider = {
            let source = self.value.read();
            match &*source {
                ValueSource::Provider(provider) => Arc::clone(provider),
                ValueSource::Static(item) => return Ok(item.clone()),
                ValueSource::Unset => {
                    return Err(Error::InvalidArgument(format!(
                        "status variable {} has no value",
                        self.id
                    )))
                }
            }
        };
        provider()
    }

    /// Resolve the current value; failures become the empty item.
    pub(crate) fn value_or_empty(&self) -> Item {
        match self.value() {
            Ok(item) => item,
            Err(e) => {
                warn!("status variable {} value error err={}", self.id, e);
                Item::empty()
            }
        }
    }
}

/// A GEM data variable (VID) definition. Data variables additionally
/// participate in reports.
pub struct DataVariable {
    id: VariableId,
    pub name: String,
    pub unit: String,
    value: RwLock<ValueSource>,
}

impl DataVariable {
    /// Define a data variable without a value source yet.
    pub fn new(id: impl Into<VariableId>, name: impl Into<String>, unit: impl Into<String>) -> DataVariable {
        DataVariable {
            id: id.into(),
            name: name.into(),
            unit: unit.into(),
            value: RwLock::new(ValueSource::Unset),
        }
    }

    /// Attach a static value.
    pub fn with_value(self, item: Item) -> DataVariable {
        *self.value.write() = ValueSource::Static(item);
        self
    }

    /// Attach a provider callback.
    pub fn with_provider(self, provider: ValueProvider) -> DataVariable {
        *self.value.write() = ValueSource::Provider(provider);
        self
    }

    /// The identifier.
    pub fn id(&self) -> &VariableId {
        &self.id
    }

    pub(crate) fn key(&self) -> String {
        self.id.key()
    }

    /// Replace the stored static value.
    pub fn set_value(&self, item: Item) {
        *self.value.write() = ValueSource::Static(item);
    }

    /// Install or replace the provider callback.
    pub fn set_provider(&self, provider: ValueProvider) {
        *self.value.write() = ValueSource::Provider(provider);
    }

    /// Resolve the current value.
    pub fn value(&self) -> Result<Item> {
        let provider = {
            let source = self.value.read();
            match &*source {
                ValueSource::Provider(provider) => Arc::clone(provider),
                ValueSource::Static(item) => return Ok(item.clone()),
                ValueSource::Unset => {
                    return Err(Error::InvalidArgument(format!(
                        "data variable {} has no value",
                        self.id
                    )))
                }
            }
        };
        provider()
    }

    /// Resolve the current value; failures become the empty item.
    pub(crate) fn value_or_empty(&self) -> Item {
        match self.value() {
            Ok(item) => item,
            Err(e) => {
                warn!("data variable {} value error err={}", self.id, e);
                Item::empty()
            }
        }
    }
}

/// An SVID/ECID together with its resolved value payload.
#[derive(Debug, Clone)]
pub struct StatusValue {
    pub id: VariableId,
    pub value: Item,
}

/// Metadata triple returned by S1F12.
#[derive(Debug, Clone)]
pub struct StatusVariableInfo {
    pub id: VariableId,
    pub name: String,
    pub unit: String,
}

/// Keyed, insertion-ordered registry shared by the SV/DV/EC stores.
pub(crate) struct VariableRegistry<T> {
    map: HashMap<String, Arc<T>>,
    order: Vec<String>,
}

impl<T> VariableRegistry<T> {
    pub fn new() -> VariableRegistry<T> {
        VariableRegistry {
            map: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Insert under `key`; duplicate keys are rejected.
    pub fn insert(&mut self, key: String, value: Arc<T>, what: &str) -> Result<()> {
        if self.map.contains_key(&key) {
            return Err(Error::InvalidArgument(format!(
                "{} {} already registered",
                what, key
            )));
        }
        self.map.insert(key.clone(), value);
        self.order.push(key);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Arc<T>> {
        self.map.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Entries in registration order.
    pub fn iter_ordered(&self) -> impl Iterator<Item = &Arc<T>> {
        self.order.iter().filter_map(|key| self.map.get(key))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_value_round_trip() {
        let sv = StatusVariable::new(1101u32, "Temperature", "C").with_value(Item::u4(100));
        assert_eq!(sv.value().unwrap(), Item::u4(100));
        assert_eq!(sv.key(), "N:1101");
    }

    #[test]
    fn provider_supersedes_static() {
        let sv = StatusVariable::new(1102u32, "Pressure", "Pa").with_value(Item::u4(1));
        sv.set_provider(Arc::new(|| Ok(Item::u4(2))));
        assert_eq!(sv.value().unwrap(), Item::u4(2));
    }

    #[test]
    fn unset_value_is_an_error_but_reads_empty() {
        let dv = DataVariable::new("COUNTER", "Counter", "");
        assert!(dv.value().is_err());
        assert_eq!(dv.value_or_empty(), Item::empty());
    }

    #[test]
    fn provider_failure_reads_empty() {
        let dv = DataVariable::new(2101u32, "Flow", "l/min")
            .with_provider(Arc::new(|| Err(Error::InvalidArgument("sensor gone".into()))));
        assert_eq!(dv.value_or_empty(), Item::empty());
    }

    #[test]
    fn registry_preserves_order_and_uniqueness() {
        let mut registry: VariableRegistry<StatusVariable> = VariableRegistry::new();
        for id in [3u32, 1, 2] {
            let sv = StatusVariable::new(id, format!("SV{}", id), "");
            registry
                .insert(sv.key(), Arc::new(sv), "status variable")
                .unwrap();
        }
        assert_eq!(registry.len(), 3);

        let order: Vec<String> = registry.iter_ordered().map(|sv| sv.key()).collect();
        assert_eq!(order, vec!["N:3", "N:1", "N:2"]);

        let dup = StatusVariable::new(1u32, "again", "");
        assert!(registry
            .insert(dup.key(), Arc::new(dup), "status variable")
            .is_err());
    }
}
