// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Collection events, report definitions and event links.
//!
//! Reports and event links reference each other by key, so all three
//! registries live behind one lock boundary: removing a report walks the
//! links to purge dangling keys, and a link whose report list empties out
//! is dropped.

use super::id::VariableId;
use crate::secs2::Item;
use std::collections::HashMap;

/// A GEM collection event definition (CEID).
pub struct CollectionEvent {
    id: VariableId,
    pub name: String,
}

impl CollectionEvent {
    pub fn new(id: impl Into<VariableId>, name: impl Into<String>) -> CollectionEvent {
        CollectionEvent {
            id: id.into(),
            name: name.into(),
        }
    }

    /// The identifier.
    pub fn id(&self) -> &VariableId {
        &self.id
    }

    pub(crate) fn key(&self) -> String {
        self.id.key()
    }
}

/// A report definition (RPTID with its ordered VID list).
pub(crate) struct ReportDefinition {
    pub id: VariableId,
    pub vid_keys: Vec<String>,
}

/// Per-CEID link: ordered report keys plus the enable flag.
pub(crate) struct EventLink {
    pub reports: Vec<String>,
    pub enabled: bool,
}

impl EventLink {
    fn new(reports: Vec<String>) -> EventLink {
        EventLink {
            reports,
            enabled: true,
        }
    }
}

/// One decoded report inside an S6F11/S6F16 payload.
#[derive(Debug, Clone)]
pub struct ReportValue {
    pub rptid: VariableId,
    pub values: Vec<Item>,
}

/// A decoded collection event report message.
#[derive(Debug, Clone)]
pub struct EventReport {
    pub data_id: u64,
    pub ceid: VariableId,
    pub reports: Vec<ReportValue>,
}

/// The single-lock registry for events, reports and links.
pub(crate) struct CollectionRegistry {
    events: HashMap<String, CollectionEvent>,
    event_order: Vec<String>,
    reports: HashMap<String, ReportDefinition>,
    links: HashMap<String, EventLink>,
}

impl CollectionRegistry {
    pub fn new() -> CollectionRegistry {
        CollectionRegistry {
            events: HashMap::new(),
            event_order: Vec::new(),
            reports: HashMap::new(),
            links: HashMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // Collection events
    // ------------------------------------------------------------------

    pub fn register_event(&mut self, event: CollectionEvent) -> bool {
        let key = event.key();
        if self.events.contains_key(&key) {
            return false;
        }
        self.events.insert(key.clone(), event);
        self.event_order.push(key);
        true
    }

    pub fn event(&self, key: &str) -> Option<&CollectionEvent> {
        self.events.get(key)
    }

    pub fn has_event(&self, key: &str) -> bool {
        self.events.contains_key(key)
    }

    // ------------------------------------------------------------------
    // Reports
    // ------------------------------------------------------------------

    pub fn report(&self, key: &str) -> Option<&ReportDefinition> {
        self.reports.get(key)
    }

    pub fn has_report(&self, key: &str) -> bool {
        self.reports.contains_key(key)
    }

    pub fn insert_report(&mut self, key: String, definition: ReportDefinition) {
        self.reports.insert(key, definition);
    }

    /// Delete a report and purge it from every link; links left with no
    /// reports are removed entirely.
    pub fn remove_report(&mut self, key: &str) {
        self.reports.remove(key);
        self.links.retain(|_, link| {
            link.reports.retain(|report| report != key);
            !link.reports.is_empty()
        });
    }

    /// Drop every report and every link.
    pub fn clear_reports_and_links(&mut self) {
        self.reports.clear();
        self.links.clear();
    }

    pub fn report_count(&self) -> usize {
        self.reports.len()
    }

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    pub fn link(&self, ceid_key: &str) -> Option<&EventLink> {
        self.links.get(ceid_key)
    }

    pub fn link_mut(&mut self, ceid_key: &str) -> Option<&mut EventLink> {
        self.links.get_mut(ceid_key)
    }

    /// Append reports to a CEID's link, creating it (enabled) when absent.
    pub fn attach_reports(&mut self, ceid_key: String, report_keys: Vec<String>) {
        match self.links.get_mut(&ceid_key) {
            Some(link) => link.reports.extend(report_keys),
            None => {
                self.links.insert(ceid_key, EventLink::new(report_keys));
            }
        }
    }

    pub fn remove_link(&mut self, ceid_key: &str) {
        self.links.remove(ceid_key);
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Set the enable flag on every link.
    pub fn set_all_links_enabled(&mut self, enabled: bool) {
        for link in self.links.values_mut() {
            link.enabled = enabled;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_link() -> CollectionRegistry {
        let mut registry = CollectionRegistry::new();
        registry.register_event(CollectionEvent::new(3101u32, "LotComplete"));
        registry.insert_report(
            "N:4001".into(),
            ReportDefinition {
                id: VariableId::Uint(4001),
                vid_keys: vec!["N:1101".into(), "N:2101".into()],
            },
        );
        registry.attach_reports("N:3101".into(), vec!["N:4001".into()]);
        registry
    }

    #[test]
    fn links_default_enabled() {
        let registry = registry_with_link();
        let link = registry.link("N:3101").unwrap();
        assert!(link.enabled);
        assert_eq!(link.reports, vec!["N:4001".to_string()]);
    }

    #[test]
    fn removing_a_report_purges_links() {
        let mut registry = registry_with_link();
        registry.remove_report("N:4001");
        assert!(!registry.has_report("N:4001"));
        assert!(registry.link("N:3101").is_none());
    }

    #[test]
    fn clearing_empties_both_sides() {
        let mut registry = registry_with_link();
        registry.clear_reports_and_links();
        assert_eq!(registry.report_count(), 0);
        assert_eq!(registry.link_count(), 0);
        // Events survive a report clear.
        assert!(registry.has_event("N:3101"));
    }

    #[test]
    fn duplicate_event_registration_rejected() {
        let mut registry = CollectionRegistry::new();
        assert!(registry.register_event(CollectionEvent::new(1u32, "a")));
        assert!(!registry.register_event(CollectionEvent::new(1u32, "b")));
    }

    #[test]
    fn attach_appends_to_existing_link() {
        let mut registry = registry_with_link();
        registry.insert_report(
            "N:4002".into(),
            ReportDefinition {
                id: VariableId::Uint(4002),
                vid_keys: vec!["N:1101".into()],
            },
        );
        registry.attach_reports("N:3101".into(), vec!["N:4002".into()]);
        let link = registry.link("N:3101").unwrap();
        assert_eq!(link.reports.len(), 2);
    }
}
