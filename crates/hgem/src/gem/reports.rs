// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Report definition, event linking and the S6F11 trigger pipeline.
//!
//! Lock order: the collection registry lock is taken first and released
//! before variable values are resolved, so provider callbacks never run
//! under it.

use super::handler::{GemHandler, GemInner};
use super::id::VariableId;
use super::messages;
use super::collection::ReportDefinition;
use crate::error::Result;
use crate::hsms::HsmsMessage;
use crate::secs2::Item;
use crate::{info, warn};
use std::sync::Arc;
use std::thread;

// S2F34 DRACK codes.
const DRACK_OK: u8 = 0;
const DRACK_RPTID_REDEFINED: u8 = 1;
const DRACK_VID_UNKNOWN: u8 = 2;

// S2F36 LRACK codes.
const LRACK_OK: u8 = 0;
const LRACK_CEID_UNKNOWN: u8 = 1;
const LRACK_RPTID_UNKNOWN: u8 = 2;
const LRACK_ALREADY_LINKED: u8 = 3;

// S2F38 ERACK codes.
const ERACK_ACCEPTED: u8 = 0;
const ERACK_CEID_UNKNOWN: u8 = 1;

/// The DATAID used for pushed S6F11 reports.
const PUSHED_REPORT_DATAID: u64 = 1;

/// Snapshot of one report taken under the registry lock; values are
/// resolved after the lock is released.
struct ReportSnapshot {
    rptid: VariableId,
    vid_keys: Vec<String>,
}

impl GemInner {
    // ------------------------------------------------------------------
    // S2F33 Define Report
    // ------------------------------------------------------------------

    pub(crate) fn on_s2f33(&self, msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        let definitions = match messages::parse_report_definitions(msg) {
            Ok(definitions) => definitions,
            Err(e) => {
                warn!("failed to parse S2F33 err={}", e);
                return Ok(Some(messages::s2f34(DRACK_VID_UNKNOWN)));
            }
        };
        Ok(Some(messages::s2f34(self.define_reports(&definitions))))
    }

    fn define_reports(&self, definitions: &[(VariableId, Vec<VariableId>)]) -> u8 {
        let mut registry = self.collection.write();

        // An empty outer list clears every report and every link.
        if definitions.is_empty() {
            info!(
                "clearing report definitions reports={} links={}",
                registry.report_count(),
                registry.link_count()
            );
            registry.clear_reports_and_links();
            return DRACK_OK;
        }

        for (rptid, vids) in definitions {
            if registry.has_report(&rptid.key()) && !vids.is_empty() {
                return DRACK_RPTID_REDEFINED;
            }
        }

        // Validate VIDs before mutating anything.
        for (_, vids) in definitions {
            for vid in vids {
                if !self.vid_exists(&vid.key()) {
                    return DRACK_VID_UNKNOWN;
                }
            }
        }

        for (rptid, vids) in definitions {
            let key = rptid.key();
            if vids.is_empty() {
                // Deleting a report silently purges it from every link.
                registry.remove_report(&key);
                continue;
            }
            registry.insert_report(
                key,
                ReportDefinition {
                    id: rptid.clone(),
                    vid_keys: vids.iter().map(VariableId::key).collect(),
                },
            );
        }

        DRACK_OK
    }

    fn vid_exists(&self, key: &str) -> bool {
        if self.status_vars.read().contains(key) {
            return true;
        }
        self.data_vars.read().contains(key)
    }

    // ------------------------------------------------------------------
    // S2F35 Link Event Report
    // ------------------------------------------------------------------

    pub(crate) fn on_s2f35(&self, msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        let links = match messages::parse_event_links(msg) {
            Ok(links) => links,
            Err(e) => {
                warn!("failed to parse S2F35 err={}", e);
                return Ok(Some(messages::s2f36(LRACK_CEID_UNKNOWN)));
            }
        };
        Ok(Some(messages::s2f36(self.link_event_reports(&links))))
    }

    fn link_event_reports(&self, links: &[(VariableId, Vec<VariableId>)]) -> u8 {
        let mut registry = self.collection.write();

        for (ceid, rptids) in links {
            if !registry.has_event(&ceid.key()) {
                return LRACK_CEID_UNKNOWN;
            }
            for rptid in rptids {
                if !registry.has_report(&rptid.key()) {
                    return LRACK_RPTID_UNKNOWN;
                }
                if let Some(link) = registry.link(&ceid.key()) {
                    if link.reports.iter().any(|key| *key == rptid.key()) {
                        return LRACK_ALREADY_LINKED;
                    }
                }
            }
        }

        for (ceid, rptids) in links {
            let ceid_key = ceid.key();
            if rptids.is_empty() {
                registry.remove_link(&ceid_key);
                continue;
            }
            registry.attach_reports(ceid_key, rptids.iter().map(VariableId::key).collect());
        }

        LRACK_OK
    }

    // ------------------------------------------------------------------
    // S2F37 Enable/Disable Event Report
    // ------------------------------------------------------------------

    pub(crate) fn on_s2f37(&self, msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        let (enable, ceids) = match messages::parse_event_enable(msg) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("failed to parse S2F37 err={}", e);
                return Ok(Some(messages::s2f38(ERACK_CEID_UNKNOWN)));
            }
        };
        Ok(Some(messages::s2f38(self.enable_links(enable, &ceids))))
    }

    fn enable_links(&self, enable: bool, ceids: &[VariableId]) -> u8 {
        let mut registry = self.collection.write();

        // An empty CEID list applies to every existing link.
        if ceids.is_empty() {
            registry.set_all_links_enabled(enable);
            return ERACK_ACCEPTED;
        }

        for ceid in ceids {
            if registry.link(&ceid.key()).is_none() {
                return ERACK_CEID_UNKNOWN;
            }
        }
        for ceid in ceids {
            if let Some(link) = registry.link_mut(&ceid.key()) {
                link.enabled = enable;
            }
        }

        ERACK_ACCEPTED
    }

    // ------------------------------------------------------------------
    // Trigger pipeline
    // ------------------------------------------------------------------

    /// Snapshot a CEID's link under the registry lock. `None` means the
    /// event is unlinked, disabled or empty (nothing to emit).
    ///
    /// Returns `Err` for an unknown CEID.
    fn snapshot_event(
        &self,
        key: &str,
    ) -> Result<Option<(Item, Vec<ReportSnapshot>)>> {
        let registry = self.collection.read();

        let event = registry.event(key).ok_or_else(|| {
            crate::error::Error::InvalidArgument(format!("unknown collection event {}", key))
        })?;
        let ceid_item = event.id().to_item();

        let Some(link) = registry.link(key) else {
            return Ok(None);
        };
        if !link.enabled || link.reports.is_empty() {
            return Ok(None);
        }

        let snapshots: Vec<ReportSnapshot> = link
            .reports
            .iter()
            .filter_map(|report_key| {
                registry.report(report_key).map(|report| ReportSnapshot {
                    rptid: report.id.clone(),
                    vid_keys: report.vid_keys.clone(),
                })
            })
            .collect();

        if snapshots.is_empty() {
            return Ok(None);
        }
        Ok(Some((ceid_item, snapshots)))
    }

    /// Resolve one VID value; SVs take precedence, unknown keys read empty.
    fn resolve_vid_value(&self, key: &str) -> Item {
        let status = self.status_vars.read().get(key).cloned();
        if let Some(sv) = status {
            return sv.value_or_empty();
        }
        let data = self.data_vars.read().get(key).cloned();
        match data {
            Some(dv) => dv.value_or_empty(),
            None => Item::empty(),
        }
    }

    fn build_report_items(&self, snapshots: &[ReportSnapshot]) -> Vec<Item> {
        snapshots
            .iter()
            .map(|snapshot| {
                let values = snapshot
                    .vid_keys
                    .iter()
                    .map(|key| self.resolve_vid_value(key))
                    .collect();
                Item::list(vec![snapshot.rptid.to_item(), Item::list(values)])
            })
            .collect()
    }

    /// Emit one S6F11 for a CEID, if it is linked and enabled.
    pub(crate) fn send_collection_event(&self, key: &str) {
        let snapshot = match self.snapshot_event(key) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return, // suppressed: unlinked, disabled or empty
            Err(e) => {
                warn!("collection event build failed err={}", e);
                return;
            }
        };

        let (ceid_item, snapshots) = snapshot;
        let reports = self.build_report_items(&snapshots);
        let msg = messages::s6f11(PUSHED_REPORT_DATAID, ceid_item, reports);
        if let Err(e) = self.protocol.send_data_message(msg) {
            warn!("failed to send S6F11 err={}", e);
        }
    }

    // ------------------------------------------------------------------
    // S6F15 Event Report Request (snapshot) and S6F11 reception
    // ------------------------------------------------------------------

    pub(crate) fn on_s6f15(&self, msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        let ceid = match messages::parse_event_report_request(msg) {
            Ok(ceid) => ceid,
            Err(e) => {
                warn!("failed to parse S6F15 err={}", e);
                return Ok(Some(messages::s6f16(0, Item::empty(), Vec::new())));
            }
        };

        match self.snapshot_event(&ceid.key()) {
            Ok(Some((ceid_item, snapshots))) => {
                let reports = self.build_report_items(&snapshots);
                Ok(Some(messages::s6f16(
                    PUSHED_REPORT_DATAID,
                    ceid_item,
                    reports,
                )))
            }
            // Unlinked, disabled or unknown: DATAID=0 with an empty report
            // list.
            _ => Ok(Some(messages::s6f16(0, ceid.to_item(), Vec::new()))),
        }
    }

    /// Host side: inbound S6F11 event report.
    pub(crate) fn on_s6f11(&self, msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        match messages::parse_event_report(msg) {
            Ok(report) => {
                self.events.event_report_received.fire(&report);
                Ok(Some(messages::s6f12(0)))
            }
            Err(e) => {
                warn!("failed to parse S6F11 err={}", e);
                Ok(Some(messages::s6f12(1)))
            }
        }
    }
}

impl GemHandler {
    /// Emit event reports for the given CEIDs (equipment only, requires
    /// COMMUNICATING). Each CEID is sent asynchronously; events that are
    /// unlinked, disabled or empty are skipped silently.
    pub fn trigger_collection_event(&self, ceids: &[VariableId]) -> Result<()> {
        self.inner.ensure_equipment()?;
        self.inner.ensure_communicating()?;
        if ceids.is_empty() {
            return Err(crate::error::Error::InvalidArgument(
                "at least one CEID required".into(),
            ));
        }

        for ceid in ceids {
            let inner = Arc::clone(&self.inner);
            let key = ceid.key();
            let _ = thread::Builder::new()
                .name("hgem-gem-event".into())
                .spawn(move || inner.send_collection_event(&key));
        }
        Ok(())
    }
}
