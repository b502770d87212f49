// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Builders and parsers for every GEM message the engine speaks.
//!
//! Builders return bare data messages; session id, system bytes and the W
//! flag are assigned by the HSMS send primitives. Parsers are tolerant the
//! way the services need them to be: malformed inbound requests map to the
//! error acknowledge code of the respective service, never to a panic.

use super::alarms::{Alarm, AlarmEvent, AlarmInfo};
use super::collection::{EventReport, ReportValue};
use super::constants::EquipmentConstantInfo;
use super::id::VariableId;
use super::remote_commands::{
    Hcack, RemoteCommandParameter, RemoteCommandParameterAck, RemoteCommandRequest,
    RemoteCommandResult,
};
use super::variables::StatusVariableInfo;
use crate::error::{Error, Result};
use crate::hsms::HsmsMessage;
use crate::secs2::Item;

fn id_list(ids: &[VariableId]) -> Item {
    Item::list(ids.iter().map(VariableId::to_item).collect())
}

fn body_list(msg: &HsmsMessage) -> Result<Vec<Item>> {
    match &msg.body {
        None => Ok(Vec::new()),
        Some(Item::List(items)) => Ok(items.clone()),
        Some(other) => Err(Error::ProtocolMismatch(format!(
            "{} expected list body, got {}",
            msg.sf_code(),
            other.type_name()
        ))),
    }
}

// ============================================================================
// Stream 1: equipment status
// ============================================================================

pub fn s1f1() -> HsmsMessage {
    HsmsMessage::data(1, 1, None)
}

pub fn s1f2_host() -> HsmsMessage {
    HsmsMessage::data(1, 2, Some(Item::list(vec![Item::empty()])))
}

pub fn s1f2_equipment(mdln: &str, softrev: &str) -> HsmsMessage {
    let body = Item::list(vec![Item::list(vec![
        Item::ascii(mdln),
        Item::ascii(softrev),
    ])]);
    HsmsMessage::data(1, 2, Some(body))
}

pub fn s1f3(ids: &[VariableId]) -> HsmsMessage {
    HsmsMessage::data(1, 3, Some(id_list(ids)))
}

pub fn s1f4(values: Vec<Item>) -> HsmsMessage {
    HsmsMessage::data(1, 4, Some(Item::list(values)))
}

pub fn s1f11(ids: &[VariableId]) -> HsmsMessage {
    HsmsMessage::data(1, 11, Some(id_list(ids)))
}

pub fn s1f12(entries: Vec<Item>) -> HsmsMessage {
    HsmsMessage::data(1, 12, Some(Item::list(entries)))
}

pub fn s1f13() -> HsmsMessage {
    HsmsMessage::data(1, 13, Some(Item::empty()))
}

/// S1F14 Establish Communication Acknowledge. Equipment includes its
/// MDLN/SOFTREV pair; hosts answer with an empty inner list.
pub fn s1f14(commack: u8, identity: Option<(&str, &str)>) -> HsmsMessage {
    let inner = match identity {
        Some((mdln, softrev)) => Item::list(vec![Item::ascii(mdln), Item::ascii(softrev)]),
        None => Item::empty(),
    };
    let body = Item::list(vec![Item::ack(commack), inner]);
    HsmsMessage::data(1, 14, Some(body))
}

pub fn s1f15() -> HsmsMessage {
    HsmsMessage::data(1, 15, None)
}

pub fn s1f16(oflack: u8) -> HsmsMessage {
    HsmsMessage::data(1, 16, Some(Item::ack(oflack)))
}

pub fn s1f17() -> HsmsMessage {
    HsmsMessage::data(1, 17, None)
}

pub fn s1f18(onlack: u8) -> HsmsMessage {
    HsmsMessage::data(1, 18, Some(Item::ack(onlack)))
}

// ============================================================================
// Stream 2: equipment control
// ============================================================================

pub fn s2f13(ids: &[VariableId]) -> HsmsMessage {
    HsmsMessage::data(2, 13, Some(id_list(ids)))
}

pub fn s2f14(values: Vec<Item>) -> HsmsMessage {
    HsmsMessage::data(2, 14, Some(Item::list(values)))
}

pub fn s2f15(updates: &[(VariableId, Item)]) -> HsmsMessage {
    let entries = updates
        .iter()
        .map(|(id, value)| Item::list(vec![id.to_item(), value.clone()]))
        .collect();
    HsmsMessage::data(2, 15, Some(Item::list(entries)))
}

pub fn s2f16(ecack: u8) -> HsmsMessage {
    HsmsMessage::data(2, 16, Some(Item::list(vec![Item::ack(ecack)])))
}

pub fn s2f17() -> HsmsMessage {
    HsmsMessage::data(2, 17, None)
}

pub fn s2f18(time: &str) -> HsmsMessage {
    HsmsMessage::data(2, 18, Some(Item::ascii(time)))
}

pub fn s2f29(ids: &[VariableId]) -> HsmsMessage {
    HsmsMessage::data(2, 29, Some(id_list(ids)))
}

pub fn s2f30(entries: Vec<Item>) -> HsmsMessage {
    HsmsMessage::data(2, 30, Some(Item::list(entries)))
}

pub fn s2f31(time: &str) -> HsmsMessage {
    HsmsMessage::data(2, 31, Some(Item::ascii(time)))
}

pub fn s2f32(tiack: u8) -> HsmsMessage {
    HsmsMessage::data(2, 32, Some(Item::ack(tiack)))
}

pub fn s2f33(definitions: &[(VariableId, Vec<VariableId>)]) -> HsmsMessage {
    let entries = definitions
        .iter()
        .map(|(rptid, vids)| Item::list(vec![rptid.to_item(), id_list(vids)]))
        .collect();
    let body = Item::list(vec![Item::u1(0), Item::list(entries)]);
    HsmsMessage::data(2, 33, Some(body))
}

pub fn s2f34(drack: u8) -> HsmsMessage {
    HsmsMessage::data(2, 34, Some(Item::list(vec![Item::ack(drack)])))
}

pub fn s2f35(links: &[(VariableId, Vec<VariableId>)]) -> HsmsMessage {
    let entries = links
        .iter()
        .map(|(ceid, rptids)| Item::list(vec![ceid.to_item(), id_list(rptids)]))
        .collect();
    let body = Item::list(vec![Item::u1(0), Item::list(entries)]);
    HsmsMessage::data(2, 35, Some(body))
}

pub fn s2f36(lrack: u8) -> HsmsMessage {
    HsmsMessage::data(2, 36, Some(Item::list(vec![Item::ack(lrack)])))
}

pub fn s2f37(enable: bool, ceids: &[VariableId]) -> HsmsMessage {
    let body = Item::list(vec![Item::boolean(enable), id_list(ceids)]);
    HsmsMessage::data(2, 37, Some(body))
}

pub fn s2f38(erack: u8) -> HsmsMessage {
    HsmsMessage::data(2, 38, Some(Item::list(vec![Item::ack(erack)])))
}

pub fn s2f41(command: &VariableId, params: &[(VariableId, Item)]) -> HsmsMessage {
    let entries = params
        .iter()
        .map(|(name, value)| Item::list(vec![name.to_item(), value.clone()]))
        .collect();
    let body = Item::list(vec![command.to_item(), Item::list(entries)]);
    HsmsMessage::data(2, 41, Some(body))
}

pub fn s2f42(result: &RemoteCommandResult) -> HsmsMessage {
    let acks = result
        .parameter_acks
        .iter()
        .map(|ack| Item::list(vec![ack.name.to_item(), Item::ack(ack.cpack)]))
        .collect();
    let body = Item::list(vec![Item::ack(result.hcack.code()), Item::list(acks)]);
    HsmsMessage::data(2, 42, Some(body))
}

// ============================================================================
// Stream 5: alarms
// ============================================================================

pub fn s5f1(alarm: &Alarm, set: bool) -> HsmsMessage {
    let alcd = u8::from(set);
    let body = Item::list(vec![
        Item::ack(alcd),
        Item::uint_min_width(alarm.id),
        Item::ascii(alarm.text.clone()),
    ]);
    HsmsMessage::data(5, 1, Some(body))
}

pub fn s5f2(ackc5: u8) -> HsmsMessage {
    HsmsMessage::data(5, 2, Some(Item::list(vec![Item::ack(ackc5)])))
}

/// S5F3 Enable/Disable Alarm Send. ALED: 128 = enable, 0 = disable.
pub fn s5f3(enable: bool, ids: &[u64]) -> HsmsMessage {
    let aled = if enable { 128 } else { 0 };
    let alids = ids.iter().map(|&id| Item::uint_min_width(id)).collect();
    let body = Item::list(vec![Item::ack(aled), Item::list(alids)]);
    HsmsMessage::data(5, 3, Some(body))
}

pub fn s5f4(ackc5: u8) -> HsmsMessage {
    HsmsMessage::data(5, 4, Some(Item::ack(ackc5)))
}

pub fn s5f5() -> HsmsMessage {
    HsmsMessage::data(5, 5, Some(Item::empty()))
}

fn alarm_list_body(alarms: &[AlarmInfo]) -> Item {
    // ALCD bit 7 = set, bit 6 = enabled.
    let entries = alarms
        .iter()
        .map(|alarm| {
            let mut alcd = 0u8;
            if alarm.set {
                alcd |= 0x80;
            }
            if alarm.enabled {
                alcd |= 0x40;
            }
            Item::list(vec![
                Item::ack(alcd),
                Item::uint_min_width(alarm.id),
                Item::ascii(alarm.text.clone()),
            ])
        })
        .collect();
    Item::list(entries)
}

pub fn s5f6(alarms: &[AlarmInfo]) -> HsmsMessage {
    HsmsMessage::data(5, 6, Some(alarm_list_body(alarms)))
}

pub fn s5f7() -> HsmsMessage {
    HsmsMessage::data(5, 7, Some(Item::empty()))
}

pub fn s5f8(alarms: &[AlarmInfo]) -> HsmsMessage {
    HsmsMessage::data(5, 8, Some(alarm_list_body(alarms)))
}

// ============================================================================
// Stream 6: data collection
// ============================================================================

pub fn s6f11(data_id: u64, ceid: Item, reports: Vec<Item>) -> HsmsMessage {
    let body = Item::list(vec![Item::ack(data_id as u8), ceid, Item::list(reports)]);
    HsmsMessage::data(6, 11, Some(body))
}

pub fn s6f12(ackc6: u8) -> HsmsMessage {
    HsmsMessage::data(6, 12, Some(Item::list(vec![Item::ack(ackc6)])))
}

pub fn s6f15(ceid: &VariableId) -> HsmsMessage {
    HsmsMessage::data(6, 15, Some(ceid.to_item()))
}

pub fn s6f16(data_id: u64, ceid: Item, reports: Vec<Item>) -> HsmsMessage {
    let body = Item::list(vec![
        Item::uint_min_width(data_id),
        ceid,
        Item::list(reports),
    ]);
    HsmsMessage::data(6, 16, Some(body))
}

// ============================================================================
// Stream 7: process programs
// ============================================================================

pub fn s7f3(ppid: &VariableId, body: &str) -> HsmsMessage {
    let payload = Item::list(vec![ppid.to_item(), Item::ascii(body)]);
    HsmsMessage::data(7, 3, Some(payload))
}

pub fn s7f4(ppack: u8) -> HsmsMessage {
    HsmsMessage::data(7, 4, Some(Item::list(vec![Item::ack(ppack)])))
}

pub fn s7f5(ppid: &VariableId) -> HsmsMessage {
    HsmsMessage::data(7, 5, Some(ppid.to_item()))
}

pub fn s7f6(ppid: Item, body: &str, ppack: u8) -> HsmsMessage {
    let body_text = if ppack == 0 { body } else { "" };
    let payload = Item::list(vec![ppid, Item::ascii(body_text), Item::ack(ppack)]);
    HsmsMessage::data(7, 6, Some(payload))
}

// ============================================================================
// Parsers
// ============================================================================

/// Read a single acknowledge byte: either a bare `B[1]` body or the first
/// element of a list body.
pub fn ack_byte(msg: &HsmsMessage) -> Result<u8> {
    let body = msg
        .body
        .as_ref()
        .ok_or_else(|| Error::ProtocolMismatch(format!("{} has no body", msg.sf_code())))?;

    let item = match body {
        Item::List(items) => items
            .first()
            .ok_or_else(|| Error::ProtocolMismatch(format!("{} ack list empty", msg.sf_code())))?,
        other => other,
    };

    item.first_byte()
        .or_else(|| item.first_uint().map(|v| v as u8))
        .ok_or_else(|| Error::ProtocolMismatch(format!("{} ack not binary", msg.sf_code())))
}

/// Parse a request body of identifier items. Unparsable entries become
/// `None` so the reply can carry an empty value in that position.
pub fn parse_id_list(msg: &HsmsMessage) -> Result<Vec<Option<VariableId>>> {
    Ok(body_list(msg)?
        .iter()
        .map(|item| VariableId::from_item(item).ok())
        .collect())
}

/// Parse a value-list reply whose length must match the request.
pub fn parse_value_list(msg: &HsmsMessage, expected: usize) -> Result<Vec<Item>> {
    let values = body_list(msg)?;
    if values.len() != expected {
        return Err(Error::ProtocolMismatch(format!(
            "{} returned {} values, expected {}",
            msg.sf_code(),
            values.len(),
            expected
        )));
    }
    Ok(values)
}

fn entry_ascii(entry: &[Item], index: usize) -> String {
    entry
        .get(index)
        .and_then(Item::as_ascii)
        .unwrap_or_default()
        .to_string()
}

/// Parse S1F12 metadata triples.
pub fn parse_sv_info_list(msg: &HsmsMessage) -> Result<Vec<StatusVariableInfo>> {
    let mut infos = Vec::new();
    for entry in body_list(msg)? {
        let Some(fields) = entry.as_list() else {
            return Err(Error::ProtocolMismatch("malformed S1F12 entry".into()));
        };
        if fields.len() < 3 {
            return Err(Error::ProtocolMismatch("malformed S1F12 entry".into()));
        }
        let id = VariableId::from_item(&fields[0])?;
        infos.push(StatusVariableInfo {
            id,
            name: entry_ascii(fields, 1),
            unit: entry_ascii(fields, 2),
        });
    }
    Ok(infos)
}

/// Parse S2F30 metadata entries: `(id, name, min, max, default, unit)`.
pub fn parse_ec_info_list(msg: &HsmsMessage) -> Result<Vec<EquipmentConstantInfo>> {
    let mut infos = Vec::new();
    for entry in body_list(msg)? {
        let Some(fields) = entry.as_list() else {
            return Err(Error::ProtocolMismatch("malformed S2F30 entry".into()));
        };
        if fields.len() < 6 {
            return Err(Error::ProtocolMismatch("malformed S2F30 entry".into()));
        }
        let id = VariableId::from_item(&fields[0])?;
        infos.push(EquipmentConstantInfo {
            id,
            name: entry_ascii(fields, 1),
            min: Some(fields[2].clone()).filter(|i| !i.is_empty()),
            max: Some(fields[3].clone()).filter(|i| !i.is_empty()),
            default: Some(fields[4].clone()).filter(|i| !i.is_empty()),
            unit: entry_ascii(fields, 5),
        });
    }
    Ok(infos)
}

/// Parse S2F15 update entries. Malformed entries become `None`.
pub fn parse_ec_updates(msg: &HsmsMessage) -> Result<Vec<Option<(VariableId, Item)>>> {
    let mut updates = Vec::new();
    for entry in body_list(msg)? {
        let parsed = entry.as_list().filter(|fields| fields.len() >= 2).and_then(
            |fields| {
                VariableId::from_item(&fields[0])
                    .ok()
                    .map(|id| (id, fields[1].clone()))
            },
        );
        updates.push(parsed);
    }
    Ok(updates)
}

/// Unwrap the entry list shared by S2F33 and S2F35: either the body is the
/// entry list itself, or `L[DATAID, L[entries]]`.
fn report_entries(msg: &HsmsMessage) -> Result<Vec<Item>> {
    let body = body_list(msg)?;
    if body.is_empty() {
        return Ok(Vec::new());
    }
    if body[0].as_list().is_some() {
        return Ok(body);
    }
    match body.get(1).and_then(Item::as_list) {
        Some(entries) => Ok(entries.to_vec()),
        None => Err(Error::ProtocolMismatch(format!(
            "malformed {} payload",
            msg.sf_code()
        ))),
    }
}

/// Parse S2F33 report definitions: `(RPTID, [VID...])` entries.
pub fn parse_report_definitions(msg: &HsmsMessage) -> Result<Vec<(VariableId, Vec<VariableId>)>> {
    let mut definitions = Vec::new();
    for entry in report_entries(msg)? {
        let Some(fields) = entry.as_list().filter(|fields| fields.len() >= 2) else {
            return Err(Error::ProtocolMismatch("malformed S2F33 entry".into()));
        };
        let rptid = VariableId::from_item(&fields[0])?;
        let Some(vid_items) = fields[1].as_list() else {
            return Err(Error::ProtocolMismatch("malformed S2F33 VID list".into()));
        };
        let vids = vid_items
            .iter()
            .map(VariableId::from_item)
            .collect::<Result<Vec<_>>>()?;
        definitions.push((rptid, vids));
    }
    Ok(definitions)
}

/// Parse S2F35 link entries: `(CEID, [RPTID...])`.
pub fn parse_event_links(msg: &HsmsMessage) -> Result<Vec<(VariableId, Vec<VariableId>)>> {
    let mut links = Vec::new();
    for entry in report_entries(msg)? {
        let Some(fields) = entry.as_list().filter(|fields| fields.len() >= 2) else {
            return Err(Error::ProtocolMismatch("malformed S2F35 entry".into()));
        };
        let ceid = VariableId::from_item(&fields[0])?;
        let Some(rpt_items) = fields[1].as_list() else {
            return Err(Error::ProtocolMismatch("malformed S2F35 RPTID list".into()));
        };
        let rptids = rpt_items
            .iter()
            .map(VariableId::from_item)
            .collect::<Result<Vec<_>>>()?;
        links.push((ceid, rptids));
    }
    Ok(links)
}

/// Parse S2F37: `(CEED, [CEID...])`.
pub fn parse_event_enable(msg: &HsmsMessage) -> Result<(bool, Vec<VariableId>)> {
    let body = body_list(msg)?;
    if body.len() < 2 {
        return Err(Error::ProtocolMismatch("malformed S2F37 payload".into()));
    }
    let enable = body[0]
        .first_bool()
        .ok_or_else(|| Error::ProtocolMismatch("S2F37 CEED not boolean".into()))?;
    let Some(ceid_items) = body[1].as_list() else {
        return Err(Error::ProtocolMismatch("malformed S2F37 CEID list".into()));
    };
    let ceids = ceid_items
        .iter()
        .map(VariableId::from_item)
        .collect::<Result<Vec<_>>>()?;
    Ok((enable, ceids))
}

/// Parse the CEID of an S6F15 request (bare item or single-entry list).
pub fn parse_event_report_request(msg: &HsmsMessage) -> Result<VariableId> {
    match &msg.body {
        Some(Item::List(items)) => match items.first() {
            Some(first) => VariableId::from_item(first),
            None => Err(Error::ProtocolMismatch("empty S6F15 payload".into())),
        },
        Some(item) => VariableId::from_item(item),
        None => Err(Error::ProtocolMismatch("empty S6F15 payload".into())),
    }
}

/// Parse an S6F11/S6F16 payload into an [`EventReport`].
pub fn parse_event_report(msg: &HsmsMessage) -> Result<EventReport> {
    let body = body_list(msg)?;
    if body.len() < 3 {
        return Err(Error::ProtocolMismatch(format!(
            "malformed {} payload",
            msg.sf_code()
        )));
    }

    let data_id = body[0]
        .first_uint()
        .or_else(|| body[0].first_byte().map(u64::from))
        .unwrap_or(0);
    let ceid = VariableId::from_item(&body[1])?;
    let Some(report_items) = body[2].as_list() else {
        return Err(Error::ProtocolMismatch("malformed report list".into()));
    };

    let mut reports = Vec::with_capacity(report_items.len());
    for entry in report_items {
        let Some(fields) = entry.as_list().filter(|fields| fields.len() >= 2) else {
            return Err(Error::ProtocolMismatch("malformed report entry".into()));
        };
        let rptid = VariableId::from_item(&fields[0])?;
        let Some(values) = fields[1].as_list() else {
            return Err(Error::ProtocolMismatch("malformed report value list".into()));
        };
        reports.push(ReportValue {
            rptid,
            values: values.to_vec(),
        });
    }

    Ok(EventReport {
        data_id,
        ceid,
        reports,
    })
}

/// Read an ASCII body (S2F18 time, S2F31 time).
pub fn parse_ascii_body(msg: &HsmsMessage) -> Result<String> {
    msg.body
        .as_ref()
        .and_then(Item::as_ascii)
        .map(str::to_string)
        .ok_or_else(|| Error::ProtocolMismatch(format!("{} body not ASCII", msg.sf_code())))
}

/// Parse an S5F1 alarm report: `L[ALCD, ALID, ALTX]`.
pub fn parse_alarm_event(msg: &HsmsMessage) -> Result<AlarmEvent> {
    let body = body_list(msg)?;
    if body.len() < 2 {
        return Err(Error::ProtocolMismatch("malformed S5F1 payload".into()));
    }
    let alcd = body[0]
        .first_byte()
        .ok_or_else(|| Error::ProtocolMismatch("S5F1 ALCD not binary".into()))?;
    let id = body[1]
        .first_uint()
        .ok_or_else(|| Error::ProtocolMismatch("S5F1 ALID not numeric".into()))?;
    let text = body
        .get(2)
        .and_then(Item::as_ascii)
        .unwrap_or_default()
        .to_string();

    Ok(AlarmEvent {
        id,
        text,
        set: alcd != 0,
    })
}

/// Parse an S5F6/S5F8 alarm list. Entries that fail to parse are skipped.
pub fn parse_alarm_list(msg: &HsmsMessage) -> Result<Vec<AlarmInfo>> {
    let mut alarms = Vec::new();
    for entry in body_list(msg)? {
        let Some(fields) = entry.as_list().filter(|fields| fields.len() >= 3) else {
            continue;
        };
        let (Some(alcd), Some(id)) = (fields[0].first_byte(), fields[1].first_uint()) else {
            continue;
        };
        alarms.push(AlarmInfo {
            id,
            text: entry_ascii(fields, 2),
            set: alcd & 0x80 != 0,
            enabled: alcd & 0x40 != 0,
        });
    }
    Ok(alarms)
}

/// Parse an S7F6 reply into `(body, PPACK)`.
pub fn parse_process_program(msg: &HsmsMessage) -> Result<(String, u8)> {
    let body = body_list(msg)?;
    if body.len() < 3 {
        return Err(Error::ProtocolMismatch("malformed S7F6 payload".into()));
    }
    let text = body[1].as_ascii().unwrap_or_default().to_string();
    let ppack = body[2]
        .first_byte()
        .ok_or_else(|| Error::ProtocolMismatch("S7F6 PPACK not binary".into()))?;
    Ok((text, ppack))
}

/// Parse an S2F41 remote command request.
pub fn parse_remote_command(msg: &HsmsMessage) -> Result<RemoteCommandRequest> {
    let body = body_list(msg)?;
    let Some(command_item) = body.first() else {
        return Err(Error::ProtocolMismatch("S2F41 missing RCMD".into()));
    };
    let command_id = VariableId::from_item(command_item)?;

    let mut parameters = Vec::new();
    if let Some(param_items) = body.get(1).and_then(Item::as_list) {
        for entry in param_items {
            let Some(fields) = entry.as_list().filter(|fields| !fields.is_empty()) else {
                continue;
            };
            let Ok(name) = VariableId::from_item(&fields[0]) else {
                continue;
            };
            let value = fields.get(1).cloned().unwrap_or_else(Item::empty);
            parameters.push(RemoteCommandParameter { name, value });
        }
    }

    Ok(RemoteCommandRequest {
        command: command_id.to_string(),
        command_id,
        parameters,
    })
}

/// Parse an S2F42 reply into HCACK plus per-parameter acks.
pub fn parse_remote_command_ack(msg: &HsmsMessage) -> Result<RemoteCommandResult> {
    let body = body_list(msg)?;
    let Some(hcack_item) = body.first() else {
        return Err(Error::ProtocolMismatch("S2F42 missing HCACK".into()));
    };
    let hcack = hcack_item
        .first_byte()
        .ok_or_else(|| Error::ProtocolMismatch("S2F42 HCACK not binary".into()))?;

    let mut parameter_acks = Vec::new();
    if let Some(entries) = body.get(1).and_then(Item::as_list) {
        for entry in entries {
            let Some(fields) = entry.as_list().filter(|fields| fields.len() >= 2) else {
                continue;
            };
            let Ok(name) = VariableId::from_item(&fields[0]) else {
                continue;
            };
            let Some(cpack) = fields[1].first_byte() else {
                continue;
            };
            parameter_acks.push(RemoteCommandParameterAck { name, cpack });
        }
    }

    Ok(RemoteCommandResult {
        hcack: Hcack::from_byte(hcack),
        parameter_acks,
    })
}
