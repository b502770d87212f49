// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end GEM services over a loopback host/equipment pair.
//!
//! One fixture per concern keeps the handshake cost per test bounded; the
//! pair tears itself down on drop.

use hgem::gem::{
    CollectionEvent, ControlState, EquipmentConstant, EquipmentConstantUpdate, EventReport,
    GemOptions, Hcack, RemoteCommandResult, StatusVariable, VariableId,
};
use hgem::secs2::Item;
use hgem::{DeviceType, GemHandler, HsmsConfig};
use parking_lot::Mutex;
use std::net::TcpListener;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("bind probe socket")
        .local_addr()
        .unwrap()
        .port()
}

fn wait_until(timeout: Duration, mut probe: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if probe() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    probe()
}

struct Pair {
    host: GemHandler,
    equipment: GemHandler,
}

impl Pair {
    /// Host + equipment with the standard demo data set, fully
    /// communicating before return.
    fn up() -> Pair {
        let port = free_port();

        let equipment = GemHandler::new(
            HsmsConfig::passive("127.0.0.1", port, 0x0100),
            GemOptions::equipment(0x0100),
        )
        .expect("equipment");

        equipment
            .register_status_variable(
                StatusVariable::new(1101u32, "Temperature", "C")
                    .with_provider(Arc::new(|| Ok(Item::u4(100)))),
            )
            .expect("SV 1101");
        equipment
            .register_data_variable(
                hgem::gem::DataVariable::new(2101u32, "LotCount", "")
                    .with_provider(Arc::new(|| Ok(Item::u2(7)))),
            )
            .expect("DV 2101");
        equipment
            .register_equipment_constant(
                EquipmentConstant::new(5001u32, "MaxSpeed", Item::u4(50)).with_unit("rpm"),
            )
            .expect("EC 5001");
        equipment
            .register_collection_event(CollectionEvent::new(3101u32, "LotComplete"))
            .expect("CE 3101");
        equipment.register_alarm(9001, "over temperature").expect("alarm");
        equipment.enable();

        let host = GemHandler::new(
            HsmsConfig::active("127.0.0.1", port, 0x0100),
            GemOptions::host(0x0100),
        )
        .expect("host");
        host.enable();

        assert!(
            host.wait_for_communicating(Duration::from_secs(10)),
            "host never reached COMMUNICATING"
        );
        assert!(
            equipment.wait_for_communicating(Duration::from_secs(10)),
            "equipment never reached COMMUNICATING"
        );

        Pair { host, equipment }
    }
}

impl Drop for Pair {
    fn drop(&mut self) {
        self.host.disable();
        self.equipment.disable();
    }
}

#[test]
fn handshake_reaches_communicating_and_runs_the_control_model() {
    let port = free_port();

    let equipment = GemHandler::new(
        HsmsConfig::passive("127.0.0.1", port, 0x0100),
        GemOptions::equipment(0x0100),
    )
    .expect("equipment");
    assert_eq!(equipment.device_type(), DeviceType::Equipment);

    let changes: Arc<Mutex<Vec<(ControlState, ControlState)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = changes.clone();
    equipment.on_control_state_change(move |change| {
        sink.lock().push((change.previous, change.next));
    });

    equipment.enable();

    let host = GemHandler::new(
        HsmsConfig::active("127.0.0.1", port, 0x0100),
        GemOptions::host(0x0100),
    )
    .expect("host");
    host.enable();

    assert!(host.wait_for_communicating(Duration::from_secs(10)));
    assert!(equipment.wait_for_communicating(Duration::from_secs(10)));

    // The control model left INIT through ATTEMPT-ONLINE.
    assert!(wait_until(Duration::from_secs(2), || !changes.lock().is_empty()));
    let first = changes.lock()[0];
    assert_eq!(first.0, ControlState::Init);
    assert_eq!(first.1, ControlState::AttemptOnline);

    host.disable();
    equipment.disable();
}

#[test]
fn status_variable_queries() {
    let pair = Pair::up();

    let values = pair
        .host
        .request_status_variables(&[1101u32.into()])
        .expect("S1F3");
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].value, Item::u4(100));

    // Unknown SVIDs read as the empty item, count preserved.
    let values = pair
        .host
        .request_status_variables(&[1101u32.into(), 9999u32.into()])
        .expect("S1F3");
    assert_eq!(values.len(), 2);
    assert_eq!(values[1].value, Item::empty());

    // Empty id list on S1F11 returns the namelist.
    let infos = pair.host.request_status_variable_info(&[]).expect("S1F11");
    assert!(infos.iter().any(|info| info.name == "Temperature"));
}

#[test]
fn equipment_constant_round_trip() {
    let pair = Pair::up();
    let ecid: VariableId = 5001u32.into();

    // Default first.
    let values = pair
        .host
        .request_equipment_constants(std::slice::from_ref(&ecid))
        .expect("S2F13");
    assert_eq!(values[0].value, Item::u4(50));

    // Update within bounds, then read back.
    let ack = pair
        .host
        .send_equipment_constant_values(&[EquipmentConstantUpdate {
            id: ecid.clone(),
            value: Item::u4(75),
        }])
        .expect("S2F15");
    assert_eq!(ack, 0);

    let values = pair
        .host
        .request_equipment_constants(std::slice::from_ref(&ecid))
        .expect("S2F13");
    assert_eq!(values[0].value, Item::u4(75));

    // Unknown ECID in an update -> ECACK=1.
    let ack = pair
        .host
        .send_equipment_constant_values(&[EquipmentConstantUpdate {
            id: 4242u32.into(),
            value: Item::u4(1),
        }])
        .expect("S2F15");
    assert_eq!(ack, 1);

    // Metadata namelist carries min/max/default/unit.
    let infos = pair
        .host
        .request_equipment_constant_info(&[])
        .expect("S2F29");
    let info = infos.iter().find(|info| info.id == ecid).expect("EC info");
    assert_eq!(info.unit, "rpm");
    assert_eq!(info.default, Some(Item::u4(50)));
}

#[test]
fn define_link_enable_trigger_delivers_s6f11() {
    let pair = Pair::up();

    let reports: Arc<Mutex<Vec<EventReport>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();
    pair.host
        .events()
        .event_report_received
        .add_callback(move |report| {
            sink.lock().push(report.clone());
        });

    let rptid: VariableId = 4001u32.into();
    let ceid: VariableId = 3101u32.into();

    let drack = pair
        .host
        .define_reports(&[(rptid.clone(), vec![1101u32.into(), 2101u32.into()])])
        .expect("S2F33");
    assert_eq!(drack, 0);

    let lrack = pair
        .host
        .link_event_reports(&[(ceid.clone(), vec![rptid.clone()])])
        .expect("S2F35");
    assert_eq!(lrack, 0);

    let erack = pair
        .host
        .enable_event_reports(true, std::slice::from_ref(&ceid))
        .expect("S2F37");
    assert_eq!(erack, 0);

    pair.equipment
        .trigger_collection_event(std::slice::from_ref(&ceid))
        .expect("trigger");

    assert!(wait_until(Duration::from_secs(5), || !reports.lock().is_empty()));
    {
        let reports = reports.lock();
        let report = &reports[0];
        assert_eq!(report.data_id, 1);
        assert_eq!(report.ceid, ceid);
        assert_eq!(report.reports.len(), 1);
        assert_eq!(report.reports[0].rptid, rptid);
        assert_eq!(report.reports[0].values, vec![Item::u4(100), Item::u2(7)]);
    }

    // The host-initiated snapshot takes the same build path.
    let snapshot = pair
        .host
        .request_collection_event_report(3101u32)
        .expect("S6F15");
    assert_eq!(snapshot.data_id, 1);
    assert_eq!(snapshot.reports.len(), 1);

    // Redefining the same RPTID with a non-empty VID list -> DRACK=1.
    let drack = pair
        .host
        .define_reports(&[(rptid.clone(), vec![1101u32.into()])])
        .expect("S2F33");
    assert_eq!(drack, 1);

    // Unknown VID -> DRACK=2.
    let drack = pair
        .host
        .define_reports(&[(4002u32.into(), vec![7777u32.into()])])
        .expect("S2F33");
    assert_eq!(drack, 2);

    // Linking the same report twice -> LRACK=3; unknown CEID -> LRACK=1;
    // unknown RPTID -> LRACK=2.
    let lrack = pair
        .host
        .link_event_reports(&[(ceid.clone(), vec![rptid.clone()])])
        .expect("S2F35");
    assert_eq!(lrack, 3);
    let lrack = pair
        .host
        .link_event_reports(&[(8888u32.into(), vec![rptid.clone()])])
        .expect("S2F35");
    assert_eq!(lrack, 1);
    let lrack = pair
        .host
        .link_event_reports(&[(ceid.clone(), vec![8888u32.into()])])
        .expect("S2F35");
    assert_eq!(lrack, 2);

    // Unknown CEID on S2F37 -> ERACK=1.
    let erack = pair
        .host
        .enable_event_reports(true, &[8888u32.into()])
        .expect("S2F37");
    assert_eq!(erack, 1);

    // Defining with an empty outer list clears reports and links: a new
    // trigger emits nothing and the snapshot reads DATAID=0, no reports.
    let drack = pair.host.define_reports(&[]).expect("S2F33 clear");
    assert_eq!(drack, 0);

    let before = reports.lock().len();
    pair.equipment
        .trigger_collection_event(std::slice::from_ref(&ceid))
        .expect("trigger after clear");
    std::thread::sleep(Duration::from_millis(500));
    assert_eq!(reports.lock().len(), before);

    let snapshot = pair
        .host
        .request_collection_event_report(3101u32)
        .expect("S6F15 after clear");
    assert_eq!(snapshot.data_id, 0);
    assert!(snapshot.reports.is_empty());
}

#[test]
fn disabled_events_are_suppressed() {
    let pair = Pair::up();
    let ceid: VariableId = 3101u32.into();

    let count = Arc::new(AtomicU32::new(0));
    let sink = count.clone();
    pair.host
        .events()
        .event_report_received
        .add_callback(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

    pair.host
        .define_reports(&[(4001u32.into(), vec![1101u32.into()])])
        .expect("S2F33");
    pair.host
        .link_event_reports(&[(ceid.clone(), vec![4001u32.into()])])
        .expect("S2F35");
    pair.host
        .enable_event_reports(false, std::slice::from_ref(&ceid))
        .expect("S2F37 disable");

    pair.equipment
        .trigger_collection_event(std::slice::from_ref(&ceid))
        .expect("trigger");
    std::thread::sleep(Duration::from_millis(500));
    assert_eq!(count.load(Ordering::SeqCst), 0);

    // Disabled link answers the snapshot with DATAID=0.
    let snapshot = pair
        .host
        .request_collection_event_report(3101u32)
        .expect("S6F15");
    assert_eq!(snapshot.data_id, 0);
}

#[test]
fn process_program_upload_and_request() {
    let pair = Pair::up();

    let ppack = pair
        .host
        .upload_process_program("PP-001", "STEP 1\nSTEP 2\n")
        .expect("S7F3");
    assert_eq!(ppack, 0);

    let (body, ppack) = pair
        .host
        .request_process_program("PP-001")
        .expect("S7F5");
    assert_eq!(ppack, 0);
    assert_eq!(body, "STEP 1\nSTEP 2\n");

    // Missing programs answer PPACK=1 with an empty body.
    let (body, ppack) = pair
        .host
        .request_process_program("MISSING")
        .expect("S7F5");
    assert_eq!(ppack, 1);
    assert!(body.is_empty());
}

#[test]
fn remote_commands_reach_the_equipment_handler() {
    let pair = Pair::up();

    pair.equipment.set_remote_command_handler(Arc::new(|request| {
        if request.command == "START" {
            RemoteCommandResult::ok()
        } else {
            RemoteCommandResult::failed(Hcack::InvalidCommand)
        }
    }));

    let result = pair
        .host
        .send_remote_command("START", &[(VariableId::Ascii("LOTID".into()), Item::ascii("L42"))])
        .expect("S2F41");
    assert_eq!(result.hcack, Hcack::Acknowledge);

    let result = pair
        .host
        .send_remote_command("UNDEFINED", &[])
        .expect("S2F41");
    assert_eq!(result.hcack, Hcack::InvalidCommand);
}

#[test]
fn alarms_report_and_list() {
    let pair = Pair::up();

    let alarms: Arc<Mutex<Vec<hgem::gem::AlarmEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = alarms.clone();
    pair.host.events().alarm_received.add_callback(move |event| {
        sink.lock().push(event.clone());
    });

    pair.equipment.raise_alarm(9001).expect("raise");
    assert!(wait_until(Duration::from_secs(5), || !alarms.lock().is_empty()));
    {
        let alarms = alarms.lock();
        assert_eq!(alarms[0].id, 9001);
        assert!(alarms[0].set);
    }

    let listed = pair.host.request_alarm_list().expect("S5F5");
    assert_eq!(listed.len(), 1);
    assert!(listed[0].set);
    assert!(listed[0].enabled);

    // Disable over the wire, then the enabled list is empty.
    let ackc5 = pair.host.send_enable_alarm(&[9001], false).expect("S5F3");
    assert_eq!(ackc5, 0);
    let enabled = pair.host.request_enabled_alarm_list().expect("S5F7");
    assert!(enabled.is_empty());

    // Unknown ALID -> ACKC5=1.
    let ackc5 = pair.host.send_enable_alarm(&[4040], true).expect("S5F3");
    assert_eq!(ackc5, 1);

    pair.equipment.clear_alarm(9001).expect("clear");
}

#[test]
fn clock_services() {
    let pair = Pair::up();

    let time = pair.host.request_date_time().expect("S2F17");
    assert_eq!(time.len(), 16);
    assert!(hgem::gem::parse_semi_time(&time).is_ok());

    // Without a sync handler the equipment refuses time sets.
    let now = chrono::Local::now().naive_local();
    let tiack = pair.host.set_date_time(now).expect("S2F31");
    assert_eq!(tiack, 1);

    pair.equipment
        .set_clock_sync_handler(Arc::new(|_| 0))
        .expect("install handler");
    let tiack = pair.host.set_date_time(now).expect("S2F31");
    assert_eq!(tiack, 0);
}

#[test]
fn host_drives_offline_and_online() {
    let pair = Pair::up();

    // Make sure the equipment is online first (ONLACK 0 or 2).
    let onlack = pair.host.request_online().expect("S1F17");
    assert!(onlack == 0 || onlack == 2, "unexpected ONLACK {}", onlack);
    assert!(wait_until(Duration::from_secs(2), || {
        pair.equipment.control_state().is_online()
    }));

    let oflack = pair.host.request_offline().expect("S1F15");
    assert_eq!(oflack, 0);
    assert_eq!(pair.equipment.control_state(), ControlState::HostOffline);

    // Replaying the off-line request yields OFLACK=2.
    let oflack = pair.host.request_offline().expect("S1F15 replay");
    assert_eq!(oflack, 2);

    let onlack = pair.host.request_online().expect("S1F17");
    assert_eq!(onlack, 0);
    assert_eq!(pair.equipment.control_state(), ControlState::OnlineRemote);

    let onlack = pair.host.request_online().expect("S1F17 replay");
    assert_eq!(onlack, 2);
}
