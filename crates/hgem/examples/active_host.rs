// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! An active GEM host: connects, defines and enables a report, then prints
//! every event report the equipment pushes. Pairs with the
//! `passive_equipment` example.
//!
//! ```text
//! cargo run --example active_host
//! ```

use hgem::gem::GemOptions;
use hgem::logging::{init_logger, ConsoleOutput, LogLevel};
use hgem::{Error, GemHandler, HsmsConfig, Result};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    init_logger(Arc::new(ConsoleOutput::new(LogLevel::Info)), LogLevel::Info);

    let host = GemHandler::new(
        HsmsConfig::active("127.0.0.1", 5000, 0x0100),
        GemOptions::host(0x0100),
    )?;

    host.events().event_report_received.add_callback(|report| {
        println!("event report: CEID={} reports={}", report.ceid, report.reports.len());
        for entry in &report.reports {
            println!("  RPTID={} values={:?}", entry.rptid, entry.values);
        }
    });
    host.events().alarm_received.add_callback(|alarm| {
        println!(
            "alarm {}: {} ({})",
            alarm.id,
            alarm.text,
            if alarm.set { "SET" } else { "CLEAR" }
        );
    });

    host.enable();
    if !host.wait_for_communicating(Duration::from_secs(30)) {
        host.disable();
        return Err(Error::NotCommunicating);
    }
    println!("communicating");

    for info in host.request_status_variable_info(&[])? {
        println!("SV {}: {} [{}]", info.id, info.name, info.unit);
    }

    host.define_reports(&[(4001u32.into(), vec![1101u32.into(), 2101u32.into()])])?;
    host.link_event_reports(&[(3101u32.into(), vec![4001u32.into()])])?;
    host.enable_event_reports(true, &[3101u32.into()])?;
    println!("report pipeline armed; waiting for events (ctrl-c to quit)");

    loop {
        std::thread::sleep(Duration::from_secs(60));
        let time = host.request_date_time()?;
        println!("equipment clock: {}", time);
    }
}
