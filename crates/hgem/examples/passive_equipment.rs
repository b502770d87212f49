// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! A passive GEM equipment exposing a few variables, one collection event
//! and an alarm. Pairs with the `active_host` example.
//!
//! ```text
//! cargo run --example passive_equipment
//! ```

use hgem::gem::{
    CollectionEvent, EquipmentConstant, GemOptions, Hcack, RemoteCommandResult, StatusVariable,
};
use hgem::logging::{init_logger, ConsoleOutput, LogLevel};
use hgem::secs2::Item;
use hgem::{GemHandler, HsmsConfig, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn main() -> Result<()> {
    init_logger(Arc::new(ConsoleOutput::new(LogLevel::Debug)), LogLevel::Debug);

    let equipment = GemHandler::new(
        HsmsConfig::passive("127.0.0.1", 5000, 0x0100),
        GemOptions::equipment(0x0100),
    )?;

    // A status variable backed by a counter provider.
    let cycles = Arc::new(AtomicU32::new(0));
    let source = cycles.clone();
    equipment.register_status_variable(
        StatusVariable::new(1101u32, "CycleCount", "cycles")
            .with_provider(Arc::new(move || Ok(Item::u4(source.load(Ordering::SeqCst))))),
    )?;

    equipment.register_data_variable(
        hgem::gem::DataVariable::new(2101u32, "LastLotSize", "wafers").with_value(Item::u2(25)),
    )?;

    equipment.register_equipment_constant(
        EquipmentConstant::new(5001u32, "MaxTemperature", Item::u4(180))
            .with_unit("C")
            .with_min(Item::u4(20))
            .with_max(Item::u4(400)),
    )?;

    equipment.register_collection_event(CollectionEvent::new(3101u32, "CycleComplete"))?;
    equipment.register_alarm(9001, "chamber over temperature")?;

    equipment.set_remote_command_handler(Arc::new(|request| {
        println!("remote command: {} ({} parameters)", request.command, request.parameters.len());
        match request.command.as_str() {
            "START" | "STOP" => RemoteCommandResult::ok(),
            _ => RemoteCommandResult::failed(Hcack::InvalidCommand),
        }
    }));

    equipment.enable();
    println!("equipment listening on 127.0.0.1:5000");

    // Simulate production: bump the counter and push the event when a host
    // has linked and enabled it.
    loop {
        std::thread::sleep(Duration::from_secs(5));
        cycles.fetch_add(1, Ordering::SeqCst);
        if equipment
            .trigger_collection_event(&[3101u32.into()])
            .is_ok()
        {
            println!("cycle {} reported", cycles.load(Ordering::SeqCst));
        }
    }
}
