// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transaction registry: system id -> single-slot reply mailbox.
//!
//! The initiator of a W-bit send installs a mailbox under the message's
//! system bytes; the receive loop posts the correlated reply there. Each
//! mailbox holds at most one message (single producer, single consumer) and
//! late deliveries after removal are dropped.

use super::message::HsmsMessage;
use crate::error::{Error, Result};
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use dashmap::DashMap;
use std::time::Duration;

/// Reply mailbox for one in-flight transaction.
pub struct Mailbox {
    system_id: u32,
    rx: Receiver<HsmsMessage>,
}

impl Mailbox {
    /// System id this mailbox is keyed under.
    pub fn system_id(&self) -> u32 {
        self.system_id
    }

    /// Block until a reply arrives or the timeout elapses.
    ///
    /// Returns `None` on timeout and when the registry entry was removed
    /// underneath the waiter.
    pub fn wait(&self, timeout: Duration) -> Option<HsmsMessage> {
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => Some(msg),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// Concurrent map of in-flight transactions.
pub struct TransactionRegistry {
    slots: DashMap<u32, Sender<HsmsMessage>>,
}

impl TransactionRegistry {
    pub fn new() -> TransactionRegistry {
        TransactionRegistry {
            slots: DashMap::new(),
        }
    }

    /// Install a mailbox for `system_id`. Fails if one already exists.
    pub fn create(&self, system_id: u32) -> Result<Mailbox> {
        use dashmap::mapref::entry::Entry;

        let (tx, rx) = bounded(1);
        match self.slots.entry(system_id) {
            Entry::Occupied(_) => Err(Error::InvalidArgument(format!(
                "transaction {:08X} already in flight",
                system_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(tx);
                Ok(Mailbox { system_id, rx })
            }
        }
    }

    /// Post `msg` to the mailbox for `system_id`, if present.
    ///
    /// Non-blocking; returns the message back when no consumer took it.
    pub fn deliver(&self, system_id: u32, msg: HsmsMessage) -> Option<HsmsMessage> {
        match self.slots.get(&system_id) {
            Some(slot) => match slot.try_send(msg) {
                Ok(()) => None,
                Err(e) => Some(e.into_inner()),
            },
            None => Some(msg),
        }
    }

    /// Drop the mailbox for `system_id`. Subsequent deliveries are discarded.
    pub fn remove(&self, system_id: u32) {
        self.slots.remove(&system_id);
    }

    /// Number of transactions currently in flight.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for TransactionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
