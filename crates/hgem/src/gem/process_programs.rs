// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process program (recipe) subservice: S7F3/F4 upload, S7F5/F6 request.
//!
//! Programs are held in memory only; persistence belongs to the
//! application, which can hook the upload/request paths.

use super::handler::GemInner;
use super::id::VariableId;
use super::messages;
use crate::error::Result;
use crate::hsms::HsmsMessage;
use crate::secs2::Item;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) const PPACK_ACCEPTED: u8 = 0;
pub(crate) const PPACK_ERROR: u8 = 1;

/// A stored process program.
#[derive(Debug, Clone)]
pub struct ProcessProgram {
    pub id: VariableId,
    pub body: String,
}

/// Hook invoked when the host uploads a program (S7F3). A non-zero return
/// becomes the PPACK code and the program is not stored.
pub type ProcessProgramUploadHandler = Arc<dyn Fn(&VariableId, &str) -> u8 + Send + Sync>;

/// Hook serving S7F5 requests instead of the in-memory store. Returns the
/// program body and the PPACK code.
pub type ProcessProgramRequestHandler = Arc<dyn Fn(&VariableId) -> (String, u8) + Send + Sync>;

/// In-memory PPID-keyed program store.
pub(crate) struct ProcessProgramStore {
    items: RwLock<HashMap<String, ProcessProgram>>,
}

impl ProcessProgramStore {
    pub fn new() -> ProcessProgramStore {
        ProcessProgramStore {
            items: RwLock::new(HashMap::new()),
        }
    }

    pub fn put(&self, program: ProcessProgram) {
        self.items.write().insert(program.id.key(), program);
    }

    pub fn get(&self, key: &str) -> Option<ProcessProgram> {
        self.items.read().get(key).cloned()
    }

    pub fn remove(&self, key: &str) {
        self.items.write().remove(key);
    }

    pub fn list(&self) -> Vec<ProcessProgram> {
        self.items.read().values().cloned().collect()
    }
}

impl super::handler::GemHandler {
    /// Store a process program locally (equipment only).
    pub fn register_process_program(
        &self,
        ppid: impl Into<VariableId>,
        body: impl Into<String>,
    ) -> Result<()> {
        self.inner.ensure_equipment()?;
        self.inner.programs.put(ProcessProgram {
            id: ppid.into(),
            body: body.into(),
        });
        Ok(())
    }

    /// Snapshot of the stored process programs.
    pub fn list_process_programs(&self) -> Vec<ProcessProgram> {
        self.inner.programs.list()
    }

    /// Remove a stored process program (equipment only).
    pub fn remove_process_program(&self, ppid: impl Into<VariableId>) -> Result<()> {
        self.inner.ensure_equipment()?;
        self.inner.programs.remove(&ppid.into().key());
        Ok(())
    }

    /// Hook the S7F3 upload path (equipment only).
    pub fn set_process_program_upload_handler(
        &self,
        handler: ProcessProgramUploadHandler,
    ) -> Result<()> {
        self.inner.ensure_equipment()?;
        *self.inner.pp_upload_handler.write() = Some(handler);
        Ok(())
    }

    /// Hook the S7F5 request path (equipment only).
    pub fn set_process_program_request_handler(
        &self,
        handler: ProcessProgramRequestHandler,
    ) -> Result<()> {
        self.inner.ensure_equipment()?;
        *self.inner.pp_request_handler.write() = Some(handler);
        Ok(())
    }
}

impl GemInner {
    /// Equipment side: S7F3 Process Program Send.
    pub(crate) fn on_s7f3(&self, msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        let Some(body) = &msg.body else {
            return Ok(Some(messages::s7f4(PPACK_ERROR)));
        };
        let Some(ppid) = body.get(0).and_then(|item| VariableId::from_item(item).ok()) else {
            return Ok(Some(messages::s7f4(PPACK_ERROR)));
        };
        let program_body = body
            .get(1)
            .and_then(Item::as_ascii)
            .unwrap_or_default()
            .to_string();

        let mut ppack = PPACK_ACCEPTED;
        if let Some(hook) = self.pp_upload_handler.read().clone() {
            ppack = hook(&ppid, &program_body);
        }
        if ppack == PPACK_ACCEPTED {
            self.programs.put(ProcessProgram {
                id: ppid,
                body: program_body,
            });
        }

        Ok(Some(messages::s7f4(ppack)))
    }

    /// Equipment side: S7F5 Process Program Request.
    pub(crate) fn on_s7f5(&self, msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        let ppid_item = match &msg.body {
            Some(Item::List(items)) => items.first().cloned(),
            Some(item) => Some(item.clone()),
            None => None,
        };
        let Some(ppid_item) = ppid_item else {
            return Ok(Some(messages::s7f6(Item::empty(), "", PPACK_ERROR)));
        };
        let Ok(ppid) = VariableId::from_item(&ppid_item) else {
            return Ok(Some(messages::s7f6(Item::empty(), "", PPACK_ERROR)));
        };

        let (body, ppack) = match self.pp_request_handler.read().clone() {
            Some(hook) => hook(&ppid),
            None => match self.programs.get(&ppid.key()) {
                Some(program) => (program.body, PPACK_ACCEPTED),
                None => (String::new(), PPACK_ERROR),
            },
        };

        Ok(Some(messages::s7f6(ppid.to_item(), &body, ppack)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_round_trip() {
        let store = ProcessProgramStore::new();
        store.put(ProcessProgram {
            id: VariableId::Ascii("PP-001".into()),
            body: "STEP 1".into(),
        });

        let fetched = store.get("S:PP-001").unwrap();
        assert_eq!(fetched.body, "STEP 1");
        assert_eq!(store.list().len(), 1);

        store.remove("S:PP-001");
        assert!(store.get("S:PP-001").is_none());
    }

    #[test]
    fn put_replaces_existing_program() {
        let store = ProcessProgramStore::new();
        let id = VariableId::Uint(7);
        store.put(ProcessProgram {
            id: id.clone(),
            body: "v1".into(),
        });
        store.put(ProcessProgram {
            id,
            body: "v2".into(),
        });
        assert_eq!(store.get("N:7").unwrap().body, "v2");
        assert_eq!(store.list().len(), 1);
    }
}
