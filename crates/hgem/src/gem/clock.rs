// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Clock subservice: S2F17/F18 time request, S2F31/F32 time set.
//!
//! Times travel as 16-character ASCII `YYYYMMDDhhmmssCC`; the trailing
//! centiseconds are always "00" and parsers only consume the first 14
//! characters.

use super::handler::GemInner;
use super::messages;
use crate::error::{Error, Result};
use crate::hsms::HsmsMessage;
use chrono::{Local, NaiveDateTime};
use parking_lot::RwLock;
use std::sync::Arc;

// S2F32 TIACK codes.
pub(crate) const TIACK_ACCEPTED: u8 = 0;
pub(crate) const TIACK_NOT_ALLOWED: u8 = 1;

/// Callback returning the equipment's current time.
pub type TimeProvider = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Callback validating an S2F31 time-set request; returns the TIACK code
/// (0 accepted, 1 not allowed now, 2 out of synchronization limit).
pub type ClockSyncHandler = Arc<dyn Fn(NaiveDateTime) -> u8 + Send + Sync>;

/// Format a timestamp in the SEMI E5 16-character layout.
pub fn format_semi_time(time: &NaiveDateTime) -> String {
    format!("{}00", time.format("%Y%m%d%H%M%S"))
}

/// Parse a SEMI E5 time string, ignoring the centisecond suffix.
pub fn parse_semi_time(text: &str) -> Result<NaiveDateTime> {
    if text.len() < 14 {
        return Err(Error::InvalidArgument(format!(
            "time string '{}' shorter than 14 characters",
            text
        )));
    }
    NaiveDateTime::parse_from_str(&text[..14], "%Y%m%d%H%M%S")
        .map_err(|e| Error::InvalidArgument(format!("bad time string '{}': {}", text, e)))
}

/// Time source and sync policy for the equipment side.
pub(crate) struct ClockManager {
    provider: RwLock<Option<TimeProvider>>,
    sync_handler: RwLock<Option<ClockSyncHandler>>,
}

impl ClockManager {
    pub fn new() -> ClockManager {
        ClockManager {
            provider: RwLock::new(None),
            sync_handler: RwLock::new(None),
        }
    }

    pub fn set_provider(&self, provider: TimeProvider) {
        *self.provider.write() = Some(provider);
    }

    pub fn set_sync_handler(&self, handler: ClockSyncHandler) {
        *self.sync_handler.write() = Some(handler);
    }

    pub fn now(&self) -> NaiveDateTime {
        let provider = self.provider.read().clone();
        match provider {
            Some(provider) => provider(),
            None => Local::now().naive_local(),
        }
    }

    pub fn formatted_time(&self) -> String {
        format_semi_time(&self.now())
    }

    /// Apply an S2F31 request. Without a sync handler the request is
    /// refused with TIACK=1.
    pub fn handle_time_set(&self, requested: NaiveDateTime) -> u8 {
        let handler = self.sync_handler.read().clone();
        match handler {
            Some(handler) => handler(requested),
            None => TIACK_NOT_ALLOWED,
        }
    }
}

impl super::handler::GemHandler {
    /// Install a custom time source (equipment only).
    pub fn set_time_provider(&self, provider: TimeProvider) -> Result<()> {
        self.inner.ensure_equipment()?;
        self.inner.clock.set_provider(provider);
        Ok(())
    }

    /// Install the S2F31 time-set policy (equipment only). Without one,
    /// time-set requests answer TIACK=1.
    pub fn set_clock_sync_handler(&self, handler: ClockSyncHandler) -> Result<()> {
        self.inner.ensure_equipment()?;
        self.inner.clock.set_sync_handler(handler);
        Ok(())
    }

    /// The equipment's current time in E5 format.
    pub fn equipment_time(&self) -> String {
        self.inner.clock.formatted_time()
    }
}

impl GemInner {
    /// Equipment side: S2F17 Date and Time Request.
    pub(crate) fn on_s2f17(&self, _msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        Ok(Some(messages::s2f18(&self.clock.formatted_time())))
    }

    /// Equipment side: S2F31 Date and Time Set Request.
    pub(crate) fn on_s2f31(&self, msg: &HsmsMessage) -> Result<Option<HsmsMessage>> {
        let requested = match messages::parse_ascii_body(msg)
            .and_then(|text| parse_semi_time(&text))
        {
            Ok(time) => time,
            Err(_) => return Ok(Some(messages::s2f32(TIACK_NOT_ALLOWED))),
        };

        Ok(Some(messages::s2f32(self.clock.handle_time_set(requested))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn format_appends_centiseconds() {
        let time = NaiveDate::from_ymd_opt(2026, 8, 2)
            .unwrap()
            .and_hms_opt(14, 30, 15)
            .unwrap();
        assert_eq!(format_semi_time(&time), "2026080214301500");
    }

    #[test]
    fn parse_ignores_centiseconds() {
        let parsed = parse_semi_time("2026080214301599").unwrap();
        assert_eq!(format_semi_time(&parsed), "2026080214301500");
        // 14 characters are enough.
        assert!(parse_semi_time("20260802143015").is_ok());
    }

    #[test]
    fn short_or_garbled_times_rejected() {
        assert!(parse_semi_time("2026").is_err());
        assert!(parse_semi_time("20269999999999").is_err());
    }

    #[test]
    fn time_set_refused_without_handler() {
        let clock = ClockManager::new();
        let now = clock.now();
        assert_eq!(clock.handle_time_set(now), TIACK_NOT_ALLOWED);
    }

    #[test]
    fn provider_overrides_system_time() {
        let clock = ClockManager::new();
        let fixed = NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        clock.set_provider(Arc::new(move || fixed));
        assert_eq!(clock.formatted_time(), "2000010100000000");
    }
}
