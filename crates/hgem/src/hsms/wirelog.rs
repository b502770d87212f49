// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire-level message logging (SML and/or binary hex).
//!
//! Separate from the crate logging facility: this log is the communication
//! trace operators archive, so it gets its own sink with optional size-based
//! rotation.

use super::frame;
use super::message::HsmsMessage;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use parking_lot::{Mutex, RwLock};

/// What to render per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// SML item rendering only.
    Sml,
    /// Binary hex dump only.
    Binary,
    /// Both renderings.
    Both,
}

impl LogMode {
    fn sml(self) -> bool {
        matches!(self, LogMode::Sml | LogMode::Both)
    }

    fn binary(self) -> bool {
        matches!(self, LogMode::Binary | LogMode::Both)
    }
}

/// Size-based rotation for the wire log file.
#[derive(Debug, Clone)]
pub struct RotationConfig {
    /// Log file path; backups are written as `<file>.1`, `<file>.2`, ...
    pub file: PathBuf,
    /// Rotate when the file would exceed this size.
    pub max_size_mb: u64,
    /// Backups to retain (0 keeps none: the file is truncated on rotation).
    pub max_backups: u32,
    /// Delete backups older than this many days (0 = keep regardless of age).
    pub max_age_days: u32,
    /// Recorded for operators; backups are stored uncompressed.
    pub compress: bool,
}

/// Wire logger configuration.
#[derive(Debug, Clone)]
pub struct WireLogConfig {
    pub enabled: bool,
    pub mode: LogMode,
    /// Also log select/deselect/linktest/separate/reject traffic.
    pub include_control_messages: bool,
    /// Control message names (e.g. "linktest.req") to suppress.
    pub excluded_control_message_types: HashSet<String>,
    /// Log to this file with rotation; stderr when absent.
    pub rotation: Option<RotationConfig>,
}

impl Default for WireLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: LogMode::Sml,
            include_control_messages: false,
            excluded_control_message_types: HashSet::new(),
            rotation: None,
        }
    }
}

enum Sink {
    Stderr,
    File(RotatingFile),
}

impl Sink {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Sink::Stderr => io::stderr().write_all(bytes),
            Sink::File(file) => file.write_all(bytes),
        }
    }
}

/// Thread-safe wire logger shared by the send and receive paths.
pub(crate) struct WireLogger {
    config: RwLock<WireLogConfig>,
    sink: Mutex<Sink>,
}

impl WireLogger {
    pub fn new() -> WireLogger {
        WireLogger {
            config: RwLock::new(WireLogConfig::default()),
            sink: Mutex::new(Sink::Stderr),
        }
    }

    /// Install a new configuration, normalizing the exclusion set and
    /// opening the rotation target. Falls back to stderr when the file
    /// cannot be opened.
    pub fn configure(&self, mut config: WireLogConfig) {
        config.excluded_control_message_types = config
            .excluded_control_message_types
            .iter()
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .collect();

        let sink = match (&config.rotation, config.enabled) {
            (Some(rotation), true) => match RotatingFile::open(rotation.clone()) {
                Ok(file) => Sink::File(file),
                Err(e) => {
                    crate::error!("wire log file open failed path={:?} err={}", rotation.file, e);
                    Sink::Stderr
                }
            },
            _ => Sink::Stderr,
        };

        *self.sink.lock() = sink;
        *self.config.write() = config;
    }

    /// Log a data message in the configured renderings.
    pub fn log_data(&self, direction: &str, msg: &HsmsMessage) {
        let config = self.config.read();
        if !config.enabled {
            return;
        }

        let mut text = String::new();
        let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        text.push_str(&format!(
            "{} [{}][DATA] {}{} session=0x{:04X} system={:08X}\n",
            ts,
            direction,
            msg.sf_code(),
            if msg.wait_bit() { " W" } else { "" },
            msg.header.session_id,
            msg.header.system_bytes,
        ));

        if config.mode.sml() {
            text.push_str("    SML:\n");
            match &msg.body {
                Some(item) => text.push_str(&format!("      {}\n", item)),
                None => text.push_str("      .\n"),
            }
        }
        if config.mode.binary() {
            text.push_str("    BIN:\n");
            push_hex(&mut text, &frame::encode_message(msg), "      ");
        }
        text.push('\n');
        drop(config);

        self.write(text.as_bytes());
    }

    /// Log a control message (subject to inclusion/exclusion rules).
    pub fn log_control(&self, direction: &str, msg: &HsmsMessage) {
        let config = self.config.read();
        if !config.enabled || !config.include_control_messages {
            return;
        }
        let Some(control_type) = msg.control_type() else {
            return;
        };
        if config
            .excluded_control_message_types
            .contains(control_type.name())
        {
            return;
        }

        let mut text = String::new();
        let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        if config.mode.sml() {
            text.push_str(&format!(
                "{} [{}][CTRL] {} session=0x{:04X} status={} system={:08X}\n",
                ts,
                direction,
                control_type,
                msg.header.session_id,
                msg.control_status(),
                msg.header.system_bytes,
            ));
        }
        if config.mode.binary() {
            text.push_str(&format!("{} [{}][CTRL][BIN] ", ts, direction));
            for byte in frame::encode_message(msg) {
                text.push_str(&format!("{:02X}", byte));
            }
            text.push('\n');
        }
        drop(config);

        if !text.is_empty() {
            self.write(text.as_bytes());
        }
    }

    fn write(&self, bytes: &[u8]) {
        let mut sink = self.sink.lock();
        if let Err(e) = sink.write_all(bytes) {
            crate::warn!("wire log write failed err={}", e);
        }
    }

    /// Exposed so message-type filters can be checked in tests.
    #[cfg(test)]
    fn is_excluded(&self, s_type: super::message::SType) -> bool {
        self.config
            .read()
            .excluded_control_message_types
            .contains(s_type.name())
    }
}

fn push_hex(out: &mut String, bytes: &[u8], indent: &str) {
    for (i, byte) in bytes.iter().enumerate() {
        if i % 16 == 0 {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(indent);
        } else if i % 2 == 0 {
            out.push(' ');
        }
        out.push_str(&format!("{:02X}", byte));
    }
    out.push('\n');
}

// ============================================================================
// Rotating file sink
// ============================================================================

struct RotatingFile {
    config: RotationConfig,
    file: File,
    written: u64,
}

impl RotatingFile {
    fn open(config: RotationConfig) -> io::Result<RotatingFile> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.file)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(RotatingFile {
            config,
            file,
            written,
        })
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let limit = self.config.max_size_mb.saturating_mul(1024 * 1024);
        if limit > 0 && self.written + bytes.len() as u64 > limit {
            self.rotate()?;
        }
        self.file.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    fn backup_path(&self, index: u32) -> PathBuf {
        let mut name = self.config.file.as_os_str().to_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.config.max_backups == 0 {
            // No backups requested: start the file over.
            self.file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.config.file)?;
            self.written = 0;
            return Ok(());
        }

        let _ = std::fs::remove_file(self.backup_path(self.config.max_backups));
        for index in (1..self.config.max_backups).rev() {
            let _ = std::fs::rename(self.backup_path(index), self.backup_path(index + 1));
        }
        let _ = std::fs::rename(&self.config.file, self.backup_path(1));

        self.prune_aged();

        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.file)?;
        self.written = 0;
        Ok(())
    }

    fn prune_aged(&self) {
        if self.config.max_age_days == 0 {
            return;
        }
        let horizon = Duration::from_secs(u64::from(self.config.max_age_days) * 24 * 3600);
        for index in 1..=self.config.max_backups {
            let path = self.backup_path(index);
            let expired = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| SystemTime::now().duration_since(modified).ok())
                .is_some_and(|age| age > horizon);
            if expired {
                let _ = std::fs::remove_file(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::message::SType;
    use super::*;

    #[test]
    fn excluded_types_are_normalized() {
        let logger = WireLogger::new();
        let mut config = WireLogConfig {
            enabled: true,
            include_control_messages: true,
            ..WireLogConfig::default()
        };
        config
            .excluded_control_message_types
            .insert("  Linktest.REQ ".into());
        logger.configure(config);

        assert!(logger.is_excluded(SType::LinktestReq));
        assert!(!logger.is_excluded(SType::SelectReq));
    }

    #[test]
    fn hex_dump_groups_bytes() {
        let mut out = String::new();
        push_hex(&mut out, &[0u8; 20], "  ");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "  0000 0000 0000 0000 0000 0000 0000 0000");
        assert_eq!(lines[1], "  0000 0000");
    }

    #[test]
    fn rotation_shifts_backups() {
        let dir = std::env::temp_dir().join(format!("hgem_wirelog_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("comm.log");

        let mut file = RotatingFile::open(RotationConfig {
            file: path.clone(),
            max_size_mb: 0, // manual rotation below
            max_backups: 2,
            max_age_days: 0,
            compress: false,
        })
        .unwrap();

        file.write_all(b"first\n").unwrap();
        file.rotate().unwrap();
        file.write_all(b"second\n").unwrap();
        file.rotate().unwrap();
        file.write_all(b"third\n").unwrap();

        let backup1 = std::fs::read_to_string(dir.join("comm.log.1")).unwrap();
        let backup2 = std::fs::read_to_string(dir.join("comm.log.2")).unwrap();
        let current = std::fs::read_to_string(&path).unwrap();
        assert_eq!(backup1, "second\n");
        assert_eq!(backup2, "first\n");
        assert_eq!(current, "third\n");

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn disabled_logger_writes_nothing_to_files() {
        // A disabled logger short-circuits before touching the sink.
        let logger = WireLogger::new();
        let msg = HsmsMessage::data(1, 1, None);
        logger.log_data("TX", &msg);
        logger.log_control("TX", &HsmsMessage::linktest_req(1));
    }
}
