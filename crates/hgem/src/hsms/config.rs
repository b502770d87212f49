// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HSMS engine configuration.

use super::timeout::SecsTimeouts;
use crate::error::{Error, Result};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

/// Configuration for one [`HsmsProtocol`](super::HsmsProtocol) instance.
#[derive(Debug, Clone)]
pub struct HsmsConfig {
    /// Remote address (active) or bind address (passive).
    pub address: String,

    /// Remote port (active) or listen port (passive).
    pub port: u16,

    /// Active entities dial; passive entities listen.
    pub active: bool,

    /// Configured session id. `0` and `0xFFFF` adopt the peer's id on
    /// Select.req when `accept_wildcard_session` is on.
    pub session_id: u16,

    /// The SEMI timer set.
    pub timeouts: SecsTimeouts,

    /// Keep dialing after failures (active role).
    pub auto_reconnect: bool,

    /// Give up after this many consecutive dial failures (0 = unlimited).
    pub max_reconnect_attempts: u32,

    /// First retry delay; doubles per failure.
    pub reconnect_backoff_base: Duration,

    /// Upper bound for the retry delay.
    pub reconnect_backoff_cap: Duration,

    /// Accept Select.req with the 0xFFFF wildcard session id, and adopt the
    /// peer's id when the configured id is 0/0xFFFF. Non-standard but widely
    /// deployed; on by default.
    pub accept_wildcard_session: bool,
}

impl HsmsConfig {
    /// Configuration for an active (dialing) endpoint.
    pub fn active(address: impl Into<String>, port: u16, session_id: u16) -> HsmsConfig {
        HsmsConfig {
            address: address.into(),
            port,
            active: true,
            session_id,
            timeouts: SecsTimeouts::default(),
            auto_reconnect: true,
            max_reconnect_attempts: 0,
            reconnect_backoff_base: Duration::from_secs(2),
            reconnect_backoff_cap: Duration::from_secs(60),
            accept_wildcard_session: true,
        }
    }

    /// Configuration for a passive (listening) endpoint.
    pub fn passive(address: impl Into<String>, port: u16, session_id: u16) -> HsmsConfig {
        HsmsConfig {
            active: false,
            ..HsmsConfig::active(address, port, session_id)
        }
    }

    /// Resolve the configured endpoint to a socket address.
    pub(crate) fn socket_addr(&self) -> Result<SocketAddr> {
        let target = format!("{}:{}", self.address, self.port);
        target
            .to_socket_addrs()
            .map_err(Error::Io)?
            .next()
            .ok_or_else(|| Error::InvalidArgument(format!("unresolvable address {}", target)))
    }

    /// Retry delay after `attempts` consecutive dial failures:
    /// `min(base * 2^(attempts-1), cap)`.
    pub(crate) fn backoff_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(16);
        let delay = self
            .reconnect_backoff_base
            .saturating_mul(1u32 << exponent);
        delay.min(self.reconnect_backoff_cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let cfg = HsmsConfig::active("127.0.0.1", 5000, 0x0100);
        let secs: Vec<u64> = (1..=8).map(|n| cfg.backoff_delay(n).as_secs()).collect();
        assert_eq!(secs, vec![2, 4, 8, 16, 32, 60, 60, 60]);
    }

    #[test]
    fn socket_addr_resolution() {
        let cfg = HsmsConfig::passive("127.0.0.1", 6000, 0x0100);
        let addr = cfg.socket_addr().unwrap();
        assert_eq!(addr.port(), 6000);
        assert!(addr.is_ipv4());
    }

    #[test]
    fn passive_flips_role_only() {
        let active = HsmsConfig::active("10.0.0.1", 5000, 1);
        let passive = HsmsConfig::passive("10.0.0.1", 5000, 1);
        assert!(active.active);
        assert!(!passive.active);
        assert_eq!(active.session_id, passive.session_id);
    }
}
