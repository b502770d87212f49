// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The SEMI timer set (T3/T5/T6/T7/T8 plus the Linktest period).

use std::time::Duration;

/// Protocol timeouts.
///
/// | Timer | Meaning |
/// |-------|---------|
/// | T3 | longest wait for the reply to a W-bit data message |
/// | T5 | separation between two connect attempts |
/// | T6 | longest a control transaction may stay open |
/// | T7 | longest the session may remain NOT-SELECTED |
/// | T8 | longest gap between characters of one message |
/// | linktest | period of Linktest.req probes while SELECTED |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecsTimeouts {
    pub t3: Duration,
    pub t5: Duration,
    pub t6: Duration,
    pub t7: Duration,
    pub t8: Duration,
    pub linktest: Duration,
}

impl Default for SecsTimeouts {
    fn default() -> Self {
        Self {
            t3: Duration::from_secs(45),
            t5: Duration::from_secs(10),
            t6: Duration::from_secs(5),
            t7: Duration::from_secs(10),
            t8: Duration::from_secs(45),
            linktest: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_standard() {
        let t = SecsTimeouts::default();
        assert_eq!(t.t3.as_secs(), 45);
        assert_eq!(t.t5.as_secs(), 10);
        assert_eq!(t.t6.as_secs(), 5);
        assert_eq!(t.t7.as_secs(), 10);
        assert_eq!(t.t8.as_secs(), 45);
        assert_eq!(t.linktest.as_secs(), 10);
    }
}
