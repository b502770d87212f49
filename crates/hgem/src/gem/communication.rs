// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! GEM communication state machine.
//!
//! # State Machine
//!
//! ```text
//!   DISABLED --enable--> NOT-COMMUNICATING
//!        NOT-COMMUNICATING --initiate--> WAIT-CRA
//!        WAIT-CRA --COMMACK=0--> COMMUNICATING
//!        WAIT-CRA --denied/T3--> WAIT-DELAY --expiry--> WAIT-CRA (retry)
//!        any --link lost--> NOT-COMMUNICATING
//! ```
//!
//! The WAIT-CRA and WAIT-DELAY states carry guarded timers; entering any
//! other state cancels both.

use crate::hsms::timer::OneshotTimer;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::time::{Duration, Instant};

/// GEM communication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunicationState {
    /// Handler not enabled.
    Disabled,
    /// Enabled, no handshake completed.
    NotCommunicating,
    /// S1F13 sent, waiting for the Communication Request Acknowledge.
    WaitCra,
    /// Handshake failed; waiting before the next attempt.
    WaitDelay,
    /// Handshake completed; services available.
    Communicating,
}

impl CommunicationState {
    /// Canonical state name.
    pub fn as_str(self) -> &'static str {
        match self {
            CommunicationState::Disabled => "DISABLED",
            CommunicationState::NotCommunicating => "NOT-COMMUNICATING",
            CommunicationState::WaitCra => "WAIT-CRA",
            CommunicationState::WaitDelay => "WAIT-DELAY",
            CommunicationState::Communicating => "COMMUNICATING",
        }
    }
}

impl fmt::Display for CommunicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialized communication state with guarded handshake timers.
pub(crate) struct CommunicationStateMachine {
    state: Mutex<CommunicationState>,
    changed: Condvar,
    wait_cra_timer: OneshotTimer,
    wait_delay_timer: OneshotTimer,
}

impl CommunicationStateMachine {
    pub fn new() -> CommunicationStateMachine {
        CommunicationStateMachine {
            state: Mutex::new(CommunicationState::Disabled),
            changed: Condvar::new(),
            wait_cra_timer: OneshotTimer::new(),
            wait_delay_timer: OneshotTimer::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> CommunicationState {
        *self.state.lock()
    }

    /// Transition to `next`, cancelling both timers. Returns the previous
    /// state; same-state transitions are no-ops.
    pub fn set_state(&self, next: CommunicationState) -> CommunicationState {
        let previous = {
            let mut state = self.state.lock();
            let previous = *state;
            if previous != next {
                *state = next;
                self.changed.notify_all();
            }
            previous
        };
        if previous != next {
            self.stop_timers();
        }
        previous
    }

    /// Enter WAIT-CRA and (re)arm its timer.
    pub fn set_wait_cra(&self, duration: Duration, timeout: impl FnOnce() + Send + 'static) {
        {
            let mut state = self.state.lock();
            if *state != CommunicationState::WaitCra {
                *state = CommunicationState::WaitCra;
                self.changed.notify_all();
            }
        }
        self.wait_delay_timer.stop();
        self.wait_cra_timer.start(duration, timeout);
    }

    /// Enter WAIT-DELAY and (re)arm its timer.
    pub fn set_wait_delay(&self, duration: Duration, timeout: impl FnOnce() + Send + 'static) {
        {
            let mut state = self.state.lock();
            if *state != CommunicationState::WaitDelay {
                *state = CommunicationState::WaitDelay;
                self.changed.notify_all();
            }
        }
        self.wait_cra_timer.stop();
        self.wait_delay_timer.start(duration, timeout);
    }

    /// Cancel both handshake timers.
    pub fn stop_timers(&self) {
        self.wait_cra_timer.stop();
        self.wait_delay_timer.stop();
    }

    /// Block until COMMUNICATING or the timeout elapses. A zero timeout
    /// waits indefinitely.
    pub fn wait_for_communicating(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        if timeout.is_zero() {
            while *state != CommunicationState::Communicating {
                self.changed.wait(&mut state);
            }
            return true;
        }

        let deadline = Instant::now() + timeout;
        while *state != CommunicationState::Communicating {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let _ = self.changed.wait_for(&mut state, deadline - now);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn set_state_reports_previous() {
        let sm = CommunicationStateMachine::new();
        assert_eq!(sm.state(), CommunicationState::Disabled);
        assert_eq!(
            sm.set_state(CommunicationState::NotCommunicating),
            CommunicationState::Disabled
        );
        assert_eq!(
            sm.set_state(CommunicationState::NotCommunicating),
            CommunicationState::NotCommunicating
        );
    }

    #[test]
    fn wait_cra_timer_fires_while_in_state() {
        let sm = CommunicationStateMachine::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        sm.set_wait_cra(Duration::from_millis(20), move || {
            flag.store(true, Ordering::SeqCst);
        });
        assert_eq!(sm.state(), CommunicationState::WaitCra);

        thread::sleep(Duration::from_millis(150));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn leaving_the_state_cancels_the_timer() {
        let sm = CommunicationStateMachine::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        sm.set_wait_delay(Duration::from_millis(50), move || {
            flag.store(true, Ordering::SeqCst);
        });
        sm.set_state(CommunicationState::Communicating);

        thread::sleep(Duration::from_millis(150));
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[test]
    fn waiters_wake_on_communicating() {
        let sm = Arc::new(CommunicationStateMachine::new());
        sm.set_state(CommunicationState::NotCommunicating);

        let waiter = sm.clone();
        let join = thread::spawn(move || waiter.wait_for_communicating(Duration::from_secs(5)));

        thread::sleep(Duration::from_millis(30));
        sm.set_state(CommunicationState::Communicating);
        assert!(join.join().unwrap());
    }

    #[test]
    fn wait_times_out() {
        let sm = CommunicationStateMachine::new();
        assert!(!sm.wait_for_communicating(Duration::from_millis(30)));
    }
}
