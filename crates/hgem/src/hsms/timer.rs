// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cancelable one-shot timer used for T7 and the GEM handshake waits.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A restartable one-shot timer.
///
/// Each `start` supersedes any pending expiry; `stop` cancels without firing.
/// The callback runs on a short-lived timer thread.
pub(crate) struct OneshotTimer {
    inner: Arc<TimerState>,
}

struct TimerState {
    generation: Mutex<u64>,
    cancel: Condvar,
}

impl OneshotTimer {
    pub fn new() -> OneshotTimer {
        OneshotTimer {
            inner: Arc::new(TimerState {
                generation: Mutex::new(0),
                cancel: Condvar::new(),
            }),
        }
    }

    /// Arm the timer. `callback` fires after `delay` unless superseded.
    pub fn start(&self, delay: Duration, callback: impl FnOnce() + Send + 'static) {
        let armed = {
            let mut generation = self.inner.generation.lock();
            *generation += 1;
            *generation
        };

        let state = Arc::clone(&self.inner);
        let _ = thread::Builder::new()
            .name("hgem-timer".into())
            .spawn(move || {
                let deadline = Instant::now() + delay;
                let mut generation = state.generation.lock();
                while *generation == armed {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    let _ = state.cancel.wait_for(&mut generation, deadline - now);
                }
                let fire = *generation == armed;
                drop(generation);
                if fire {
                    callback();
                }
            });
    }

    /// Cancel any pending expiry.
    pub fn stop(&self) {
        let mut generation = self.inner.generation.lock();
        *generation += 1;
        self.inner.cancel.notify_all();
    }
}
