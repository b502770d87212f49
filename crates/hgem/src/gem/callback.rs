// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Callback registries for the GEM event channels.

use parking_lot::Mutex;
use std::sync::Arc;

/// A registry of callbacks for one event channel.
///
/// `fire` clones the callback list under a short lock and invokes the
/// callbacks after releasing it, so callbacks may re-enter the handler.
/// Callbacks run on whichever engine thread fires the event and must not
/// block indefinitely.
pub struct Event<T> {
    callbacks: Mutex<Vec<Arc<dyn Fn(&T) + Send + Sync>>>,
}

impl<T> Event<T> {
    pub fn new() -> Event<T> {
        Event {
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Register a callback on this channel.
    pub fn add_callback(&self, callback: impl Fn(&T) + Send + Sync + 'static) {
        self.callbacks.lock().push(Arc::new(callback));
    }

    /// Invoke every registered callback with `payload`.
    pub fn fire(&self, payload: &T) {
        let snapshot: Vec<_> = self.callbacks.lock().clone();
        for callback in snapshot {
            callback(payload);
        }
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// True when no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.callbacks.lock().is_empty()
    }
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn fire_invokes_all_callbacks() {
        let event: Event<u32> = Event::new();
        let total = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let total = total.clone();
            event.add_callback(move |value| {
                total.fetch_add(*value, Ordering::SeqCst);
            });
        }

        event.fire(&5);
        assert_eq!(total.load(Ordering::SeqCst), 15);
        assert_eq!(event.len(), 3);
    }

    #[test]
    fn callback_may_register_more_callbacks() {
        let event: Arc<Event<()>> = Arc::new(Event::new());
        let nested = event.clone();
        event.add_callback(move |_| {
            nested.add_callback(|_| {});
        });

        event.fire(&());
        assert_eq!(event.len(), 2);
    }

    #[test]
    fn empty_event_is_harmless() {
        let event: Event<String> = Event::new();
        assert!(event.is_empty());
        event.fire(&"nothing".to_string());
    }
}
