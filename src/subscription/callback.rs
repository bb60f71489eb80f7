// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback management for synchronizer observers.
//!
//! - [`SubscriptionId`] - Unique identifier for unsubscribing
//! - [`CallbackRegistry`] - Registry for storing and dispatching callbacks

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::event::Failure;
use crate::types::{ConnectionState, DeviceSnapshot};

/// Unique identifier for a subscription.
///
/// IDs are unique within a registry's lifetime and increase with
/// registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

type SnapshotCallback = Arc<dyn Fn(DeviceSnapshot) + Send + Sync>;

type ConnectionCallback = Arc<dyn Fn(ConnectionState) + Send + Sync>;

type FailureCallback = Arc<dyn Fn(&Failure) + Send + Sync>;

/// Registry of snapshot, connection and failure observers.
///
/// Callbacks run in registration order. The registry lock is released
/// before any callback runs, so a callback may register or unsubscribe
/// observers itself.
pub struct CallbackRegistry {
    next_id: AtomicU64,
    snapshot_callbacks: RwLock<BTreeMap<SubscriptionId, SnapshotCallback>>,
    connection_callbacks: RwLock<BTreeMap<SubscriptionId, ConnectionCallback>>,
    failure_callbacks: RwLock<BTreeMap<SubscriptionId, FailureCallback>>,
}

impl CallbackRegistry {
    /// Creates a new empty callback registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            snapshot_callbacks: RwLock::new(BTreeMap::new()),
            connection_callbacks: RwLock::new(BTreeMap::new()),
            failure_callbacks: RwLock::new(BTreeMap::new()),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // =========================================================================
    // Registration methods
    // =========================================================================

    /// Registers a callback for snapshot changes.
    pub fn on_snapshot_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(DeviceSnapshot) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.snapshot_callbacks.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for connection state changes.
    pub fn on_connection_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.connection_callbacks
            .write()
            .insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for handled failures.
    pub fn on_failure<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Failure) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.failure_callbacks.write().insert(id, Arc::new(callback));
        id
    }

    /// Unregisters a callback by its subscription ID.
    ///
    /// Returns `true` if a callback was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.snapshot_callbacks.write().remove(&id).is_some()
            || self.connection_callbacks.write().remove(&id).is_some()
            || self.failure_callbacks.write().remove(&id).is_some()
    }

    /// Clears all callbacks.
    pub fn clear(&self) {
        self.snapshot_callbacks.write().clear();
        self.connection_callbacks.write().clear();
        self.failure_callbacks.write().clear();
    }

    // =========================================================================
    // Dispatch methods
    // =========================================================================

    /// Calls every snapshot callback with `snapshot`.
    pub fn dispatch_snapshot(&self, snapshot: DeviceSnapshot) {
        let callbacks: Vec<_> = self.snapshot_callbacks.read().values().cloned().collect();
        for callback in callbacks {
            callback(snapshot);
        }
    }

    /// Calls every connection callback with `state`.
    pub fn dispatch_connection(&self, state: ConnectionState) {
        let callbacks: Vec<_> = self.connection_callbacks.read().values().cloned().collect();
        for callback in callbacks {
            callback(state);
        }
    }

    /// Calls every failure callback with `failure`.
    pub fn dispatch_failure(&self, failure: &Failure) {
        let callbacks: Vec<_> = self.failure_callbacks.read().values().cloned().collect();
        for callback in callbacks {
            callback(failure);
        }
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Returns the total number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.snapshot_callbacks.read().len()
            + self.connection_callbacks.read().len()
            + self.failure_callbacks.read().len()
    }

    /// Returns `true` if there are no registered callbacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callback_count() == 0
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callback_count", &self.callback_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn subscription_ids_are_unique() {
        let registry = CallbackRegistry::new();
        let a = registry.on_snapshot_changed(|_| {});
        let b = registry.on_connection_changed(|_| {});
        let c = registry.on_failure(|_| {});
        assert!(a < b && b < c);
        assert_eq!(a.to_string(), format!("Sub({})", a.value()));
    }

    #[test]
    fn snapshot_dispatch_reaches_all_observers() {
        let registry = CallbackRegistry::new();
        let counter = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            registry.on_snapshot_changed(move |snapshot| {
                assert_eq!(snapshot.led_level(), 100);
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        registry.dispatch_snapshot(DeviceSnapshot::new(0.0, 0.0, 100));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let registry = CallbackRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            registry.on_connection_changed(move |_| order.lock().push(tag));
        }

        registry.dispatch_connection(ConnectionState::Connected);
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn unsubscribed_observer_is_not_called() {
        let registry = CallbackRegistry::new();
        let counter = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&counter);
        let id = registry.on_failure(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        registry.dispatch_failure(&Failure::NotConnected);
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        registry.dispatch_failure(&Failure::NotConnected);

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let registry = Arc::new(CallbackRegistry::new());
        let slot = Arc::new(Mutex::new(None::<SubscriptionId>));
        let counter = Arc::new(AtomicU32::new(0));

        let id = {
            let registry = Arc::clone(&registry);
            let slot = Arc::clone(&slot);
            let counter = Arc::clone(&counter);
            registry.clone().on_snapshot_changed(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = slot.lock().take() {
                    registry.unsubscribe(id);
                }
            })
        };
        *slot.lock() = Some(id);

        registry.dispatch_snapshot(DeviceSnapshot::default());
        registry.dispatch_snapshot(DeviceSnapshot::default());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_removes_everything() {
        let registry = CallbackRegistry::new();
        registry.on_snapshot_changed(|_| {});
        registry.on_failure(|_| {});
        assert_eq!(registry.callback_count(), 2);

        registry.clear();
        assert!(registry.is_empty());
    }
}
