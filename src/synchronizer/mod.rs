// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The shadow synchronizer.
//!
//! A [`ShadowSynchronizer`] owns the connection lifecycle for one thing,
//! routes inbound shadow documents into a [`DeviceSnapshot`] and publishes
//! desired-state changes. All broker-driven work happens on a background
//! driver task; the public methods never block.
//!
//! # Connection lifecycle
//!
//! ```text
//! Disconnected | Refused | Error --start()--> Connecting
//! Connecting --connack--> Connected
//! Connecting --refused--> Refused
//! Connecting --failure / timeout--> Error
//! Connected --connection lost--> Disconnected
//! ```
//!
//! On every successful connect the synchronizer subscribes to
//! `get/accepted`, publishes an empty `get` request, subscribes to
//! `update/documents` and then replays any desired updates queued while it
//! was offline.
//!
//! # Observer context
//!
//! Observers run on the driver task, after the synchronizer's lock has been
//! released. The next document is not merged until every observer has
//! returned, so observers must not block. `stop()` reports its
//! `Disconnected` transition on the calling thread, and a failed
//! `request_desired_change()` reports its failure on the calling thread.

mod driver;

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast;

use crate::config::SyncConfig;
use crate::error::{Error, ProtocolError, Result};
use crate::event::{EventBus, Failure, ShadowEvent, ShadowMetadata};
use crate::shadow::{
    GET_REQUEST, ShadowDocument, ShadowTopic, ShadowTopics, decode_get_accepted,
    decode_rejection, decode_update_documents, encode_desired,
};
use crate::subscription::{CallbackRegistry, SubscriptionId};
use crate::transport::ShadowTransport;
use crate::types::{ConnectionState, DesiredUpdate, DeviceSnapshot};

/// What happened to a desired update handed to
/// [`ShadowSynchronizer::request_desired_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The update was handed to the transport.
    Published,
    /// The synchronizer is offline; the update will be published after the
    /// next successful connect.
    Queued,
}

/// Keeps a local mirror of one device shadow in sync over MQTT.
///
/// The handle is cheap to clone; clones share the same connection,
/// snapshot and observers.
///
/// # Examples
///
/// ```no_run
/// use shadow_sync::{ShadowSynchronizer, SyncConfig};
/// use shadow_sync::config::BrokerConfig;
/// use shadow_sync::transport::MqttTransport;
///
/// #[tokio::main]
/// async fn main() -> shadow_sync::Result<()> {
///     let config = SyncConfig::new("porch-sensor")
///         .with_broker(BrokerConfig::new("mqtts://broker.example.com:8883"));
///     let transport = MqttTransport::new(config.broker.clone())?;
///     let sync = ShadowSynchronizer::new(config, transport)?;
///
///     sync.on_snapshot_changed(|snapshot| {
///         println!("{:.2} C, LED {}", snapshot.temperature(), snapshot.led_level());
///     });
///
///     sync.start()?;
///     sync.set_led(true)?;
///     Ok(())
/// }
/// ```
pub struct ShadowSynchronizer<T: ShadowTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: ShadowTransport> Clone for ShadowSynchronizer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(crate) struct Inner<T> {
    config: SyncConfig,
    topics: ShadowTopics,
    transport: T,
    state: Mutex<State>,
    callbacks: CallbackRegistry,
    events: EventBus,
}

#[derive(Debug, Default)]
struct State {
    connection: ConnectionState,
    snapshot: DeviceSnapshot,
    pending: VecDeque<DesiredUpdate>,
    /// Bumped by `start()` and `stop()`; driver tasks of older generations
    /// stop acting.
    generation: u64,
    /// Reconnect attempts made since the last successful connect.
    attempt: u32,
}

impl<T: ShadowTransport> ShadowSynchronizer<T> {
    /// Creates a synchronizer in the `Disconnected` state.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the configuration is invalid.
    pub fn new(config: SyncConfig, transport: T) -> Result<Self> {
        config.validate()?;
        let topics = config.topics()?;

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                topics,
                transport,
                state: Mutex::new(State::default()),
                callbacks: CallbackRegistry::new(),
                events: EventBus::new(),
            }),
        })
    }

    /// Starts connecting in the background.
    ///
    /// Does nothing while already connecting or connected. Progress is
    /// reported through connection observers and the event stream.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::ConnectionFailed` if called outside a tokio
    /// runtime.
    pub fn start(&self) -> Result<()> {
        let handle = Handle::try_current().map_err(|_| {
            ProtocolError::ConnectionFailed("start() requires a tokio runtime".to_string())
        })?;

        let generation = {
            let mut state = self.inner.state.lock();
            if state.connection.is_active() {
                tracing::debug!(
                    thing = %self.inner.topics.thing_name(),
                    state = %state.connection,
                    "start() ignored, already active"
                );
                return Ok(());
            }
            state.generation += 1;
            state.attempt = 0;
            state.connection = ConnectionState::Connecting;
            state.generation
        };

        tracing::debug!(
            thing = %self.inner.topics.thing_name(),
            transport = self.inner.transport.name(),
            generation,
            "Starting synchronizer"
        );
        handle.spawn(driver::run(Arc::clone(&self.inner), generation));
        Ok(())
    }

    /// Disconnects and cancels any scheduled reconnect.
    ///
    /// The snapshot and any queued desired updates are kept.
    pub fn stop(&self) {
        let previous = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            state.attempt = 0;
            std::mem::replace(&mut state.connection, ConnectionState::Disconnected)
        };

        if let Err(e) = self.inner.transport.disconnect() {
            tracing::warn!(error = %e, "Failed to request disconnect");
        }

        if previous != ConnectionState::Disconnected {
            tracing::info!(thing = %self.inner.topics.thing_name(), "Synchronizer stopped");
            self.inner.notify_connection(ConnectionState::Disconnected);
        }
    }

    /// Requests a desired-state change.
    ///
    /// While connected the update is published at once. While offline it is
    /// queued (dropping the oldest queued update when full) and published
    /// after the next successful connect.
    ///
    /// # Errors
    ///
    /// - `Error::NotConnected` if offline and queueing is disabled
    /// - `Error::Protocol` if the transport rejected the publish
    pub fn request_desired_change(&self, update: DesiredUpdate) -> Result<Disposition> {
        let mut state = self.inner.state.lock();

        if state.connection.is_connected() {
            // Published under the lock so concurrent requests keep their order.
            let result = self.inner.publish_update(&update);
            drop(state);
            return match result {
                Ok(()) => Ok(Disposition::Published),
                Err(e) => {
                    self.inner
                        .emit_failure(request_failure(&self.inner.topics.update(), &e));
                    Err(e)
                }
            };
        }

        let capacity = self.inner.config.pending_capacity;
        if capacity == 0 {
            drop(state);
            tracing::warn!(
                thing = %self.inner.topics.thing_name(),
                "Desired update dropped, not connected"
            );
            self.inner.emit_failure(Failure::NotConnected);
            return Err(Error::NotConnected);
        }

        if state.pending.len() >= capacity
            && let Some(dropped) = state.pending.pop_front()
        {
            tracing::warn!(?dropped, capacity, "Pending queue full, dropping oldest update");
        }
        state.pending.push_back(update);
        tracing::debug!(
            pending = state.pending.len(),
            state = %state.connection,
            "Desired update queued"
        );
        Ok(Disposition::Queued)
    }

    /// Requests the LED to be switched fully on or off.
    ///
    /// # Errors
    ///
    /// See [`request_desired_change`](Self::request_desired_change).
    pub fn set_led(&self, on: bool) -> Result<Disposition> {
        self.request_desired_change(DesiredUpdate::led_power(on))
    }

    /// Returns the last known snapshot.
    #[must_use]
    pub fn current_snapshot(&self) -> DeviceSnapshot {
        self.inner.state.lock().snapshot
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state.lock().connection
    }

    /// Returns the number of desired updates waiting for a connection.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Registers an observer for snapshot changes.
    pub fn on_snapshot_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(DeviceSnapshot) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_snapshot_changed(callback)
    }

    /// Registers an observer for connection state changes.
    pub fn on_connection_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_connection_changed(callback)
    }

    /// Registers an observer for handled failures.
    pub fn on_failure<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Failure) + Send + Sync + 'static,
    {
        self.inner.callbacks.on_failure(callback)
    }

    /// Removes an observer. Returns `true` if it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.callbacks.unsubscribe(id)
    }

    /// Subscribes to the typed event stream.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<ShadowEvent> {
        self.inner.events.subscribe()
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Returns the shadow topics in use.
    #[must_use]
    pub fn topics(&self) -> &ShadowTopics {
        &self.inner.topics
    }

    /// Returns the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }
}

impl<T: ShadowTransport> std::fmt::Debug for ShadowSynchronizer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ShadowSynchronizer")
            .field("thing_name", &self.inner.topics.thing_name())
            .field("transport", &self.inner.transport.name())
            .field("connection", &state.connection)
            .field("snapshot", &state.snapshot)
            .field("pending", &state.pending.len())
            .finish_non_exhaustive()
    }
}

impl<T: ShadowTransport> Inner<T> {
    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().generation == generation
    }

    fn notify_connection(&self, state: ConnectionState) {
        self.callbacks.dispatch_connection(state);
        self.events.publish(ShadowEvent::ConnectionChanged { state });
    }

    fn emit_failure(&self, failure: Failure) {
        self.callbacks.dispatch_failure(&failure);
        self.events.publish(ShadowEvent::Failure(failure));
    }

    fn publish_update(&self, update: &DesiredUpdate) -> Result<()> {
        let payload = encode_desired(update)?;
        let topic = self.topics.update();
        self.transport.publish(&topic, &payload, self.config.qos)?;
        tracing::debug!(topic = %topic, led = ?update.led(), "Desired update published");
        Ok(())
    }

    fn subscribe_topic(&self, topic: &str) -> std::result::Result<(), Failure> {
        self.transport
            .subscribe(topic, self.config.qos)
            .map_err(|e| request_failure(topic, &e.into()))?;
        tracing::debug!(topic = %topic, "Subscribed");
        Ok(())
    }

    /// Runs the on-connect sequence and replays queued updates.
    fn on_connected(&self, generation: u64) {
        tracing::info!(
            thing = %self.topics.thing_name(),
            transport = self.transport.name(),
            "Connected to broker"
        );

        let mut failures = Vec::new();
        let mut run = |result: std::result::Result<(), Failure>| {
            if let Err(failure) = result {
                failures.push(failure);
            }
        };

        run(self.subscribe_topic(&self.topics.get_accepted()));
        if self.config.watch_rejections {
            run(self.subscribe_topic(&self.topics.inbound(ShadowTopic::GetRejected)));
        }
        let get = self.topics.get();
        run(self
            .transport
            .publish(&get, GET_REQUEST, self.config.qos)
            .map_err(|e| request_failure(&get, &e.into())));
        run(self.subscribe_topic(&self.topics.update_documents()));
        if self.config.watch_rejections {
            run(self.subscribe_topic(&self.topics.inbound(ShadowTopic::UpdateRejected)));
        }

        let connected = {
            let mut state = self.state.lock();
            if state.generation == generation {
                let replayed = state.pending.len();
                while let Some(update) = state.pending.pop_front() {
                    if let Err(e) = self.publish_update(&update) {
                        failures.push(request_failure(&self.topics.update(), &e));
                    }
                }
                if replayed > 0 {
                    tracing::debug!(replayed, "Replayed queued desired updates");
                }
                state.connection = ConnectionState::Connected;
                state.attempt = 0;
                true
            } else {
                false
            }
        };

        for failure in failures {
            tracing::warn!(%failure, "On-connect request failed");
            self.emit_failure(failure);
        }
        if connected {
            self.notify_connection(ConnectionState::Connected);
        }
    }

    /// Routes an inbound message by topic.
    fn handle_message(&self, topic: &str, payload: &[u8]) {
        match self.topics.classify(topic) {
            Some(ShadowTopic::GetAccepted) => self.merge(topic, decode_get_accepted(payload)),
            Some(ShadowTopic::UpdateDocuments) => {
                self.merge(topic, decode_update_documents(payload));
            }
            Some(ShadowTopic::GetRejected | ShadowTopic::UpdateRejected)
                if self.config.watch_rejections =>
            {
                self.handle_rejection(topic, payload);
            }
            _ => tracing::trace!(topic = %topic, "Ignoring message on unhandled topic"),
        }
    }

    fn merge(
        &self,
        topic: &str,
        decoded: std::result::Result<ShadowDocument, crate::error::DecodeError>,
    ) {
        let document = match decoded {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Dropping shadow document");
                self.emit_failure(Failure::Decode {
                    topic: topic.to_string(),
                    reason: e.to_string(),
                });
                return;
            }
        };

        let snapshot = {
            let mut state = self.state.lock();
            state.snapshot = state.snapshot.merged(&document.reported);
            state.snapshot
        };
        tracing::debug!(
            topic = %topic,
            version = ?document.version,
            temperature = snapshot.temperature(),
            humidity = snapshot.humidity(),
            led = snapshot.led_level(),
            "Snapshot updated"
        );

        self.callbacks.dispatch_snapshot(snapshot);
        self.events.publish(ShadowEvent::SnapshotChanged {
            snapshot,
            metadata: ShadowMetadata::from_document(&document),
        });
    }

    fn handle_rejection(&self, topic: &str, payload: &[u8]) {
        let failure = match decode_rejection(payload) {
            Ok(rejection) => Failure::Rejected {
                topic: topic.to_string(),
                code: rejection.code,
                message: rejection.message,
            },
            Err(e) => Failure::Decode {
                topic: topic.to_string(),
                reason: e.to_string(),
            },
        };
        tracing::warn!(%failure, "Shadow request rejected");
        self.emit_failure(failure);
    }
}

fn request_failure(topic: &str, error: &Error) -> Failure {
    Failure::Request {
        topic: topic.to_string(),
        reason: error.to_string(),
    }
}
