// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT transports for the shadow synchronizer.
//!
//! The synchronizer talks to the broker through the [`ShadowTransport`]
//! trait. A connection attempt hands back a channel of [`TransportEvent`]s;
//! publish and subscribe never wait for the network.
//!
//! # Transports
//!
//! - [`MqttTransport`]: rumqttc client (TCP, TLS, WebSocket)
//! - [`MemoryTransport`]: in-process fake that records every request

mod memory;
#[cfg(feature = "mqtt")]
mod mqtt;

pub use memory::{MemoryTransport, TransportOp};
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttTransport, MqttTransportBuilder};

use tokio::sync::mpsc;

use crate::error::ProtocolError;

/// Capacity of the event channel between a transport and its consumer.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// MQTT delivery guarantee for a publish or subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryQos {
    /// QoS 0: fire and forget. May be lost, never duplicated.
    #[default]
    AtMostOnce,
    /// QoS 1: acknowledged, may be duplicated.
    AtLeastOnce,
}

/// Per-attempt connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// MQTT client identifier.
    pub client_id: String,
    /// Whether the broker should discard previous session state.
    pub clean_session: bool,
    /// Requests the caller may enqueue back to back once connected.
    ///
    /// Transports with a bounded request queue size it to hold at least
    /// this many requests.
    pub request_burst: usize,
}

impl ConnectOptions {
    /// Creates options for `client_id` with a clean session.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            clean_session: true,
            request_burst: 0,
        }
    }

    /// Sets whether the broker should discard previous session state.
    #[must_use]
    pub fn with_clean_session(mut self, clean: bool) -> Self {
        self.clean_session = clean;
        self
    }

    /// Sets the number of requests enqueued back to back once connected.
    #[must_use]
    pub fn with_request_burst(mut self, burst: usize) -> Self {
        self.request_burst = burst;
        self
    }
}

/// Events reported by a transport for one connection attempt.
///
/// After `Refused`, `Failed` or `Disconnected` the attempt is over and the
/// channel is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The broker accepted the connection.
    Connected,
    /// The broker refused the connection.
    Refused(String),
    /// The attempt failed before the broker accepted it.
    Failed(String),
    /// An established connection was closed.
    Disconnected,
    /// A message arrived on a subscribed topic.
    Message {
        /// Topic the message was published on.
        topic: String,
        /// Raw payload bytes.
        payload: Vec<u8>,
    },
}

impl TransportEvent {
    /// Returns `true` if this event ends the connection attempt.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Refused(_) | Self::Failed(_) | Self::Disconnected
        )
    }
}

/// Broker connection capability used by the synchronizer.
///
/// Implementations must not block: `connect` starts the attempt in the
/// background and returns the event channel, while `publish` and
/// `subscribe` only enqueue the request.
pub trait ShadowTransport: Send + Sync + 'static {
    /// Starts a new connection attempt.
    ///
    /// Any previous connection is abandoned.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the attempt cannot be started at all.
    fn connect(
        &self,
        options: &ConnectOptions,
    ) -> Result<mpsc::Receiver<TransportEvent>, ProtocolError>;

    /// Enqueues a publish.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if there is no connection or the request
    /// queue is full.
    fn publish(&self, topic: &str, payload: &[u8], qos: DeliveryQos) -> Result<(), ProtocolError>;

    /// Enqueues a subscription.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if there is no connection or the request
    /// queue is full.
    fn subscribe(&self, topic: &str, qos: DeliveryQos) -> Result<(), ProtocolError>;

    /// Closes the current connection, if any.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the disconnect request cannot be queued.
    fn disconnect(&self) -> Result<(), ProtocolError>;

    /// Human-readable transport name for logging.
    fn name(&self) -> &'static str;
}
