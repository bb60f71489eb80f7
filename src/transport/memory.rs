// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process transport that stands in for a broker.
//!
//! [`MemoryTransport`] records every request it receives and lets the
//! caller play the broker's side by emitting [`TransportEvent`]s. It is
//! cheaply cloneable; clones share the same recorder and connection.
//!
//! # Examples
//!
//! ```
//! use shadow_sync::transport::{
//!     ConnectOptions, DeliveryQos, MemoryTransport, ShadowTransport, TransportEvent,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let transport = MemoryTransport::new();
//! let mut events = transport
//!     .connect(&ConnectOptions::new("demo"))
//!     .unwrap();
//!
//! transport.accept();
//! assert_eq!(events.recv().await, Some(TransportEvent::Connected));
//!
//! transport.publish("a/b", b"{}", DeliveryQos::AtMostOnce).unwrap();
//! assert_eq!(transport.published().len(), 1);
//! # }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::ProtocolError;

use super::{
    ConnectOptions, DeliveryQos, EVENT_CHANNEL_CAPACITY, ShadowTransport, TransportEvent,
};

/// A request recorded by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOp {
    /// A connection attempt.
    Connect {
        /// Client identifier used.
        client_id: String,
        /// Clean-session flag used.
        clean_session: bool,
    },
    /// A subscription.
    Subscribe {
        /// Topic filter.
        topic: String,
        /// Requested QoS.
        qos: DeliveryQos,
    },
    /// A publish.
    Publish {
        /// Topic name.
        topic: String,
        /// Payload bytes.
        payload: Vec<u8>,
        /// Requested QoS.
        qos: DeliveryQos,
    },
    /// A disconnect request.
    Disconnect,
}

/// Fake broker connection for tests and offline demos.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    ops: Vec<TransportOp>,
    events: Option<mpsc::Sender<TransportEvent>>,
    connect_error: Option<String>,
}

impl MemoryTransport {
    /// Creates a transport with no connection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `connect` call fail immediately with `reason`.
    pub fn fail_next_connect(&self, reason: impl Into<String>) {
        self.inner.lock().connect_error = Some(reason.into());
    }

    /// Emits an event on the current connection.
    ///
    /// Terminal events close the connection. Returns `false` if there is no
    /// open connection or its consumer has gone away.
    pub fn emit(&self, event: TransportEvent) -> bool {
        let mut state = self.inner.lock();
        let Some(events) = state.events.as_ref() else {
            return false;
        };
        let terminal = event.is_terminal();
        let sent = events.try_send(event).is_ok();
        if terminal {
            state.events = None;
        }
        sent
    }

    /// Emits [`TransportEvent::Connected`].
    pub fn accept(&self) -> bool {
        self.emit(TransportEvent::Connected)
    }

    /// Emits an inbound message.
    pub fn deliver(&self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> bool {
        self.emit(TransportEvent::Message {
            topic: topic.into(),
            payload: payload.into(),
        })
    }

    /// Returns `true` while a connection attempt is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.lock().events.is_some()
    }

    /// Returns every recorded request in order.
    #[must_use]
    pub fn ops(&self) -> Vec<TransportOp> {
        self.inner.lock().ops.clone()
    }

    /// Forgets all recorded requests.
    pub fn clear_ops(&self) {
        self.inner.lock().ops.clear();
    }

    /// Returns recorded publishes as `(topic, payload)` pairs.
    #[must_use]
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.inner
            .lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                TransportOp::Publish { topic, payload, .. } => {
                    Some((topic.clone(), payload.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Returns recorded subscription topics.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<String> {
        self.inner
            .lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                TransportOp::Subscribe { topic, .. } => Some(topic.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns how many connection attempts were made.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.inner
            .lock()
            .ops
            .iter()
            .filter(|op| matches!(op, TransportOp::Connect { .. }))
            .count()
    }
}

impl ShadowTransport for MemoryTransport {
    fn connect(
        &self,
        options: &ConnectOptions,
    ) -> Result<mpsc::Receiver<TransportEvent>, ProtocolError> {
        let mut state = self.inner.lock();
        state.ops.push(TransportOp::Connect {
            client_id: options.client_id.clone(),
            clean_session: options.clean_session,
        });
        if let Some(reason) = state.connect_error.take() {
            return Err(ProtocolError::ConnectionFailed(reason));
        }
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        state.events = Some(tx);
        Ok(rx)
    }

    fn publish(&self, topic: &str, payload: &[u8], qos: DeliveryQos) -> Result<(), ProtocolError> {
        let mut state = self.inner.lock();
        if state.events.is_none() {
            return Err(ProtocolError::NotConnected);
        }
        state.ops.push(TransportOp::Publish {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
        });
        Ok(())
    }

    fn subscribe(&self, topic: &str, qos: DeliveryQos) -> Result<(), ProtocolError> {
        let mut state = self.inner.lock();
        if state.events.is_none() {
            return Err(ProtocolError::NotConnected);
        }
        state.ops.push(TransportOp::Subscribe {
            topic: topic.to_string(),
            qos,
        });
        Ok(())
    }

    fn disconnect(&self) -> Result<(), ProtocolError> {
        let mut state = self.inner.lock();
        state.ops.push(TransportOp::Disconnect);
        if let Some(events) = state.events.take() {
            let _ = events.try_send(TransportEvent::Disconnected);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ConnectOptions {
        ConnectOptions::new("test-client")
    }

    #[test]
    fn requests_fail_without_connection() {
        let transport = MemoryTransport::new();
        assert!(matches!(
            transport.publish("t", b"", DeliveryQos::AtMostOnce),
            Err(ProtocolError::NotConnected)
        ));
        assert!(matches!(
            transport.subscribe("t", DeliveryQos::AtMostOnce),
            Err(ProtocolError::NotConnected)
        ));
        assert!(!transport.accept());
    }

    #[tokio::test]
    async fn records_requests_in_order() {
        let transport = MemoryTransport::new();
        let _events = transport.connect(&options()).unwrap();

        transport.subscribe("a", DeliveryQos::AtMostOnce).unwrap();
        transport
            .publish("b", b"payload", DeliveryQos::AtLeastOnce)
            .unwrap();

        assert_eq!(
            transport.ops(),
            vec![
                TransportOp::Connect {
                    client_id: "test-client".to_string(),
                    clean_session: true,
                },
                TransportOp::Subscribe {
                    topic: "a".to_string(),
                    qos: DeliveryQos::AtMostOnce,
                },
                TransportOp::Publish {
                    topic: "b".to_string(),
                    payload: b"payload".to_vec(),
                    qos: DeliveryQos::AtLeastOnce,
                },
            ]
        );
        assert_eq!(transport.subscriptions(), vec!["a".to_string()]);
        assert_eq!(transport.connect_count(), 1);
    }

    #[tokio::test]
    async fn terminal_event_closes_channel() {
        let transport = MemoryTransport::new();
        let mut events = transport.connect(&options()).unwrap();

        assert!(transport.emit(TransportEvent::Refused("not authorized".into())));
        assert!(!transport.is_open());
        assert_eq!(
            events.recv().await,
            Some(TransportEvent::Refused("not authorized".into()))
        );
        assert_eq!(events.recv().await, None);
    }

    #[test]
    fn fail_next_connect_is_one_shot() {
        let transport = MemoryTransport::new();
        transport.fail_next_connect("dns lookup failed");
        assert!(transport.connect(&options()).is_err());
        assert!(transport.connect(&options()).is_ok());
        assert_eq!(transport.connect_count(), 2);
    }

    #[tokio::test]
    async fn disconnect_emits_disconnected() {
        let transport = MemoryTransport::new();
        let mut events = transport.connect(&options()).unwrap();
        transport.accept();
        transport.disconnect().unwrap();

        assert_eq!(events.recv().await, Some(TransportEvent::Connected));
        assert_eq!(events.recv().await, Some(TransportEvent::Disconnected));
        assert_eq!(events.recv().await, None);
    }
}
