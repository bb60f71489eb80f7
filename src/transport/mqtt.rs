// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! rumqttc-backed transport.

use std::time::Duration;

use parking_lot::Mutex;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, QoS, Transport,
};
use tokio::sync::mpsc;

use crate::config::BrokerConfig;
use crate::error::ProtocolError;

use super::{
    ConnectOptions, DeliveryQos, EVENT_CHANNEL_CAPACITY, ShadowTransport, TransportEvent,
};

/// Minimum capacity of the rumqttc request queue.
const REQUEST_QUEUE_CAPACITY: usize = 32;

/// MQTT transport built on rumqttc.
///
/// Each `connect` call creates a fresh client and event loop. The event
/// loop runs on a spawned tokio task and stops after the first terminal
/// event; reconnection is left to the caller.
///
/// # Examples
///
/// ```no_run
/// use shadow_sync::transport::MqttTransport;
///
/// # fn example() -> Result<(), shadow_sync::error::ProtocolError> {
/// let transport = MqttTransport::builder()
///     .endpoint("mqtts://broker.example.com:8883")
///     .credentials("dashboard", "secret")
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MqttTransport {
    config: BrokerConfig,
    endpoint: Endpoint,
    client: Mutex<Option<AsyncClient>>,
}

impl MqttTransport {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> MqttTransportBuilder {
        MqttTransportBuilder::default()
    }

    /// Creates a transport from broker settings.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidAddress` if the endpoint cannot be
    /// parsed.
    pub fn new(config: BrokerConfig) -> Result<Self, ProtocolError> {
        let endpoint = Endpoint::parse(&config.endpoint)?;
        Ok(Self {
            config,
            endpoint,
            client: Mutex::new(None),
        })
    }

    /// Returns the configured endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn mqtt_options(&self, options: &ConnectOptions) -> Result<MqttOptions, ProtocolError> {
        // rumqttc panics on these client ids
        if options.client_id.is_empty() || options.client_id.starts_with(' ') {
            return Err(ProtocolError::InvalidAddress(format!(
                "invalid client id: {:?}",
                options.client_id
            )));
        }

        let mut mqtt_options =
            MqttOptions::new(&options.client_id, self.endpoint.broker_addr(), self.endpoint.port);
        mqtt_options.set_keep_alive(self.config.keep_alive);
        mqtt_options.set_clean_session(options.clean_session);
        if let Some((username, password)) = self.config.credentials() {
            mqtt_options.set_credentials(username, password);
        }
        match self.endpoint.scheme {
            Scheme::Tcp => {}
            Scheme::Tls => {
                mqtt_options.set_transport(Transport::tls_with_default_config());
            }
            Scheme::Ws => {
                mqtt_options.set_transport(Transport::Ws);
            }
            Scheme::Wss => {
                mqtt_options.set_transport(Transport::wss_with_default_config());
            }
        }
        Ok(mqtt_options)
    }

    fn with_client<T>(
        &self,
        f: impl FnOnce(&AsyncClient) -> Result<T, rumqttc::ClientError>,
    ) -> Result<T, ProtocolError> {
        let client = self.client.lock();
        let client = client.as_ref().ok_or(ProtocolError::NotConnected)?;
        f(client).map_err(ProtocolError::Mqtt)
    }
}

impl ShadowTransport for MqttTransport {
    fn connect(
        &self,
        options: &ConnectOptions,
    ) -> Result<mpsc::Receiver<TransportEvent>, ProtocolError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            ProtocolError::ConnectionFailed("no tokio runtime available".to_string())
        })?;

        let mqtt_options = self.mqtt_options(options)?;
        let (client, event_loop) = AsyncClient::new(
            mqtt_options,
            request_queue_capacity(options.request_burst),
        );
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        tracing::info!(
            endpoint = %self.config.endpoint,
            client_id = %options.client_id,
            "Connecting to MQTT broker"
        );

        if let Some(previous) = self.client.lock().replace(client) {
            let _ = previous.try_disconnect();
        }

        runtime.spawn(async move {
            handle_transport_events(event_loop, events_tx).await;
        });

        Ok(events_rx)
    }

    fn publish(&self, topic: &str, payload: &[u8], qos: DeliveryQos) -> Result<(), ProtocolError> {
        tracing::debug!(topic = %topic, bytes = payload.len(), "Publishing MQTT message");
        self.with_client(|client| client.try_publish(topic, qos.into(), false, payload.to_vec()))
    }

    fn subscribe(&self, topic: &str, qos: DeliveryQos) -> Result<(), ProtocolError> {
        tracing::debug!(topic = %topic, "Subscribing to MQTT topic");
        self.with_client(|client| client.try_subscribe(topic, qos.into()))
    }

    fn disconnect(&self) -> Result<(), ProtocolError> {
        let Some(client) = self.client.lock().take() else {
            return Ok(());
        };
        tracing::info!(endpoint = %self.config.endpoint, "Disconnecting from MQTT broker");
        client.try_disconnect().map_err(ProtocolError::Mqtt)
    }

    fn name(&self) -> &'static str {
        "mqtt"
    }
}

/// Request queue capacity for an attempt expecting `burst` back-to-back
/// requests.
fn request_queue_capacity(burst: usize) -> usize {
    REQUEST_QUEUE_CAPACITY.max(burst)
}

impl From<DeliveryQos> for QoS {
    fn from(qos: DeliveryQos) -> Self {
        match qos {
            DeliveryQos::AtMostOnce => QoS::AtMostOnce,
            DeliveryQos::AtLeastOnce => QoS::AtLeastOnce,
        }
    }
}

/// Drives the rumqttc event loop for one connection attempt.
async fn handle_transport_events(mut event_loop: EventLoop, events: mpsc::Sender<TransportEvent>) {
    let mut connected = false;

    loop {
        let event = match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                if connack.code == ConnectReturnCode::Success {
                    tracing::debug!(?connack, "MQTT connected");
                    connected = true;
                    TransportEvent::Connected
                } else {
                    TransportEvent::Refused(format!("{:?}", connack.code))
                }
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
                continue;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                tracing::trace!(
                    topic = %publish.topic,
                    bytes = publish.payload.len(),
                    "MQTT message received"
                );
                TransportEvent::Message {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                }
            }
            Ok(Event::Incoming(Packet::Disconnect) | Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::info!("MQTT disconnected");
                TransportEvent::Disconnected
            }
            Ok(_) => continue,
            Err(ConnectionError::ConnectionRefused(code)) => {
                tracing::warn!(?code, "MQTT connection refused");
                TransportEvent::Refused(format!("{code:?}"))
            }
            Err(e) if connected => {
                tracing::warn!(error = %e, "MQTT connection lost");
                TransportEvent::Disconnected
            }
            Err(e) => {
                tracing::error!(error = %e, "MQTT connection failed");
                TransportEvent::Failed(e.to_string())
            }
        };

        let terminal = event.is_terminal();
        if events.send(event).await.is_err() || terminal {
            break;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scheme {
    Tcp,
    Tls,
    Ws,
    Wss,
}

/// Parsed broker endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    scheme: Scheme,
    host: String,
    port: u16,
    /// Full URL, used as the broker address for WebSocket transports.
    url: String,
}

impl Endpoint {
    fn parse(url: &str) -> Result<Self, ProtocolError> {
        let (scheme, rest) = if let Some(rest) = url.strip_prefix("mqtts://") {
            (Scheme::Tls, rest)
        } else if let Some(rest) = url.strip_prefix("ssl://") {
            (Scheme::Tls, rest)
        } else if let Some(rest) = url.strip_prefix("wss://") {
            (Scheme::Wss, rest)
        } else if let Some(rest) = url.strip_prefix("ws://") {
            (Scheme::Ws, rest)
        } else if let Some(rest) = url
            .strip_prefix("mqtt://")
            .or_else(|| url.strip_prefix("tcp://"))
        {
            (Scheme::Tcp, rest)
        } else if let Some((scheme, _)) = url.split_once("://") {
            return Err(ProtocolError::InvalidAddress(format!(
                "unsupported scheme: {scheme}"
            )));
        } else {
            (Scheme::Tcp, url)
        };

        let authority = rest.split('/').next().unwrap_or_default();
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| ProtocolError::InvalidAddress(format!("invalid port: {port}")))?;
                (host, port)
            }
            None => (authority, scheme.default_port()),
        };

        if host.is_empty() {
            return Err(ProtocolError::InvalidAddress(format!(
                "missing host in endpoint: {url:?}"
            )));
        }

        let url = match scheme {
            Scheme::Ws | Scheme::Wss => {
                let path = &rest[authority.len()..];
                let path = if path.is_empty() { "/mqtt" } else { path };
                let prefix = if scheme == Scheme::Ws { "ws" } else { "wss" };
                format!("{prefix}://{host}:{port}{path}")
            }
            Scheme::Tcp | Scheme::Tls => url.to_string(),
        };

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            url,
        })
    }

    /// Address handed to rumqttc: the host for TCP/TLS, the URL for WebSocket.
    fn broker_addr(&self) -> String {
        match self.scheme {
            Scheme::Tcp | Scheme::Tls => self.host.clone(),
            Scheme::Ws | Scheme::Wss => self.url.clone(),
        }
    }
}

impl Scheme {
    fn default_port(self) -> u16 {
        match self {
            Self::Tcp => 1883,
            Self::Tls => 8883,
            Self::Ws => 80,
            Self::Wss => 443,
        }
    }
}

/// Builder for [`MqttTransport`].
#[derive(Debug, Default)]
pub struct MqttTransportBuilder {
    config: BrokerConfig,
}

impl MqttTransportBuilder {
    /// Sets the broker endpoint URL.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config = self.config.with_credentials(username, password);
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.config.keep_alive = duration;
        self
    }

    /// Builds the transport. No connection is made until `connect`.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::InvalidAddress` if the endpoint is missing
    /// or cannot be parsed.
    pub fn build(self) -> Result<MqttTransport, ProtocolError> {
        if self.config.endpoint.is_empty() {
            return Err(ProtocolError::InvalidAddress(
                "MQTT endpoint is required".to_string(),
            ));
        }
        MqttTransport::new(self.config)
    }
}
