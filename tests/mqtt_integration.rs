// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the rumqttc transport using mockforge-mqtt.

#![cfg(feature = "mqtt")]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mockforge_mqtt::broker::MqttConfig;
use mockforge_mqtt::start_mqtt_server;
use shadow_sync::config::BrokerConfig;
use shadow_sync::event::ShadowEvent;
use shadow_sync::transport::{ConnectOptions, MqttTransport, ShadowTransport, TransportEvent};
use shadow_sync::{ConnectionState, Disposition, ShadowSynchronizer, SyncConfig};
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};

/// Helper to find an available port for testing.
fn get_test_port() -> u16 {
    use std::sync::atomic::AtomicU16;
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18850);
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Starts a mock MQTT broker on the given port.
async fn start_mock_broker(port: u16) {
    let config = MqttConfig {
        port,
        host: "127.0.0.1".to_string(),
        ..Default::default()
    };

    tokio::spawn(async move {
        let _ = start_mqtt_server(config).await;
    });

    // Give the broker time to bind
    sleep(Duration::from_millis(500)).await;
}

async fn wait_for_state(
    events: &mut broadcast::Receiver<ShadowEvent>,
    state: ConnectionState,
) -> bool {
    let wait = async {
        while let Ok(event) = events.recv().await {
            if event.connection_state() == Some(state) {
                return true;
            }
        }
        false
    };
    timeout(Duration::from_secs(10), wait).await.unwrap_or(false)
}

// ============================================================================
// Transport
// ============================================================================

mod transport {
    use super::*;

    #[tokio::test]
    async fn connect_reports_connected() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let transport =
            MqttTransport::new(BrokerConfig::new(format!("mqtt://127.0.0.1:{port}"))).unwrap();
        let mut events = transport
            .connect(&ConnectOptions::new("shadow-transport-test"))
            .unwrap();

        let first = timeout(Duration::from_secs(10), events.recv()).await;
        assert_eq!(first.ok().flatten(), Some(TransportEvent::Connected));

        transport.disconnect().unwrap();
    }

    #[tokio::test]
    async fn connect_without_scheme() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let transport = MqttTransport::builder()
            .endpoint(format!("127.0.0.1:{port}"))
            .keep_alive(Duration::from_secs(10))
            .build()
            .unwrap();
        let mut events = transport
            .connect(&ConnectOptions::new("shadow-no-scheme"))
            .unwrap();

        let first = timeout(Duration::from_secs(10), events.recv()).await;
        assert_eq!(first.ok().flatten(), Some(TransportEvent::Connected));
    }

    #[tokio::test]
    async fn unreachable_broker_fails() {
        // Nothing listens on this port
        let port = get_test_port();

        let transport =
            MqttTransport::new(BrokerConfig::new(format!("tcp://127.0.0.1:{port}"))).unwrap();
        let mut events = transport
            .connect(&ConnectOptions::new("shadow-unreachable"))
            .unwrap();

        let first = timeout(Duration::from_secs(10), events.recv())
            .await
            .ok()
            .flatten();
        assert!(
            matches!(first, Some(TransportEvent::Failed(_))),
            "unexpected event {first:?}"
        );
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        assert!(MqttTransport::new(BrokerConfig::new("http://127.0.0.1:1883")).is_err());
        assert!(MqttTransport::new(BrokerConfig::new("mqtt://127.0.0.1:notaport")).is_err());
    }
}

// ============================================================================
// Synchronizer over MQTT
// ============================================================================

mod synchronizer {
    use super::*;

    #[tokio::test]
    async fn reaches_connected_and_publishes() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let config = SyncConfig::new("ChariotFall2019")
            .with_client_id("shadow-sync-test")
            .with_broker(BrokerConfig::new(format!("mqtt://127.0.0.1:{port}")));
        let transport = MqttTransport::new(config.broker.clone()).unwrap();
        let sync = ShadowSynchronizer::new(config, transport).unwrap();
        let mut events = sync.subscribe_events();

        sync.start().unwrap();
        assert!(wait_for_state(&mut events, ConnectionState::Connected).await);
        assert_eq!(sync.set_led(true).unwrap(), Disposition::Published);

        sync.stop();
        assert_eq!(sync.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn replays_more_updates_than_default_request_queue() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let config = SyncConfig::new("ChariotFall2019")
            .with_client_id("shadow-sync-replay")
            .with_pending_capacity(64)
            .with_broker(BrokerConfig::new(format!("mqtt://127.0.0.1:{port}")));
        let transport = MqttTransport::new(config.broker.clone()).unwrap();
        let sync = ShadowSynchronizer::new(config, transport).unwrap();
        let mut events = sync.subscribe_events();

        let failures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&failures);
        sync.on_failure(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        for i in 0..50 {
            assert_eq!(sync.set_led(i % 2 == 0).unwrap(), Disposition::Queued);
        }
        assert_eq!(sync.pending_count(), 50);

        sync.start().unwrap();
        assert!(wait_for_state(&mut events, ConnectionState::Connected).await);

        assert_eq!(sync.pending_count(), 0);
        assert_eq!(failures.load(Ordering::SeqCst), 0);
        sync.stop();
    }

    #[tokio::test]
    async fn unreachable_broker_moves_to_error() {
        let port = get_test_port();

        let config = SyncConfig::new("ChariotFall2019")
            .with_broker(BrokerConfig::new(format!("mqtt://127.0.0.1:{port}")));
        let transport = MqttTransport::new(config.broker.clone()).unwrap();
        let sync = ShadowSynchronizer::new(config, transport).unwrap();
        let mut events = sync.subscribe_events();

        sync.start().unwrap();
        assert!(wait_for_state(&mut events, ConnectionState::Error).await);
        assert_eq!(sync.set_led(true).unwrap(), Disposition::Queued);
    }
}
