// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `shadow_sync` - keep a local mirror of an IoT device shadow in sync over
//! MQTT.
//!
//! The library connects to an MQTT broker hosting AWS IoT style device
//! shadows, keeps a typed [`DeviceSnapshot`] of the device's reported state
//! and publishes desired-state changes.
//!
//! # Features
//!
//! - **Snapshot mirroring**: temperature, humidity and LED level merged from
//!   `get/accepted` and `update/documents`
//! - **Desired updates**: switch the LED, queued while offline and replayed
//!   on reconnect
//! - **Observers**: snapshot, connection and failure callbacks plus a
//!   broadcast event stream
//! - **Reconnection**: optional exponential backoff
//! - **Transports**: rumqttc over TCP, TLS and WebSocket, and an in-memory
//!   transport for tests
//!
//! # Quick Start
//!
//! ```no_run
//! use shadow_sync::{ShadowSynchronizer, SyncConfig};
//! use shadow_sync::config::BrokerConfig;
//! use shadow_sync::transport::MqttTransport;
//! use shadow_sync::view::SnapshotLabels;
//!
//! #[tokio::main]
//! async fn main() -> shadow_sync::Result<()> {
//!     let config = SyncConfig::new("ChariotFall2019")
//!         .with_broker(BrokerConfig::new("wss://broker.example.com/mqtt"));
//!     let transport = MqttTransport::new(config.broker.clone())?;
//!     let sync = ShadowSynchronizer::new(config, transport)?;
//!
//!     sync.on_snapshot_changed(|snapshot| {
//!         println!("{}", SnapshotLabels::from(snapshot));
//!     });
//!     sync.on_connection_changed(|state| println!("connection {state}"));
//!
//!     sync.start()?;
//!     sync.set_led(true)?;
//!     Ok(())
//! }
//! ```
//!
//! # Event stream
//!
//! ```no_run
//! use shadow_sync::{ShadowSynchronizer, SyncConfig};
//! use shadow_sync::event::ShadowEvent;
//! use shadow_sync::transport::MemoryTransport;
//!
//! # #[tokio::main]
//! # async fn main() -> shadow_sync::Result<()> {
//! let sync = ShadowSynchronizer::new(SyncConfig::new("lamp"), MemoryTransport::new())?;
//! let mut events = sync.subscribe_events();
//! sync.start()?;
//!
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         ShadowEvent::SnapshotChanged { snapshot, metadata } => {
//!             println!("v{:?}: {snapshot:?}", metadata.version);
//!         }
//!         ShadowEvent::ConnectionChanged { state } => println!("{state}"),
//!         ShadowEvent::Failure(failure) => eprintln!("{failure}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod shadow;
pub mod subscription;
mod synchronizer;
pub mod transport;
pub mod types;
pub mod view;

pub use config::{BrokerConfig, ReconnectPolicy, SyncConfig};
pub use error::{ConfigError, DecodeError, Error, ProtocolError, Result, ValueError};
pub use event::{EventBus, Failure, ShadowEvent, ShadowMetadata};
pub use subscription::SubscriptionId;
pub use synchronizer::{Disposition, ShadowSynchronizer};
pub use transport::{MemoryTransport, ShadowTransport, TransportEvent};
#[cfg(feature = "mqtt")]
pub use transport::{MqttTransport, MqttTransportBuilder};
pub use types::{ConnectionState, DesiredUpdate, DeviceSnapshot, LedLevel};
