// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Synchronizer configuration.
//!
//! Configuration can be assembled in code with the `with_*` methods or
//! loaded from JSON. Durations are expressed in milliseconds in JSON.
//!
//! ```json
//! {
//!   "thing_name": "porch-sensor",
//!   "client_id": "porch-dashboard",
//!   "connect_timeout_ms": 10000,
//!   "broker": {
//!     "endpoint": "mqtts://broker.example.com:8883",
//!     "username": "dashboard",
//!     "password": "secret"
//!   },
//!   "reconnect": { "enabled": true, "max_retries": 5 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::shadow::ShadowTopics;
use crate::transport::{ConnectOptions, DeliveryQos};

/// Default number of desired updates held while disconnected.
pub const DEFAULT_PENDING_CAPACITY: usize = 16;

/// Most requests issued on connect before the pending queue is replayed.
const ON_CONNECT_REQUESTS: usize = 5;

/// Configuration for a [`ShadowSynchronizer`](crate::ShadowSynchronizer).
///
/// The default client id is a fresh `shadow-sync-<uuid>` for every
/// configuration, so each process connects as a new client. Brokers that
/// keep persistent sessions (`clean_session = false`) or authorize by
/// client id need a stable identity: set it with
/// [`with_client_id`](Self::with_client_id) or the `client_id` JSON field.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use shadow_sync::config::{ReconnectPolicy, SyncConfig};
///
/// let config = SyncConfig::new("porch-sensor")
///     .with_client_id("porch-dashboard")
///     .with_connect_timeout(Duration::from_secs(5))
///     .with_reconnect(ReconnectPolicy::enabled().with_max_retries(3));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Device identifier used in shadow topics.
    pub thing_name: String,
    /// MQTT client identifier.
    pub client_id: String,
    /// Whether to request a clean MQTT session.
    pub clean_session: bool,
    /// Upper bound on the connecting phase.
    #[serde(rename = "connect_timeout_ms", with = "duration_ms")]
    pub connect_timeout: Duration,
    /// QoS used for every publish and subscription.
    pub qos: DeliveryQos,
    /// Desired updates kept while disconnected (0 disables queueing).
    pub pending_capacity: usize,
    /// Also subscribe to the `get/rejected` and `update/rejected` topics.
    pub watch_rejections: bool,
    /// Automatic reconnection policy.
    pub reconnect: ReconnectPolicy,
    /// Broker connection settings.
    pub broker: BrokerConfig,
}

impl SyncConfig {
    /// Creates a configuration for `thing_name` with default settings.
    #[must_use]
    pub fn new(thing_name: impl Into<String>) -> Self {
        Self {
            thing_name: thing_name.into(),
            ..Self::default()
        }
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, is not valid JSON
    /// or fails validation.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Parses a configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the text is not valid JSON or fails
    /// validation.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the MQTT client identifier.
    ///
    /// Use a fixed value to reconnect as the same client across restarts.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Sets the clean-session flag.
    #[must_use]
    pub fn with_clean_session(mut self, clean_session: bool) -> Self {
        self.clean_session = clean_session;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the QoS for publishes and subscriptions.
    #[must_use]
    pub fn with_qos(mut self, qos: DeliveryQos) -> Self {
        self.qos = qos;
        self
    }

    /// Sets how many desired updates are queued while disconnected.
    #[must_use]
    pub fn with_pending_capacity(mut self, capacity: usize) -> Self {
        self.pending_capacity = capacity;
        self
    }

    /// Enables or disables the rejection topics.
    #[must_use]
    pub fn with_watch_rejections(mut self, watch: bool) -> Self {
        self.watch_rejections = watch;
        self
    }

    /// Sets the reconnection policy.
    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Sets the broker settings.
    #[must_use]
    pub fn with_broker(mut self, broker: BrokerConfig) -> Self {
        self.broker = broker;
        self
    }

    /// Checks that required settings are present.
    ///
    /// The broker endpoint is not checked here; it is only needed by
    /// [`MqttTransport`](crate::transport::MqttTransport).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an empty client id or an unusable thing
    /// name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("client_id"));
        }
        self.topics().map(|_| ())
    }

    /// Builds the shadow topic set for the configured thing.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the thing name is empty or invalid.
    pub fn topics(&self) -> Result<ShadowTopics, ConfigError> {
        ShadowTopics::new(self.thing_name.clone())
    }

    /// Connect parameters for one attempt.
    ///
    /// The request burst covers the on-connect subscriptions and get
    /// request plus a full replay of the pending queue.
    pub(crate) fn connect_options(&self) -> ConnectOptions {
        ConnectOptions::new(self.client_id.clone())
            .with_clean_session(self.clean_session)
            .with_request_burst(ON_CONNECT_REQUESTS.saturating_add(self.pending_capacity))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            thing_name: String::new(),
            client_id: generated_client_id(),
            clean_session: true,
            connect_timeout: Duration::from_secs(10),
            qos: DeliveryQos::AtMostOnce,
            pending_capacity: DEFAULT_PENDING_CAPACITY,
            watch_rejections: false,
            reconnect: ReconnectPolicy::default(),
            broker: BrokerConfig::default(),
        }
    }
}

fn generated_client_id() -> String {
    format!("shadow-sync-{}", uuid::Uuid::new_v4().simple())
}

/// Broker connection settings for [`MqttTransport`](crate::transport::MqttTransport).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Endpoint URL: `mqtt://`, `tcp://`, `mqtts://`, `ws://` or `wss://`.
    pub endpoint: String,
    /// Optional username.
    pub username: Option<String>,
    /// Optional password.
    pub password: Option<String>,
    /// MQTT keep-alive interval.
    #[serde(rename = "keep_alive_ms", with = "duration_ms")]
    pub keep_alive: Duration,
}

impl BrokerConfig {
    /// Creates broker settings for `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Sets username and password.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the keep-alive interval.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Returns the credentials if both parts are set.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            username: None,
            password: None,
            keep_alive: Duration::from_secs(30),
        }
    }
}

/// Configuration for automatic reconnection with exponential backoff.
///
/// Reconnection is disabled by default: after a refused, failed or lost
/// connection the synchronizer stays put until `start()` is called again.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use shadow_sync::config::ReconnectPolicy;
///
/// let policy = ReconnectPolicy::enabled()
///     .with_initial_delay(Duration::from_millis(500))
///     .with_max_delay(Duration::from_secs(8));
///
/// assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(500));
/// assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
/// assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(8));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Whether automatic reconnection is enabled.
    pub enabled: bool,
    /// Maximum number of retries before giving up (None = infinite).
    pub max_retries: Option<u32>,
    /// Delay before the first retry.
    #[serde(rename = "initial_delay_ms", with = "duration_ms")]
    pub initial_delay: Duration,
    /// Upper bound on the delay between retries.
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,
    /// Multiplier applied per retry.
    pub backoff_multiplier: f32,
}

impl ReconnectPolicy {
    /// Creates a disabled policy.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Creates an enabled policy with default backoff settings.
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Sets the maximum number of retries.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Sets infinite retries.
    #[must_use]
    pub fn with_infinite_retries(mut self) -> Self {
        self.max_retries = None;
        self
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay between retries.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates the delay before retry number `attempt` (0-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay.min(self.max_delay);
        }

        let multiplier = self
            .backoff_multiplier
            .powi(i32::try_from(attempt).unwrap_or(i32::MAX));

        // Safe: initial_delay is seconds/minutes in practice, far from f32 limits
        #[allow(clippy::cast_precision_loss)]
        let delay_ms = self.initial_delay.as_millis() as f32 * multiplier;

        // Safe: delay_ms is non-negative; saturating cast handles infinity
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay = Duration::from_millis(delay_ms as u64);

        delay.min(self.max_delay)
    }

    /// Returns true if retry number `attempt` (0-based) should be made.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        self.enabled && self.max_retries.is_none_or(|max| attempt < max)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            max_retries: Some(10),
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

/// Serde helpers for durations stored as integer milliseconds.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
