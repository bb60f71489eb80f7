// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `shadow_sync` library.
//!
//! Failures fall into a few families: value validation, transport
//! communication, shadow document decoding and configuration loading.
//! None of them is fatal to a running synchronizer; the worst outcome of a
//! failure is a stale snapshot.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Error occurred while talking to the broker.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A shadow document could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// A desired update could not be serialized.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The synchronizer is not connected and queueing is disabled.
    #[error("synchronizer is not connected")]
    NotConnected,
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: i64,
        /// Maximum allowed value.
        max: i64,
        /// The actual value that was provided.
        actual: i64,
    },
}

/// Errors related to the MQTT transport.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The MQTT client rejected a request.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the broker failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The broker refused the connection.
    #[error("connection refused: {0}")]
    Refused(String),

    /// The connect phase did not complete in time.
    #[error("connect timed out after {0} ms")]
    Timeout(u64),

    /// Invalid endpoint URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The transport has no live connection for this request.
    #[error("transport is not connected")]
    NotConnected,

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

/// Errors raised while decoding an inbound shadow document.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An expected nested object is absent.
    #[error("missing object `{0}`")]
    MissingObject(&'static str),

    /// An expected nested object has a non-object value.
    #[error("`{0}` is not a JSON object")]
    NotAnObject(&'static str),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON for this schema.
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    /// A required setting is empty.
    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    /// The thing name cannot be used inside an MQTT topic.
    #[error("invalid thing name: {0:?}")]
    InvalidThingName(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
