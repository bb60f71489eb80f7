// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Synchronizer event and failure types.

use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::shadow::{ShadowDocument, ShadowSource};
use crate::types::{ConnectionState, DeviceSnapshot};

/// Metadata of the shadow document behind a snapshot change.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ShadowMetadata {
    /// Topic family the document arrived on.
    pub source: ShadowSource,
    /// Shadow version, if the document carried one.
    pub version: Option<u64>,
    /// Document timestamp in epoch seconds, if present.
    pub timestamp: Option<u64>,
    /// Local receive time.
    pub received_at: DateTime<Utc>,
}

impl ShadowMetadata {
    /// Captures metadata for `document` received now.
    #[must_use]
    pub fn from_document(document: &ShadowDocument) -> Self {
        Self {
            source: document.source,
            version: document.version,
            timestamp: document.timestamp,
            received_at: DateTime::<Utc>::from(SystemTime::now()),
        }
    }

    /// Returns the document timestamp as a UTC datetime.
    #[must_use]
    pub fn document_time(&self) -> Option<DateTime<Utc>> {
        self.timestamp
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// A failure handled inside the synchronizer.
///
/// Failures never stop the synchronizer; they are logged and reported to
/// failure observers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Failure {
    /// A connection attempt was refused or failed, or timed out.
    #[error("connection {state}: {reason}")]
    Connection {
        /// State the attempt ended in.
        state: ConnectionState,
        /// Broker or transport reason.
        reason: String,
    },

    /// An inbound document was dropped.
    #[error("dropped document on {topic}: {reason}")]
    Decode {
        /// Topic the document arrived on.
        topic: String,
        /// Why it could not be decoded.
        reason: String,
    },

    /// A desired update was requested while not connected and could not
    /// be queued.
    #[error("not connected")]
    NotConnected,

    /// The broker rejected a shadow request.
    #[error("shadow request rejected on {topic}: {code:?} {message:?}")]
    Rejected {
        /// Rejection topic.
        topic: String,
        /// Error code from the rejection document.
        code: Option<i64>,
        /// Error message from the rejection document.
        message: Option<String>,
    },

    /// A publish or subscribe request could not be handed to the transport.
    #[error("request on {topic} failed: {reason}")]
    Request {
        /// Topic of the failed request.
        topic: String,
        /// Transport error.
        reason: String,
    },
}

impl Failure {
    /// Returns `true` for connection failures.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Returns `true` for dropped documents.
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

/// Events published by a synchronizer.
#[derive(Debug, Clone, PartialEq)]
pub enum ShadowEvent {
    /// A document was merged into the snapshot.
    SnapshotChanged {
        /// The snapshot after the merge.
        snapshot: DeviceSnapshot,
        /// Metadata of the merged document.
        metadata: ShadowMetadata,
    },

    /// The connection state changed.
    ConnectionChanged {
        /// The new state.
        state: ConnectionState,
    },

    /// A failure was handled.
    Failure(Failure),
}

impl ShadowEvent {
    /// Returns the snapshot if this is a snapshot change.
    #[must_use]
    pub fn snapshot(&self) -> Option<&DeviceSnapshot> {
        match self {
            Self::SnapshotChanged { snapshot, .. } => Some(snapshot),
            _ => None,
        }
    }

    /// Returns the new state if this is a connection change.
    #[must_use]
    pub fn connection_state(&self) -> Option<ConnectionState> {
        match self {
            Self::ConnectionChanged { state } => Some(*state),
            _ => None,
        }
    }

    /// Returns the failure if this is a failure event.
    #[must_use]
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failure(failure) => Some(failure),
            _ => None,
        }
    }
}
