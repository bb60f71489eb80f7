// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broker connection status.

use std::fmt;

/// Connection state of a synchronizer.
///
/// ```text
/// Disconnected ──start()──▶ Connecting ──▶ Connected ──▶ Disconnected
///                               │
///                               └──▶ Refused | Error
/// ```
///
/// `Refused` and `Error` end the current attempt. A new `start()` call (or
/// an enabled reconnect policy) moves back to `Connecting`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ConnectionState {
    /// No connection and no attempt in flight.
    #[default]
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Connected; publish and subscribe are permitted.
    Connected,
    /// The broker refused the connection.
    Refused,
    /// The attempt failed with a transport or protocol error.
    Error,
}

impl ConnectionState {
    /// Returns true if publish and subscribe are permitted.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns true while an attempt is in flight or established.
    ///
    /// `start()` is a no-op in these states.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    /// Returns true if the last attempt ended in failure.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Refused | Self::Error)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Refused => "refused",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn predicates() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(ConnectionState::Connecting.is_active());
        assert!(!ConnectionState::Refused.is_active());
        assert!(ConnectionState::Error.is_failed());
        assert!(!ConnectionState::Disconnected.is_failed());
    }
}
