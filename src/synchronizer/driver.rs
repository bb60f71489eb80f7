// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Background task driving one synchronizer generation.
//!
//! The driver owns the transport's event channel. It is the only place that
//! merges inbound documents and applies broker-driven state transitions.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};

use crate::error::ProtocolError;
use crate::event::Failure;
use crate::transport::{ShadowTransport, TransportEvent};
use crate::types::ConnectionState;

use super::Inner;

/// How a connection attempt ended.
#[derive(Debug)]
enum AttemptEnd {
    Refused(String),
    Failed(String),
    TimedOut,
    Disconnected,
    /// `stop()` or a newer `start()` took over.
    Superseded,
}

pub(super) async fn run<T: ShadowTransport>(inner: Arc<Inner<T>>, generation: u64) {
    let thing = inner.topics.thing_name().to_string();
    tracing::debug!(%thing, generation, "Driver started");

    loop {
        if !inner.is_current(generation) {
            break;
        }

        let connected = inner.transport.connect(&inner.config.connect_options());
        inner.notify_connection(ConnectionState::Connecting);

        let end = match connected {
            Ok(events) => drive_attempt(&inner, generation, events).await,
            Err(e) => AttemptEnd::Failed(e.to_string()),
        };

        let Some(delay) = finish_attempt(&inner, generation, end) else {
            break;
        };
        tokio::time::sleep(delay).await;

        if !begin_retry(&inner, generation) {
            break;
        }
    }

    tracing::debug!(%thing, generation, "Driver stopped");
}

/// Consumes transport events until the attempt ends.
async fn drive_attempt<T: ShadowTransport>(
    inner: &Inner<T>,
    generation: u64,
    mut events: mpsc::Receiver<TransportEvent>,
) -> AttemptEnd {
    let deadline = Instant::now() + inner.config.connect_timeout;
    let mut connected = false;

    loop {
        let event = if connected {
            events.recv().await
        } else if let Ok(event) = timeout_at(deadline, events.recv()).await {
            event
        } else {
            if inner.is_current(generation)
                && let Err(e) = inner.transport.disconnect()
            {
                tracing::debug!(error = %e, "Failed to abandon timed out attempt");
            }
            return AttemptEnd::TimedOut;
        };

        if !inner.is_current(generation) {
            return AttemptEnd::Superseded;
        }

        match event {
            Some(TransportEvent::Connected) => {
                if !connected {
                    connected = true;
                    inner.on_connected(generation);
                }
            }
            Some(TransportEvent::Message { topic, payload }) => {
                inner.handle_message(&topic, &payload);
            }
            Some(
                TransportEvent::Refused(_) | TransportEvent::Failed(_) | TransportEvent::Disconnected,
            )
            | None
                if connected =>
            {
                return AttemptEnd::Disconnected;
            }
            Some(TransportEvent::Refused(reason)) => return AttemptEnd::Refused(reason),
            Some(TransportEvent::Failed(reason)) => return AttemptEnd::Failed(reason),
            Some(TransportEvent::Disconnected) => {
                return AttemptEnd::Failed("connection closed before acknowledgment".to_string());
            }
            None => {
                return AttemptEnd::Failed(
                    ProtocolError::ChannelClosed("transport events".to_string()).to_string(),
                );
            }
        }
    }
}

/// Applies the end of an attempt and returns the delay before a retry, if
/// one should be made.
fn finish_attempt<T: ShadowTransport>(
    inner: &Inner<T>,
    generation: u64,
    end: AttemptEnd,
) -> Option<Duration> {
    let (next, reason) = match end {
        AttemptEnd::Superseded => return None,
        AttemptEnd::Refused(reason) => (
            ConnectionState::Refused,
            Some(ProtocolError::Refused(reason).to_string()),
        ),
        AttemptEnd::Failed(reason) => (ConnectionState::Error, Some(reason)),
        AttemptEnd::TimedOut => {
            let millis = u64::try_from(inner.config.connect_timeout.as_millis()).unwrap_or(u64::MAX);
            (
                ConnectionState::Error,
                Some(ProtocolError::Timeout(millis).to_string()),
            )
        }
        AttemptEnd::Disconnected => (ConnectionState::Disconnected, None),
    };

    let retry = {
        let mut state = inner.state.lock();
        if state.generation != generation {
            return None;
        }
        state.connection = next;
        let attempt = state.attempt;
        if inner.config.reconnect.should_retry(attempt) {
            state.attempt += 1;
            Some((attempt, inner.config.reconnect.delay_for_attempt(attempt)))
        } else {
            None
        }
    };

    match &reason {
        Some(reason) => tracing::warn!(
            thing = %inner.topics.thing_name(),
            state = %next,
            reason = %reason,
            "Connection attempt failed"
        ),
        None => tracing::info!(thing = %inner.topics.thing_name(), "Connection lost"),
    }

    inner.notify_connection(next);
    if let Some(reason) = reason {
        inner.emit_failure(Failure::Connection {
            state: next,
            reason,
        });
    }

    retry.map(|(attempt, delay)| {
        tracing::info!(
            attempt = attempt + 1,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Scheduling reconnect"
        );
        delay
    })
}

/// Re-enters `Connecting` after a backoff delay.
///
/// Returns `false` if the generation was superseded while waiting.
fn begin_retry<T: ShadowTransport>(inner: &Inner<T>, generation: u64) -> bool {
    let mut state = inner.state.lock();
    if state.generation != generation || state.connection.is_active() {
        return false;
    }
    state.connection = ConnectionState::Connecting;
    true
}
