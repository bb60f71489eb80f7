// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoding of inbound shadow documents and encoding of desired updates.
//!
//! Inbound documents are decoded into a generic JSON tree and the
//! `reported` object is looked up at a topic-dependent depth. Each scalar
//! field is taken only when present with the expected JSON type; anything
//! else is left as `None` so the merge keeps the previous value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DecodeError;
use crate::types::DesiredUpdate;

/// Payload of a shadow get request.
pub const GET_REQUEST: &[u8] = b"";

/// Which inbound topic a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShadowSource {
    /// Response to a get request.
    GetAccepted,
    /// Change notification after an update.
    UpdateDocuments,
}

/// Reported fields extracted from a shadow document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportedState {
    /// Reported temperature.
    pub temperature: Option<f64>,
    /// Reported relative humidity.
    pub humidity: Option<f64>,
    /// Reported LED level.
    pub led: Option<i64>,
}

impl ReportedState {
    fn from_object(reported: &Map<String, Value>) -> Self {
        Self {
            temperature: reported.get("temperature").and_then(Value::as_f64),
            humidity: reported.get("humidity").and_then(Value::as_f64),
            led: reported.get("led").and_then(integral),
        }
    }

    /// Returns `true` if no field was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.humidity.is_none() && self.led.is_none()
    }
}

/// Accepts integers and floats without a fractional part (`100.0`).
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        let float = value.as_f64()?;
        (float.fract() == 0.0 && float >= i64::MIN as f64 && float < i64::MAX as f64)
            .then_some(float as i64)
    })
}

/// A decoded shadow document.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowDocument {
    /// Topic family the document was received on.
    pub source: ShadowSource,
    /// Reported fields.
    pub reported: ReportedState,
    /// Shadow document version, if present.
    pub version: Option<u64>,
    /// Document timestamp in epoch seconds, if present.
    pub timestamp: Option<u64>,
}

/// Decodes a `get/accepted` document (`state.reported`).
///
/// # Errors
///
/// Returns `DecodeError` if the payload is not JSON or `state.reported` is
/// absent or not an object.
pub fn decode_get_accepted(payload: &[u8]) -> Result<ShadowDocument, DecodeError> {
    let root: Value = serde_json::from_slice(payload)?;
    let state = object_at(&root, "state", "state")?;
    let reported = object_in(state, "reported", "state.reported")?;
    Ok(document(ShadowSource::GetAccepted, &root, reported))
}

/// Decodes an `update/documents` document (`current.state.reported`).
///
/// # Errors
///
/// Returns `DecodeError` if the payload is not JSON or
/// `current.state.reported` is absent or not an object.
pub fn decode_update_documents(payload: &[u8]) -> Result<ShadowDocument, DecodeError> {
    let root: Value = serde_json::from_slice(payload)?;
    let current = object_at(&root, "current", "current")?;
    let state = object_in(current, "state", "current.state")?;
    let reported = object_in(state, "reported", "current.state.reported")?;
    Ok(document(ShadowSource::UpdateDocuments, &root, reported))
}

fn document(source: ShadowSource, root: &Value, reported: &Map<String, Value>) -> ShadowDocument {
    ShadowDocument {
        source,
        reported: ReportedState::from_object(reported),
        version: root.get("version").and_then(Value::as_u64),
        timestamp: root.get("timestamp").and_then(Value::as_u64),
    }
}

fn object_at<'a>(
    value: &'a Value,
    key: &str,
    path: &'static str,
) -> Result<&'a Map<String, Value>, DecodeError> {
    match value.get(key) {
        None | Some(Value::Null) => Err(DecodeError::MissingObject(path)),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(DecodeError::NotAnObject(path)),
    }
}

fn object_in<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    path: &'static str,
) -> Result<&'a Map<String, Value>, DecodeError> {
    match map.get(key) {
        None | Some(Value::Null) => Err(DecodeError::MissingObject(path)),
        Some(Value::Object(inner)) => Ok(inner),
        Some(_) => Err(DecodeError::NotAnObject(path)),
    }
}

/// Error document published on `get/rejected` and `update/rejected`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Rejection {
    /// HTTP-style error code (e.g. 404 when no shadow exists).
    #[serde(default)]
    pub code: Option<i64>,
    /// Human-readable error message.
    #[serde(default)]
    pub message: Option<String>,
}

/// Decodes a rejection document.
///
/// # Errors
///
/// Returns `DecodeError::Json` if the payload is not a JSON object.
pub fn decode_rejection(payload: &[u8]) -> Result<Rejection, DecodeError> {
    serde_json::from_slice(payload).map_err(Into::into)
}

#[derive(Serialize)]
struct DesiredEnvelope<'a> {
    state: DesiredSection<'a>,
}

#[derive(Serialize)]
struct DesiredSection<'a> {
    desired: &'a DesiredUpdate,
}

/// Encodes `{"state":{"desired":{...}}}` for the update topic.
///
/// # Errors
///
/// Returns `serde_json::Error` if serialization fails.
pub fn encode_desired(update: &DesiredUpdate) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&DesiredEnvelope {
        state: DesiredSection { desired: update },
    })
}
