// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device shadow topics and documents.
//!
//! A thing's shadow is addressed through a fixed family of MQTT topics
//! under `$aws/things/<thing>/shadow/`:
//!
//! - `update` - desired-state requests (`{"state":{"desired":{...}}}`)
//! - `get` - empty request for the full shadow document
//! - `get/accepted` - full document (`{"state":{"reported":{...}}}`)
//! - `update/documents` - before/after documents on every change
//!   (`{"current":{"state":{"reported":{...}}}}`)
//! - `get/rejected`, `update/rejected` - error documents
//!
//! # Examples
//!
//! ```
//! use shadow_sync::shadow::{ShadowTopic, ShadowTopics, decode_update_documents};
//!
//! let topics = ShadowTopics::new("porch-sensor").unwrap();
//! let topic = topics.update_documents();
//! assert_eq!(topics.classify(&topic), Some(ShadowTopic::UpdateDocuments));
//!
//! let doc = decode_update_documents(br#"{"current":{"state":{"reported":{"led":0}}}}"#).unwrap();
//! assert_eq!(doc.reported.led, Some(0));
//! ```

mod document;
mod topics;

pub use document::{
    GET_REQUEST, Rejection, ReportedState, ShadowDocument, ShadowSource, decode_get_accepted,
    decode_rejection, decode_update_documents, encode_desired,
};
pub use topics::{ShadowTopic, ShadowTopics};
