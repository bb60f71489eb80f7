// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed event stream for synchronizer activity.
//!
//! Every snapshot change, connection transition and failure handled by a
//! synchronizer is published as a [`ShadowEvent`] on its [`EventBus`].
//! This is the stream counterpart of the callback registry in
//! [`subscription`](crate::subscription).

mod event_bus;
mod shadow_event;

pub use event_bus::EventBus;
pub use shadow_event::{Failure, ShadowEvent, ShadowMetadata};
