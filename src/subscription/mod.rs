// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Observer registration for synchronizer changes.
//!
//! Observers are plain closures registered on a
//! [`ShadowSynchronizer`](crate::ShadowSynchronizer). Each registration
//! returns a [`SubscriptionId`] that removes the observer again.
//!
//! ```no_run
//! use shadow_sync::{ShadowSynchronizer, SyncConfig};
//! use shadow_sync::transport::MemoryTransport;
//!
//! let sync = ShadowSynchronizer::new(SyncConfig::new("lamp"), MemoryTransport::new()).unwrap();
//!
//! let id = sync.on_snapshot_changed(|snapshot| {
//!     println!("temperature {:.2}", snapshot.temperature());
//! });
//!
//! sync.unsubscribe(id);
//! ```

mod callback;

pub use callback::{CallbackRegistry, SubscriptionId};
