// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared across the library.
//!
//! - [`DeviceSnapshot`]: last-known reported state of the device
//! - [`DesiredUpdate`] and [`LedLevel`]: outbound desired-state intent
//! - [`ConnectionState`]: broker connection status

mod connection;
mod desired;
mod snapshot;

pub use connection::ConnectionState;
pub use desired::{DesiredUpdate, LedLevel};
pub use snapshot::DeviceSnapshot;
