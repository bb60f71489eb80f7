// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Display strings derived from a snapshot.

use std::fmt;

use crate::types::DeviceSnapshot;

/// The values a dashboard shows for one snapshot.
///
/// # Examples
///
/// ```
/// use shadow_sync::types::DeviceSnapshot;
/// use shadow_sync::view::SnapshotLabels;
///
/// let labels = SnapshotLabels::from(DeviceSnapshot::new(21.5, 40.126, 0));
/// assert_eq!(labels.temperature, "21.50");
/// assert_eq!(labels.humidity, "40.13");
/// assert_eq!(labels.led_value, "0");
/// assert!(!labels.led_switch);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SnapshotLabels {
    /// Temperature with two decimals.
    pub temperature: String,
    /// Humidity with two decimals.
    pub humidity: String,
    /// LED level as an integer.
    pub led_value: String,
    /// Position of the LED switch.
    pub led_switch: bool,
}

impl From<DeviceSnapshot> for SnapshotLabels {
    fn from(snapshot: DeviceSnapshot) -> Self {
        Self {
            temperature: format!("{:.2}", snapshot.temperature()),
            humidity: format!("{:.2}", snapshot.humidity()),
            led_value: snapshot.led_level().to_string(),
            led_switch: snapshot.led_on(),
        }
    }
}

impl fmt::Display for SnapshotLabels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "temperature {} | humidity {} | led {} ({})",
            self.temperature,
            self.humidity,
            self.led_value,
            if self.led_switch { "on" } else { "off" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_snapshot() {
        let labels = SnapshotLabels::from(DeviceSnapshot::default());
        assert_eq!(labels.temperature, "0.00");
        assert_eq!(labels.humidity, "0.00");
        assert_eq!(labels.led_value, "0");
        assert!(!labels.led_switch);
    }

    #[test]
    fn negative_and_large_values() {
        let labels = SnapshotLabels::from(DeviceSnapshot::new(-3.456, 99.999, 100));
        assert_eq!(labels.temperature, "-3.46");
        assert_eq!(labels.humidity, "100.00");
        assert_eq!(labels.led_value, "100");
        assert!(labels.led_switch);
    }

    #[test]
    fn display_line() {
        let labels = SnapshotLabels::from(DeviceSnapshot::new(21.5, 40.0, 42));
        assert_eq!(
            labels.to_string(),
            "temperature 21.50 | humidity 40.00 | led 42 (on)"
        );
    }
}
