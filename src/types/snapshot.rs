// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Last-known reported device state.

use crate::shadow::ReportedState;

/// Snapshot of the device's reported state.
///
/// A snapshot is immutable: merging a reported document produces a new
/// snapshot, leaving fields that the document does not carry unchanged.
/// `led_on` is always derived from `led_level` and cannot be set on its own.
///
/// # Examples
///
/// ```
/// use shadow_sync::types::DeviceSnapshot;
///
/// let snapshot = DeviceSnapshot::default();
/// assert_eq!(snapshot.led_level(), 0);
/// assert!(!snapshot.led_on());
///
/// let snapshot = DeviceSnapshot::new(21.5, 40.0, 100);
/// assert!(snapshot.led_on());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct DeviceSnapshot {
    temperature: f64,
    humidity: f64,
    led_level: i64,
    led_on: bool,
}

impl DeviceSnapshot {
    /// Creates a snapshot from its three reported values.
    #[must_use]
    pub fn new(temperature: f64, humidity: f64, led_level: i64) -> Self {
        Self {
            temperature,
            humidity,
            led_level,
            led_on: led_level > 0,
        }
    }

    /// Returns the reported temperature.
    #[must_use]
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Returns the reported relative humidity.
    #[must_use]
    pub fn humidity(&self) -> f64 {
        self.humidity
    }

    /// Returns the reported LED level as sent by the device.
    #[must_use]
    pub fn led_level(&self) -> i64 {
        self.led_level
    }

    /// Returns `true` if the LED level is above zero.
    #[must_use]
    pub fn led_on(&self) -> bool {
        self.led_on
    }

    /// Builds the snapshot that results from merging `reported` into `self`.
    ///
    /// Only the fields present in `reported` are overwritten.
    #[must_use]
    pub fn merged(&self, reported: &ReportedState) -> Self {
        Self::new(
            reported.temperature.unwrap_or(self.temperature),
            reported.humidity.unwrap_or(self.humidity),
            reported.led.unwrap_or(self.led_level),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_snapshot() {
        let snapshot = DeviceSnapshot::default();
        assert_eq!(snapshot, DeviceSnapshot::new(0.0, 0.0, 0));
        assert!(!snapshot.led_on());
    }

    #[test]
    fn merge_overwrites_present_fields_only() {
        let prior = DeviceSnapshot::new(20.0, 55.0, 100);
        let reported = ReportedState {
            temperature: Some(21.5),
            humidity: None,
            led: Some(0),
        };

        let next = prior.merged(&reported);
        assert!((next.temperature() - 21.5).abs() < f64::EPSILON);
        assert!((next.humidity() - 55.0).abs() < f64::EPSILON);
        assert_eq!(next.led_level(), 0);
        assert!(!next.led_on());
        // prior is untouched
        assert_eq!(prior.led_level(), 100);
    }

    #[test]
    fn merge_empty_report_is_identity() {
        let prior = DeviceSnapshot::new(18.25, 33.0, 42);
        assert_eq!(prior.merged(&ReportedState::default()), prior);
    }

    #[test]
    fn led_on_tracks_level() {
        let prior = DeviceSnapshot::default();
        for (level, on) in [(-5, false), (0, false), (1, true), (100, true)] {
            let reported = ReportedState {
                led: Some(level),
                ..ReportedState::default()
            };
            assert_eq!(prior.merged(&reported).led_on(), on, "level {level}");
        }
    }
}
