// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Desired-state intent sent to the device shadow.

use std::fmt;

use crate::error::ValueError;

/// LED level as a percentage (0-100).
///
/// # Examples
///
/// ```
/// use shadow_sync::types::LedLevel;
///
/// let level = LedLevel::new(75).unwrap();
/// assert_eq!(level.value(), 75);
///
/// assert_eq!(LedLevel::from(true), LedLevel::FULL);
/// assert_eq!(LedLevel::from(false), LedLevel::OFF);
///
/// assert!(LedLevel::new(101).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct LedLevel(u8);

impl LedLevel {
    /// LED off.
    pub const OFF: Self = Self(0);

    /// LED at full level.
    pub const FULL: Self = Self(100);

    /// Creates a new LED level.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if value exceeds 100.
    pub fn new(value: u8) -> Result<Self, ValueError> {
        if value > 100 {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: 100,
                actual: i64::from(value),
            });
        }
        Ok(Self(value))
    }

    /// Returns the percentage value.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Returns `true` for any level above zero.
    #[must_use]
    pub const fn is_on(&self) -> bool {
        self.0 > 0
    }
}

impl From<bool> for LedLevel {
    fn from(on: bool) -> Self {
        if on { Self::FULL } else { Self::OFF }
    }
}

impl TryFrom<u8> for LedLevel {
    type Error = ValueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LedLevel> for u8 {
    fn from(level: LedLevel) -> Self {
        level.0
    }
}

impl fmt::Display for LedLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// A partial set of desired fields to publish to the shadow.
///
/// Only fields that are set are serialized, so an update never clobbers
/// desired values it does not mention.
///
/// # Examples
///
/// ```
/// use shadow_sync::types::{DesiredUpdate, LedLevel};
///
/// let update = DesiredUpdate::led_power(true);
/// assert_eq!(update.led(), Some(LedLevel::FULL));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DesiredUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    led: Option<LedLevel>,
}

impl DesiredUpdate {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an update switching the LED fully on or off.
    #[must_use]
    pub fn led_power(on: bool) -> Self {
        Self::new().with_led(LedLevel::from(on))
    }

    /// Sets the desired LED level.
    #[must_use]
    pub fn with_led(mut self, level: LedLevel) -> Self {
        self.led = Some(level);
        self
    }

    /// Returns the desired LED level, if set.
    #[must_use]
    pub fn led(&self) -> Option<LedLevel> {
        self.led
    }

    /// Returns `true` if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.led.is_none()
    }
}
