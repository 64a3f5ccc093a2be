//! Accessibility levels for stored secrets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// When and where a stored secret may be unlocked.
///
/// Variants are ordered most restrictive first, so `Ord` compares
/// restrictiveness: `a < b` means `a` is stricter than `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Accessibility {
    /// Device must have a passcode; never leaves the device.
    WhenPasscodeSet,
    /// Device must be unlocked; never leaves the device.
    WhenUnlockedDeviceOnly,
    /// Device must be unlocked; may be included in backups.
    WhenUnlocked,
    /// Available after the first unlock since boot; never leaves the device.
    AfterFirstUnlockDeviceOnly,
    /// Available after the first unlock since boot; may be included in backups.
    AfterFirstUnlock,
}

impl Accessibility {
    /// All levels, most restrictive first.
    pub const ALL: [Accessibility; 5] = [
        Accessibility::WhenPasscodeSet,
        Accessibility::WhenUnlockedDeviceOnly,
        Accessibility::WhenUnlocked,
        Accessibility::AfterFirstUnlockDeviceOnly,
        Accessibility::AfterFirstUnlock,
    ];

    /// The level used when a caller does not choose one.
    pub const fn most_restrictive() -> Self {
        Accessibility::WhenPasscodeSet
    }

    /// Whether items at this level are bound to the local device.
    pub const fn is_device_only(self) -> bool {
        matches!(
            self,
            Accessibility::WhenPasscodeSet
                | Accessibility::WhenUnlockedDeviceOnly
                | Accessibility::AfterFirstUnlockDeviceOnly
        )
    }

    /// Whether items at this level may be included in backups.
    pub const fn allows_backup(self) -> bool {
        !self.is_device_only()
    }

    /// Stable name, matching the serialized form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Accessibility::WhenPasscodeSet => "whenPasscodeSet",
            Accessibility::WhenUnlockedDeviceOnly => "whenUnlockedDeviceOnly",
            Accessibility::WhenUnlocked => "whenUnlocked",
            Accessibility::AfterFirstUnlockDeviceOnly => "afterFirstUnlockDeviceOnly",
            Accessibility::AfterFirstUnlock => "afterFirstUnlock",
        }
    }
}

impl Default for Accessibility {
    fn default() -> Self {
        Self::most_restrictive()
    }
}

impl fmt::Display for Accessibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Accessibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| format!("unknown accessibility level: {s}"))
    }
}
