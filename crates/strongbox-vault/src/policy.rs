//! Access policy evaluation.
//!
//! Two kinds of checks:
//!
//! - **Creation** (`add`, `rewrap`): the requested accessibility, sync flag
//!   and sharing group must be compatible. Device-only levels cannot be
//!   replicated or shared across an access group.
//! - **Access** (`get`, `update`, `list`): the entry's accessibility must be
//!   satisfied by the current [`DeviceState`].

use std::sync::Arc;

use strongbox_core::Accessibility;
use tracing::warn;

use crate::error::{Result, VaultError};
use crate::types::{AccessPolicy, LookupKey};

/// Snapshot of the device conditions accessibility levels depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus {
    pub passcode_set: bool,
    pub unlocked: bool,
    /// The device has been unlocked at least once since boot.
    pub unlocked_since_boot: bool,
}

impl DeviceStatus {
    /// Passcode set and currently unlocked.
    pub const UNLOCKED: DeviceStatus = DeviceStatus {
        passcode_set: true,
        unlocked: true,
        unlocked_since_boot: true,
    };

    /// Locked again after the first unlock since boot.
    pub const LOCKED_AFTER_FIRST_UNLOCK: DeviceStatus = DeviceStatus {
        passcode_set: true,
        unlocked: false,
        unlocked_since_boot: true,
    };

    /// Freshly booted and never unlocked.
    pub const LOCKED_SINCE_BOOT: DeviceStatus = DeviceStatus {
        passcode_set: true,
        unlocked: false,
        unlocked_since_boot: false,
    };
}

/// Source of the current device status.
pub trait DeviceState: Send + Sync {
    fn status(&self) -> DeviceStatus;
}

/// A fixed status, useful for hosts without a lock screen and for tests.
impl DeviceState for DeviceStatus {
    fn status(&self) -> DeviceStatus {
        *self
    }
}

/// Device that is always unlocked with a passcode set. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnlockedDevice;

impl DeviceState for UnlockedDevice {
    fn status(&self) -> DeviceStatus {
        DeviceStatus::UNLOCKED
    }
}

/// Decides whether an operation is permitted under an entry's policy.
#[derive(Clone)]
pub struct PolicyEvaluator {
    device: Arc<dyn DeviceState>,
}

impl Default for PolicyEvaluator {
    fn default() -> Self {
        Self::new(Arc::new(UnlockedDevice))
    }
}

impl std::fmt::Debug for PolicyEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEvaluator")
            .field("device", &self.device.status())
            .finish()
    }
}

impl PolicyEvaluator {
    pub fn new(device: Arc<dyn DeviceState>) -> Self {
        Self { device }
    }

    /// Validate a policy being bound to a new (or rewrapped) entry.
    pub fn check_creation(
        &self,
        key: &LookupKey,
        policy: &AccessPolicy,
        sync_enabled: bool,
    ) -> Result<()> {
        let level = policy.accessibility;

        if let Some(group) = &policy.access_group {
            if group.trim().is_empty() {
                return Err(self.conflict(key, "access group must not be blank".to_string()));
            }
        }

        if level.is_device_only() {
            if sync_enabled {
                return Err(self.conflict(
                    key,
                    format!("'{level}' is device-only and cannot be synchronized"),
                ));
            }
            if let Some(group) = &policy.access_group {
                return Err(self.conflict(
                    key,
                    format!("'{level}' is device-only and cannot be shared with access group '{group}'"),
                ));
            }
        }

        if level == Accessibility::WhenPasscodeSet && !self.device.status().passcode_set {
            warn!(key = %key, "refusing to store passcode-bound entry without a passcode");
            return Err(VaultError::AccessDenied {
                key: key.to_string(),
                requirement: "a device passcode".to_string(),
            });
        }

        Ok(())
    }

    /// Check that the entry can be unlocked right now.
    pub fn check_access(&self, key: &LookupKey, policy: &AccessPolicy) -> Result<()> {
        let status = self.device.status();
        let (allowed, requirement) = match policy.accessibility {
            Accessibility::WhenPasscodeSet => (
                status.passcode_set && status.unlocked,
                "a passcode and an unlocked device",
            ),
            Accessibility::WhenUnlocked | Accessibility::WhenUnlockedDeviceOnly => {
                (status.unlocked, "an unlocked device")
            }
            Accessibility::AfterFirstUnlock | Accessibility::AfterFirstUnlockDeviceOnly => (
                status.unlocked || status.unlocked_since_boot,
                "a first unlock since boot",
            ),
        };

        if allowed {
            Ok(())
        } else {
            warn!(key = %key, accessibility = %policy.accessibility, "access refused by policy");
            Err(VaultError::AccessDenied {
                key: key.to_string(),
                requirement: requirement.to_string(),
            })
        }
    }

    fn conflict(&self, key: &LookupKey, reason: String) -> VaultError {
        warn!(key = %key, reason = %reason, "policy conflict");
        VaultError::PolicyConflict(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> LookupKey {
        LookupKey::generic("ns", "alice")
    }

    fn evaluator(status: DeviceStatus) -> PolicyEvaluator {
        PolicyEvaluator::new(Arc::new(status))
    }

    #[test]
    fn test_sync_allowed_for_backup_levels() {
        let eval = PolicyEvaluator::default();
        for level in [Accessibility::WhenUnlocked, Accessibility::AfterFirstUnlock] {
            assert!(eval.check_creation(&key(), &AccessPolicy::new(level), true).is_ok());
        }
    }

    #[test]
    fn test_sync_rejected_for_device_only_levels() {
        let eval = PolicyEvaluator::default();
        for level in Accessibility::ALL.into_iter().filter(|l| l.is_device_only()) {
            let result = eval.check_creation(&key(), &AccessPolicy::new(level), true);
            assert!(
                matches!(result, Err(VaultError::PolicyConflict(_))),
                "{level} + sync should conflict"
            );
        }
    }

    #[test]
    fn test_access_group_rejected_for_device_only() {
        let eval = PolicyEvaluator::default();
        let policy = AccessPolicy::new(Accessibility::AfterFirstUnlockDeviceOnly)
            .with_access_group("team.shared");
        assert!(matches!(
            eval.check_creation(&key(), &policy, false),
            Err(VaultError::PolicyConflict(_))
        ));

        let policy = AccessPolicy::new(Accessibility::AfterFirstUnlock).with_access_group("team.shared");
        assert!(eval.check_creation(&key(), &policy, false).is_ok());
    }

    #[test]
    fn test_blank_access_group_rejected() {
        let eval = PolicyEvaluator::default();
        let policy = AccessPolicy::new(Accessibility::WhenUnlocked).with_access_group("  ");
        assert!(matches!(
            eval.check_creation(&key(), &policy, false),
            Err(VaultError::PolicyConflict(_))
        ));
    }

    #[test]
    fn test_device_only_without_sync_ok() {
        let eval = PolicyEvaluator::default();
        let policy = AccessPolicy::new(Accessibility::WhenUnlockedDeviceOnly);
        assert!(eval.check_creation(&key(), &policy, false).is_ok());
    }

    #[test]
    fn test_passcode_level_needs_passcode() {
        let eval = evaluator(DeviceStatus {
            passcode_set: false,
            unlocked: true,
            unlocked_since_boot: true,
        });
        let policy = AccessPolicy::new(Accessibility::WhenPasscodeSet);
        assert!(matches!(
            eval.check_creation(&key(), &policy, false),
            Err(VaultError::AccessDenied { .. })
        ));
        assert!(matches!(
            eval.check_access(&key(), &policy),
            Err(VaultError::AccessDenied { .. })
        ));
    }

    #[test]
    fn test_access_when_locked_after_first_unlock() {
        let eval = evaluator(DeviceStatus::LOCKED_AFTER_FIRST_UNLOCK);
        for level in Accessibility::ALL {
            let result = eval.check_access(&key(), &AccessPolicy::new(level));
            let expect_ok = matches!(
                level,
                Accessibility::AfterFirstUnlock | Accessibility::AfterFirstUnlockDeviceOnly
            );
            assert_eq!(result.is_ok(), expect_ok, "{level}");
        }
    }

    #[test]
    fn test_access_when_locked_since_boot() {
        let eval = evaluator(DeviceStatus::LOCKED_SINCE_BOOT);
        for level in Accessibility::ALL {
            assert!(eval.check_access(&key(), &AccessPolicy::new(level)).is_err());
        }
    }

    #[test]
    fn test_access_when_unlocked() {
        let eval = PolicyEvaluator::default();
        for level in Accessibility::ALL {
            assert!(eval.check_access(&key(), &AccessPolicy::new(level)).is_ok());
        }
    }
}
