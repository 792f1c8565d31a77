use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Failure from a directory-service lookup, classified into the reasons the
/// router encodes into the enriched event.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Device not found: {0}")]
    NotFound(String),

    #[error("Access denied for device {0}")]
    AccessDenied(String),

    #[error("Registry throttled lookup for device {0}")]
    Throttled(String),

    #[error("Registry lookup failed: {0}")]
    Lookup(#[from] anyhow::Error),
}

/// Reason attached to a failed lookup; surfaced as data, never as a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LookupFailureReason {
    NotFound,
    AccessDenied,
    Throttled,
    Unknown,
}

impl From<&RegistryError> for LookupFailureReason {
    fn from(err: &RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_) => LookupFailureReason::NotFound,
            RegistryError::AccessDenied(_) => LookupFailureReason::AccessDenied,
            RegistryError::Throttled(_) => LookupFailureReason::Throttled,
            RegistryError::Lookup(_) => LookupFailureReason::Unknown,
        }
    }
}

/// Result of enriching an event against the device registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryLookupResult {
    /// Identity attributes from a DESCRIBE_THING lookup
    Attributes(HashMap<String, String>),
    /// Group memberships from a LIST_THING_GROUPS lookup, registry order preserved
    Groups(Vec<String>),
    Failure { reason: LookupFailureReason },
}

impl RegistryLookupResult {
    pub fn failure(reason: LookupFailureReason) -> Self {
        RegistryLookupResult::Failure { reason }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RegistryLookupResult::Failure { .. })
    }
}

/// External directory service mapping a device identifier to its registered
/// attributes or group memberships.
///
/// Authorization is fully delegated to the implementation; the router passes
/// the device identifier and nothing else.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Fetch the identity attributes registered for a device
    async fn describe_device(&self, device_id: &str)
        -> Result<HashMap<String, String>, RegistryError>;

    /// Fetch the group memberships registered for a device
    async fn list_groups(&self, device_id: &str) -> Result<Vec<String>, RegistryError>;
}
