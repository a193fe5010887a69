//! Validation rules for workloads, mount points and migration targets.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum length of a workload name.
const MAX_NAME_LEN: usize = 255;

/// Maximum length of a mount point name.
const MAX_MOUNT_POINT_NAME_LEN: usize = 255;

// ---------------------------------------------------------------------------
// Cloud type
// ---------------------------------------------------------------------------

/// Cloud platform a migration target lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudType {
    Aws,
    Azure,
    Vsphere,
    Vcloud,
}

impl CloudType {
    pub const ALL: [CloudType; 4] = [
        CloudType::Aws,
        CloudType::Azure,
        CloudType::Vsphere,
        CloudType::Vcloud,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CloudType::Aws => "aws",
            CloudType::Azure => "azure",
            CloudType::Vsphere => "vsphere",
            CloudType::Vcloud => "vcloud",
        }
    }
}

impl fmt::Display for CloudType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CloudType::ALL
            .into_iter()
            .find(|ct| ct.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown cloud type: \"{s}\"")))
    }
}

impl TryFrom<String> for CloudType {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, CoreError> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Workloads
// ---------------------------------------------------------------------------

/// Validate a workload name: non-empty after trimming, at most
/// `MAX_NAME_LEN` characters.
pub fn validate_workload_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(
            "Workload name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Workload name must not exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Parse an IPv4/IPv6 address and return its canonical text form.
///
/// Canonicalization matters for the uniqueness constraint: `::0001` and
/// `::1` are the same workload.
pub fn normalize_ip_address(raw: &str) -> Result<String, CoreError> {
    raw.trim()
        .parse::<IpAddr>()
        .map(|ip| ip.to_string())
        .map_err(|_| CoreError::Validation(format!("Invalid IP address: \"{raw}\"")))
}

/// Reject any attempt to change a workload's IP address after creation.
///
/// `requested` is compared in canonical form, so re-sending the current
/// address in another notation is not a change.
pub fn ensure_ip_unchanged(current: &str, requested: Option<&str>) -> Result<(), CoreError> {
    let Some(requested) = requested else {
        return Ok(());
    };
    if normalize_ip_address(requested)? != current {
        return Err(CoreError::Validation(
            "The IP address of a workload cannot be changed".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Mount points
// ---------------------------------------------------------------------------

/// Validate a mount point: non-empty name of bounded length and a
/// strictly positive size in GB.
pub fn validate_mount_point(name: &str, size_gb: i64) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(
            "Mount point name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_MOUNT_POINT_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Mount point name must not exceed {MAX_MOUNT_POINT_NAME_LEN} characters"
        )));
    }
    if size_gb <= 0 {
        return Err(CoreError::Validation(format!(
            "Mount point size must be positive, got {size_gb}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
