/// License management
///
/// Key generation, the license store, and the verification lookup used by
/// external clients.

pub mod keys;
mod manager;

pub use manager::LicenseManager;

use crate::db::license::License;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Usage log action labels
pub mod actions {
    pub const CREATE: &str = "create";
    pub const ACTIVATE: &str = "activate";
    pub const DEACTIVATE: &str = "deactivate";
    pub const VERIFY: &str = "verify";
    pub const VERIFY_REJECTED: &str = "verify_rejected";
}

/// Status filter for the licensing listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    Active,
    Inactive,
    Assigned,
    Unassigned,
}

impl StatusFilter {
    /// Parse a query value; unknown values mean "no filter"
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(StatusFilter::Active),
            "inactive" => Some(StatusFilter::Inactive),
            "assigned" => Some(StatusFilter::Assigned),
            "unassigned" => Some(StatusFilter::Unassigned),
            _ => None,
        }
    }
}

/// Listing filter
#[derive(Debug, Clone, Default)]
pub struct LicenseFilter {
    /// Case-insensitive substring of the key or the owner's username
    pub search: Option<String>,
    pub status: Option<StatusFilter>,
}

/// Aggregate counts over all licenses
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LicenseStats {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub assigned: i64,
}

/// Outcome of looking up a key
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    Valid(License),
    Inactive(License),
    Unknown,
}

impl Verification {
    pub fn outcome(&self) -> &'static str {
        match self {
            Verification::Valid(_) => "valid",
            Verification::Inactive(_) => "inactive",
            Verification::Unknown => "unknown",
        }
    }
}
