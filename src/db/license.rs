/// License database models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// License record in the database
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct License {
    pub id: i64,
    #[sqlx(rename = "license_key")]
    pub key: String,
    /// Owner, if assigned
    #[sqlx(rename = "user_id")]
    #[serde(rename = "user")]
    pub owner_id: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// License joined with its owner's username for listings
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LicenseWithOwner {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub license: License,
    pub owner_username: Option<String>,
}

/// Usage log entry
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UsageLog {
    pub id: i64,
    pub license_id: i64,
    pub timestamp: DateTime<Utc>,
    pub action: String,
}
