//! Store models

use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Health status of a connected store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus {
    Pending,
    Healthy,
    Warning,
    Critical,
}

impl StoreStatus {
    /// Status band for a health score
    pub fn from_health_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => StoreStatus::Healthy,
            50..=79 => StoreStatus::Warning,
            _ => StoreStatus::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreStatus::Pending => "pending",
            StoreStatus::Healthy => "healthy",
            StoreStatus::Warning => "warning",
            StoreStatus::Critical => "critical",
        }
    }
}

impl fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StoreStatus::Pending),
            "healthy" => Ok(StoreStatus::Healthy),
            "warning" => Ok(StoreStatus::Warning),
            "critical" => Ok(StoreStatus::Critical),
            other => Err(CoreError::Validation(format!("unknown store status '{}'", other))),
        }
    }
}

/// A connected storefront.
///
/// `health_score`, `issues_count` and `last_scan_at` mirror the most recent
/// scan and are only written when a scan is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub url: String,
    pub health_score: u8,
    pub status: StoreStatus,
    pub issues_count: u32,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl StoreRecord {
    /// New pending store; validates and normalises the inputs
    pub fn new(owner_id: &str, name: &str, url: &str) -> CoreResult<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            name: validate_store_name(name)?,
            url: normalize_store_url(url)?,
            health_score: 0,
            status: StoreStatus::Pending,
            issues_count: 0,
            last_scan_at: None,
            created_at: Utc::now(),
        })
    }

    /// Apply a client edit. Cached scan fields are not part of `StoreUpdate`.
    pub fn apply_update(&mut self, update: &StoreUpdate) -> CoreResult<()> {
        let name = update.name.as_deref().map(validate_store_name).transpose()?;
        let url = update.url.as_deref().map(normalize_store_url).transpose()?;

        if let Some(name) = name {
            self.name = name;
        }
        if let Some(url) = url {
            self.url = url;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        Ok(())
    }

    /// Copy the cache fields from a freshly created scan
    pub fn sync_from_scan(&mut self, overall_score: u8, issues_count: usize, scanned_at: DateTime<Utc>) {
        self.health_score = overall_score;
        self.issues_count = issues_count as u32;
        self.last_scan_at = Some(scanned_at);
        self.status = StoreStatus::from_health_score(overall_score);
    }
}

/// Partial update accepted from clients
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub status: Option<StoreStatus>,
}

pub fn validate_store_name(name: &str) -> CoreResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::Validation("store name must not be empty".to_string()));
    }
    if name.chars().count() > 120 {
        return Err(CoreError::Validation("store name must be at most 120 characters".to_string()));
    }
    Ok(name.to_string())
}

/// Trim whitespace, a leading `http(s)://` and trailing slashes
pub fn normalize_store_url(url: &str) -> CoreResult<String> {
    let trimmed = url.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let normalized = without_scheme.trim_end_matches('/');

    if normalized.is_empty() {
        return Err(CoreError::Validation("store url must not be empty".to_string()));
    }
    if normalized.chars().any(char::is_whitespace) {
        return Err(CoreError::Validation(format!("store url '{}' contains whitespace", trimmed)));
    }
    if !normalized.split('/').next().is_some_and(|host| host.contains('.')) {
        return Err(CoreError::Validation(format!("store url '{}' has no domain", trimmed)));
    }
    Ok(normalized.to_string())
}
