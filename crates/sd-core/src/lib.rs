//! Store Doctor Core
//!
//! This crate holds the server-side source of truth for the Store Doctor
//! dashboard: the subscription plan registry, monthly scan accounting and
//! the store/scan repository that keeps each store's health cache in sync
//! with its latest scan.

pub mod analysis;
pub mod benchmark;
pub mod models;
pub mod plans;
pub mod repository;
pub mod service;
pub mod usage;

use thiserror::Error;

pub use models::{
    CategoryScores, FixAttempt, Issue, IssueDraft, IssueStatus, ScanDraft, ScanRecord, Severity,
    StoreRecord, StoreStatus, StoreUpdate, UserRecord,
};
pub use plans::{Feature, PlanDefinition, PlanId};
pub use repository::{MemoryRepository, Repository, RepositoryStats};
pub use service::{Account, DoctorService, FixOutcome};
pub use usage::{
    Clock, ManualClock, MemoryUsageBackend, SystemClock, UsageAccounting, UsageBackend, UsageRecord,
    UsageSummary,
};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Feature {feature} is not included in the {plan} plan")]
    FeatureUnavailable { feature: Feature, plan: PlanId },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
