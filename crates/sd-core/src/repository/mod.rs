//! Store, scan and user persistence

pub mod memory;

pub use memory::MemoryRepository;

use crate::models::{FixAttempt, ScanDraft, ScanRecord, StoreRecord, StoreUpdate, UserRecord};
use crate::plans::PlanId;
use crate::CoreResult;
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// Totals for the admin console
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryStats {
    pub total_users: u64,
    pub total_stores: u64,
    pub total_scans: u64,
    pub open_issues: u64,
    pub fixed_issues: u64,
}

/// Persistence backend for users, stores and scans.
///
/// `create_scan` must update the parent store's cached health fields in the
/// same critical section (or transaction) that inserts the scan.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Fetch a user, creating a free-plan record on first sight
    async fn get_or_create_user(&self, user_id: &str) -> CoreResult<UserRecord>;

    async fn set_plan(&self, user_id: &str, plan: PlanId) -> CoreResult<UserRecord>;

    async fn create_store(&self, owner_id: &str, name: &str, url: &str) -> CoreResult<StoreRecord>;

    async fn get_store(&self, id: Uuid) -> CoreResult<Option<StoreRecord>>;

    /// Stores of one owner in insertion order
    async fn list_stores(&self, owner_id: &str) -> CoreResult<Vec<StoreRecord>>;

    async fn update_store(&self, id: Uuid, update: StoreUpdate) -> CoreResult<StoreRecord>;

    /// Remove a store with its scans; `false` when it did not exist
    async fn delete_store(&self, id: Uuid) -> CoreResult<bool>;

    async fn create_scan(&self, store_id: Uuid, owner_id: &str, draft: ScanDraft) -> CoreResult<ScanRecord>;

    async fn get_scan(&self, id: Uuid) -> CoreResult<Option<ScanRecord>>;

    /// Scans of one store, newest first
    async fn list_scans(&self, store_id: Uuid) -> CoreResult<Vec<ScanRecord>>;

    /// Mark an issue fixed and append an audit entry
    async fn apply_auto_fix(&self, scan_id: Uuid, issue_id: &str) -> CoreResult<ScanRecord>;

    async fn fix_history(&self, scan_id: Uuid) -> CoreResult<Vec<FixAttempt>>;

    async fn stats(&self) -> CoreResult<RepositoryStats>;
}
